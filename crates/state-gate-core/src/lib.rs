// crates/state-gate-core/src/lib.rs
// ============================================================================
// Crate: state-gate-core
// Description: The process model, validator, guard evaluator, role checker,
//              run types, storage interfaces, process registry, and state
//              engine shared by every state-gate component.
// ============================================================================

//! # state-gate-core
//!
//! This crate has no opinion about where process definitions or run logs are
//! actually stored; it defines the traits ([`interfaces::RunLogStore`],
//! [`interfaces::MetadataStore`]) that a concrete backend implements, and the
//! engine ([`engine::StateEngine`]) that drives them. `state-gate-store-fs`
//! is the filesystem-backed implementation shipped alongside this crate.

pub mod artifact;
pub mod config;
pub mod context;
pub mod engine;
pub mod guard;
pub mod identifiers;
pub mod interfaces;
pub mod model;
pub mod registry;
pub mod role;
pub mod run;
pub mod validator;
