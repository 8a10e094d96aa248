// crates/state-gate-mcp/src/protocol.rs
// ============================================================================
// Module: JSON-RPC Envelope
// Description: The request/response/error shapes for the stdio-framed
//              JSON-RPC transport (§10.5).
// Purpose: Give the transport loop (crate::main) a typed envelope to
//          deserialize requests into and serialize responses out of,
//          independent of what any individual method does.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Each line of stdin is one JSON-RPC 2.0 request object; each line written
//! to stdout is exactly one response object. Notifications (a request with
//! no `id`) are accepted but never produce a response, per the JSON-RPC 2.0
//! specification.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A single JSON-RPC 2.0 request read from stdin.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Present and equal to `"2.0"` for a conforming request; not enforced
    /// on read, only echoed back on write.
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// The request id. Absent for a notification, which receives no reply.
    #[serde(default)]
    pub id: Option<Value>,
    /// The method name, e.g. `"tools/list"` or `"tools/call"`.
    pub method: String,
    /// Method-specific parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A single JSON-RPC 2.0 response written to stdout.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Echoes the request's id.
    pub id: Value,
    /// The successful result, mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The transport-level failure, mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response carrying `result`.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response carrying `error`.
    #[must_use]
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// A standard or application-defined error code.
    pub code: i64,
    /// A short, human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// The request body was not valid JSON.
    pub const PARSE_ERROR: i64 = -32_700;
    /// The request did not match the JSON-RPC envelope.
    pub const INVALID_REQUEST: i64 = -32_600;
    /// `method` does not name a method this server handles.
    pub const METHOD_NOT_FOUND: i64 = -32_601;
    /// `params` was missing or malformed for the given method.
    pub const INVALID_PARAMS: i64 = -32_602;
    /// An unexpected failure occurred handling an otherwise well-formed
    /// request.
    pub const INTERNAL_ERROR: i64 = -32_603;

    /// Builds an error with no structured data.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Builds an error carrying structured `data`.
    #[must_use]
    pub fn with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}
