// crates/state-gate-store-fs/src/lock.rs
// ============================================================================
// Module: File Lock
// Description: A per-file advisory lock built on exclusive sentinel-file
//              creation, with bounded retry and stale-lock reclamation.
// Purpose: Serialize the revision-checked append and metadata-save critical
//          sections (§5) across concurrent callers sharing one run directory.
// Dependencies: std::fs, std::thread, state_gate_core::config::LockPolicy
// ============================================================================

//! ## Overview
//! Acquisition has two layers. Within this process, concurrent acquirers on
//! the same path first take a ticket from a per-path [`PathQueue`] and block
//! until it is their turn, so same-process callers are served in strict FIFO
//! order rather than racing each other. Only the caller whose turn it is then
//! attempts the cross-process half: a sentinel file created with
//! [`std::fs::OpenOptions::create_new`], which is atomic on every platform
//! this crate targets. The sentinel records its owner (`pid:timestamp_ms`) so
//! a stuck lock can be attributed to the process that took it. A sentinel
//! older than [`LockPolicy::stale_timeout_ms`] is assumed to belong to a
//! process that crashed mid-critical-section and is reclaimed by deletion.
//! [`FileLockGuard`] removes the sentinel and releases the in-process ticket
//! on drop, so a panic inside the critical section still releases the lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use state_gate_core::config::LockPolicy;

/// Failure to acquire a [`FileLock`] within its configured retry budget.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Every acquisition attempt was met with an existing, non-stale
    /// sentinel.
    #[error("timed out acquiring lock on {path:?} after {attempts} attempt(s)")]
    TimedOut {
        /// The sentinel path that remained locked.
        path: PathBuf,
        /// The number of attempts made.
        attempts: u32,
    },
    /// An I/O error occurred while creating or removing the sentinel file.
    #[error("lock I/O error on {path:?}: {source}")]
    Io {
        /// The sentinel path involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A ticket queue serializing same-process acquirers on one path in strict
/// FIFO order, ahead of the cross-process sentinel race.
struct PathQueue {
    next_ticket: Mutex<u64>,
    now_serving: Mutex<u64>,
    turn: Condvar,
}

impl PathQueue {
    /// Builds an empty queue with ticket `0` next in line.
    fn new() -> Self {
        Self {
            next_ticket: Mutex::new(0),
            now_serving: Mutex::new(0),
            turn: Condvar::new(),
        }
    }

    /// Blocks until this caller is at the front of the line for this path.
    fn take_turn(&self) -> u64 {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic we cannot recover from")]
        let ticket = {
            let mut next = self.next_ticket.lock().unwrap();
            let ticket = *next;
            *next += 1;
            ticket
        };
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic we cannot recover from")]
        let mut serving = self.now_serving.lock().unwrap();
        while *serving != ticket {
            serving = self.turn.wait(serving).unwrap();
        }
        ticket
    }

    /// Advances the line, waking whichever waiter holds the next ticket.
    fn release(&self) {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic we cannot recover from")]
        let mut serving = self.now_serving.lock().unwrap();
        *serving += 1;
        self.turn.notify_all();
    }
}

/// Returns the process-wide queue for `path`, creating one on first use.
fn path_queue(path: &Path) -> Arc<PathQueue> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Arc<PathQueue>>>> = OnceLock::new();
    let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
    #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic we cannot recover from")]
    let mut queues = registry.lock().unwrap();
    queues.entry(path.to_path_buf()).or_insert_with(|| Arc::new(PathQueue::new())).clone()
}

/// An advisory lock over a single target file, realized as a `.lock`
/// sentinel sibling.
pub struct FileLock {
    sentinel_path: PathBuf,
    policy: LockPolicy,
}

impl FileLock {
    /// Builds a lock over `target`'s sentinel (`<target>.lock`), governed by
    /// `policy`.
    #[must_use]
    pub fn new(target: &Path, policy: LockPolicy) -> Self {
        let mut sentinel_path = target.as_os_str().to_owned();
        sentinel_path.push(".lock");
        Self {
            sentinel_path: PathBuf::from(sentinel_path),
            policy,
        }
    }

    /// Acquires the lock. Same-process callers on this path first queue in
    /// [`PathQueue`] FIFO order; once at the front, the caller retries the
    /// cross-process sentinel up to `policy.max_attempts` times with a fixed
    /// `policy.retry_interval_ms` delay, reclaiming a sentinel older than
    /// `policy.stale_timeout_ms` immediately rather than waiting it out.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::TimedOut`] if the retry budget is exhausted, or
    /// [`LockError::Io`] on an unexpected filesystem failure.
    pub fn acquire(&self) -> Result<FileLockGuard<'_>, LockError> {
        let queue = path_queue(&self.sentinel_path);
        queue.take_turn();

        match self.acquire_sentinel() {
            Ok(()) => Ok(FileLockGuard {
                sentinel_path: &self.sentinel_path,
                queue,
            }),
            Err(error) => {
                queue.release();
                Err(error)
            }
        }
    }

    fn acquire_sentinel(&self) -> Result<(), LockError> {
        for attempt in 1..=self.policy.max_attempts {
            match self.try_create_sentinel() {
                Ok(()) => return Ok(()),
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    if self.reclaim_if_stale()? {
                        continue;
                    }
                    if attempt == self.policy.max_attempts {
                        break;
                    }
                    thread::sleep(Duration::from_millis(self.policy.retry_interval_ms));
                }
                Err(source) => {
                    return Err(LockError::Io {
                        path: self.sentinel_path.clone(),
                        source,
                    });
                }
            }
        }
        Err(LockError::TimedOut {
            path: self.sentinel_path.clone(),
            attempts: self.policy.max_attempts,
        })
    }

    /// Creates the sentinel, recording this process's id and the wall-clock
    /// acquisition time as `pid:timestamp_ms` in its body.
    fn try_create_sentinel(&self) -> io::Result<()> {
        if let Some(parent) = self.sentinel_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut sentinel = OpenOptions::new().write(true).create_new(true).open(&self.sentinel_path)?;
        sentinel.write_all(owner_record().as_bytes())?;
        Ok(())
    }

    /// Removes the sentinel if its age exceeds the stale timeout, returning
    /// whether reclamation occurred.
    fn reclaim_if_stale(&self) -> Result<bool, LockError> {
        let metadata = match std::fs::metadata(&self.sentinel_path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(source) => {
                return Err(LockError::Io {
                    path: self.sentinel_path.clone(),
                    source,
                });
            }
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or(Duration::ZERO);
        if age >= Duration::from_millis(self.policy.stale_timeout_ms) {
            let owner = std::fs::read_to_string(&self.sentinel_path).unwrap_or_default();
            match std::fs::remove_file(&self.sentinel_path) {
                Ok(()) => {
                    tracing::warn!(path = ?self.sentinel_path, owner, age_ms = age.as_millis(), "reclaiming stale lock sentinel");
                    Ok(true)
                }
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(true),
                Err(source) => Err(LockError::Io {
                    path: self.sentinel_path.clone(),
                    source,
                }),
            }
        } else {
            Ok(false)
        }
    }
}

/// Formats this process's lock-ownership record: its pid and the current
/// wall-clock time in milliseconds since the Unix epoch.
fn owner_record() -> String {
    let timestamp_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    format!("{}:{timestamp_ms}", std::process::id())
}

/// A held lock; dropping it removes the sentinel file and releases this
/// caller's place in the path's in-process queue.
pub struct FileLockGuard<'a> {
    sentinel_path: &'a Path,
    queue: Arc<PathQueue>,
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(self.sentinel_path) {
            tracing::warn!(path = ?self.sentinel_path, %error, "failed to remove lock sentinel");
        }
        self.queue.release();
    }
}
