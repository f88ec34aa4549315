//! Background SHA-256 checksums for converted output.
//!
//! Each digest runs on its own short-lived worker thread. The worker hashes
//! the bytes, sends exactly one [`WorkerReply`] over a channel and exits;
//! nothing is pooled or reused. The caller gets a [`ChecksumRecord`]
//! immediately and the record settles the first time it is observed after
//! the reply arrives:
//!
//! ```text
//! Pending ──reply: Result──▶ Ready(hex)
//!    │
//!    ├──reply: Error────────▶ Unavailable
//!    └──channel closed──────▶ Unavailable
//! ```
//!
//! Once settled, a record never changes again. When the capability is
//! missing (disabled in config, or the thread cannot be spawned) the record
//! starts out `Unavailable` and the conversion itself is unaffected.

use log::{debug, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Observable state of one checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "sha256", rename_all = "lowercase")]
pub enum ChecksumStatus {
    Pending,
    Ready(String),
    Unavailable,
}

impl ChecksumStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ChecksumStatus::Pending)
    }

    /// `"SHA-256: <hex>"`, `"SHA-256: calculating…"` or `"SHA-256 unavailable"`.
    pub fn label(&self) -> String {
        match self {
            ChecksumStatus::Pending => "SHA-256: calculating…".to_string(),
            ChecksumStatus::Ready(hex) => format!("SHA-256: {hex}"),
            ChecksumStatus::Unavailable => "SHA-256 unavailable".to_string(),
        }
    }
}

/// The single message a worker sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerReply {
    Result { hash: String },
    Error { message: String },
}

#[derive(Debug)]
enum RecordState {
    Waiting(Receiver<WorkerReply>),
    Settled(ChecksumStatus),
}

/// Handle to one in-flight or finished checksum.
#[derive(Debug)]
pub struct ChecksumRecord {
    state: Mutex<RecordState>,
}

impl ChecksumRecord {
    fn waiting(rx: Receiver<WorkerReply>) -> Self {
        Self {
            state: Mutex::new(RecordState::Waiting(rx)),
        }
    }

    fn settled(status: ChecksumStatus) -> Self {
        Self {
            state: Mutex::new(RecordState::Settled(status)),
        }
    }

    /// Current status, without blocking.
    pub fn status(&self) -> ChecksumStatus {
        let mut state = self.lock();
        let next = match &*state {
            RecordState::Settled(status) => return status.clone(),
            RecordState::Waiting(rx) => match rx.try_recv() {
                Ok(reply) => settle(reply),
                Err(TryRecvError::Empty) => return ChecksumStatus::Pending,
                Err(TryRecvError::Disconnected) => ChecksumStatus::Unavailable,
            },
        };
        *state = RecordState::Settled(next.clone());
        next
    }

    /// Block up to `timeout` for the worker's reply.
    ///
    /// Returns `Pending` if the reply has not arrived in time; a later call
    /// may still observe it.
    pub fn wait(&self, timeout: Duration) -> ChecksumStatus {
        let mut state = self.lock();
        let next = match &*state {
            RecordState::Settled(status) => return status.clone(),
            RecordState::Waiting(rx) => match rx.recv_timeout(timeout) {
                Ok(reply) => settle(reply),
                Err(RecvTimeoutError::Timeout) => return ChecksumStatus::Pending,
                Err(RecvTimeoutError::Disconnected) => ChecksumStatus::Unavailable,
            },
        };
        *state = RecordState::Settled(next.clone());
        next
    }

    fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn settle(reply: WorkerReply) -> ChecksumStatus {
    match reply {
        WorkerReply::Result { hash } => ChecksumStatus::Ready(hash),
        WorkerReply::Error { message } => {
            warn!("Checksum worker failed: {message}");
            ChecksumStatus::Unavailable
        }
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Factory for checksum records.
#[derive(Debug, Clone)]
pub struct Integrity {
    available: bool,
}

impl Integrity {
    pub fn new() -> Self {
        Self { available: true }
    }

    /// A service whose records are all `Unavailable` from the start.
    pub fn unavailable() -> Self {
        Self { available: false }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Hash `bytes` on a fresh worker thread. Never blocks on the hash.
    pub fn compute_digest(&self, bytes: Arc<[u8]>) -> ChecksumRecord {
        if !self.available {
            return ChecksumRecord::settled(ChecksumStatus::Unavailable);
        }

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("pixelgate-sha256".to_string())
            .spawn(move || {
                let reply = match panic::catch_unwind(AssertUnwindSafe(|| sha256_hex(&bytes))) {
                    Ok(hash) => WorkerReply::Result { hash },
                    Err(_) => WorkerReply::Error {
                        message: "digest panicked".to_string(),
                    },
                };
                // The record may already be gone; nobody is left to tell.
                let _ = tx.send(reply);
            });

        match spawned {
            Ok(_) => {
                debug!("Checksum worker started");
                ChecksumRecord::waiting(rx)
            }
            Err(e) => {
                warn!("Could not start checksum worker: {e}");
                ChecksumRecord::settled(ChecksumStatus::Unavailable)
            }
        }
    }
}

impl Default for Integrity {
    fn default() -> Self {
        Self::new()
    }
}
