use crate::handoff::SlotState;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error("Failed to bind worker to core {core}: {source}")]
    Affinity {
        core: usize,
        #[source]
        source: io::Error,
    },

    #[error("Worker thread exited unexpectedly")]
    WorkerLost,

    #[error("Handoff slot found {found:?}, expected {expected:?}")]
    ProtocolViolation {
        expected: SlotState,
        found: SlotState,
    },

    #[error("Forwarding mode is not running")]
    NotRunning,

    #[error("Forwarding mode is already running")]
    AlreadyRunning,

    #[error("Forwarding mode aborted after a fatal startup failure")]
    Aborted,

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl RelayError {
    /// Startup failures abort the forwarding mode; nothing else is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::WorkerSpawn(_) | RelayError::Affinity { .. } | RelayError::WorkerLost
        )
    }
}
