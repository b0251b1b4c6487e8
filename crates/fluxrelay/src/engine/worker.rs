use crate::error::RelayError;
use fluxrelay_core::sys::affinity;
use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

/// Worker lifecycle. Moves forward only: `NotStarted -> Running -> Stopping -> Joined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    Running,
    Stopping,
    Joined,
}

/// A worker thread pinned to one core.
///
/// `spawn` does not return until the thread has pinned itself, so a bad
/// core is reported to the caller instead of surfacing later.
pub struct WorkerThread<R> {
    core: Option<usize>,
    handle: Option<JoinHandle<Option<R>>>,
}

impl<R: Send + 'static> WorkerThread<R> {
    pub fn spawn<F>(core: Option<usize>, body: F) -> Result<Self, RelayError>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let name = match core {
            Some(core) => format!("fluxrelay-worker-{}", core),
            None => "fluxrelay-worker".to_string(),
        };
        let (ready_tx, ready_rx) = mpsc::sync_channel::<io::Result<()>>(1);

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let pinned = match core {
                    Some(core) => affinity::pin_current(core),
                    None => Ok(()),
                };
                let ok = pinned.is_ok();
                // The receiver only goes away if spawn itself is unwinding.
                let _ = ready_tx.send(pinned);
                if !ok {
                    return None;
                }
                Some(body())
            })
            .map_err(RelayError::WorkerSpawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                if let Some(core) = core {
                    tracing::debug!(core, "worker pinned");
                }
                Ok(Self {
                    core,
                    handle: Some(handle),
                })
            }
            Ok(Err(source)) => {
                let _ = handle.join();
                Err(RelayError::Affinity {
                    core: core.unwrap_or_default(),
                    source,
                })
            }
            Err(_) => {
                let _ = handle.join();
                Err(RelayError::WorkerLost)
            }
        }
    }

    pub fn core(&self) -> Option<usize> {
        self.core
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the thread and take what its body returned.
    ///
    /// `None` if the body panicked or the thread was already joined.
    pub fn join(&mut self) -> Option<R> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(core = ?self.core, "worker thread panicked");
                None
            }
        }
    }
}
