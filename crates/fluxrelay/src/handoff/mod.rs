//! Single-slot work handoff between one dispatcher and one worker.
//!
//! The dispatcher publishes a batch into the slot, the worker runs a
//! transform over it in place, and the dispatcher takes the batch back.
//! At most one batch is in flight and the dispatcher never touches it while
//! the worker holds it.

mod slot;
pub mod signal;

pub use signal::{CondvarSignal, SemaphoreSignal, Signal, Signaler, SpinSignal};
pub use slot::{SlotState, Work};

use crate::error::RelayError;
use slot::{Claim, WorkSlot};
use std::cell::Cell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Shared<T, A, S> {
    slot: WorkSlot<T, A>,
    signal: S,
    running: AtomicBool,
    consumer_gone: AtomicBool,
}

/// Create a connected dispatcher/worker pair.
pub fn pair<T, A, S: Signal>(signal: S) -> (HandoffProducer<T, A, S>, HandoffConsumer<T, A, S>) {
    let shared = Arc::new(Shared {
        slot: WorkSlot::new(),
        signal,
        running: AtomicBool::new(true),
        consumer_gone: AtomicBool::new(false),
    });
    (
        HandoffProducer {
            shared: shared.clone(),
            _not_sync: PhantomData,
        },
        HandoffConsumer { shared },
    )
}

/// Dispatcher side. `Send` but not `Sync`: one thread drives the cycle.
pub struct HandoffProducer<T, A, S: Signal = Signaler> {
    shared: Arc<Shared<T, A, S>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T, A, S: Signal> HandoffProducer<T, A, S> {
    /// Publish a batch and wake the worker. The slot must be idle.
    pub fn submit(&mut self, work: Work<T, A>) -> Result<(), RelayError> {
        if !self.is_running() {
            return Err(RelayError::NotRunning);
        }
        self.shared.slot.try_fill(work)?;
        self.shared.signal.wake_worker();
        Ok(())
    }

    /// Wait for the worker to finish the published batch and take it back.
    pub fn wait_complete(&mut self) -> Result<Work<T, A>, RelayError> {
        let shared = &*self.shared;
        let found = shared.slot.state();
        if found == SlotState::Idle {
            return Err(RelayError::ProtocolViolation {
                expected: SlotState::Filled,
                found,
            });
        }

        shared.signal.park_dispatcher(|| {
            shared.slot.state() == SlotState::Done || shared.consumer_gone.load(Ordering::Acquire)
        });

        match shared.slot.state() {
            SlotState::Done => shared.slot.release(),
            _ => Err(RelayError::WorkerLost),
        }
    }

    /// One full cycle: publish, wait, take back.
    ///
    /// An empty batch is returned untouched without involving the worker.
    pub fn run(&mut self, work: Work<T, A>) -> Result<Work<T, A>, RelayError> {
        if work.is_empty() {
            return Ok(work);
        }
        self.submit(work)?;
        self.wait_complete()
    }

    /// Ask the worker to exit. It finishes a batch it already claimed first.
    pub fn shutdown(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            self.shared.signal.wake_worker();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SlotState {
        self.shared.slot.state()
    }

    /// Batches the worker has claimed so far.
    pub fn cycles(&self) -> u64 {
        self.shared.slot.claims()
    }

    pub fn signal(&self) -> &S {
        &self.shared.signal
    }
}

impl<T, A, S: Signal> Drop for HandoffProducer<T, A, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker side.
pub struct HandoffConsumer<T, A, S: Signal = Signaler> {
    shared: Arc<Shared<T, A, S>>,
}

impl<T, A, S: Signal> HandoffConsumer<T, A, S> {
    /// Block until a batch is published or shutdown is requested.
    ///
    /// A published batch wins over a concurrent shutdown, so work that made
    /// it into the slot is always processed. Returns `None` on shutdown.
    pub fn next_job(&self) -> Option<Job<'_, T, A, S>> {
        let shared = &*self.shared;
        loop {
            shared.signal.park_worker(|| {
                shared.slot.state() == SlotState::Filled || !shared.running.load(Ordering::Acquire)
            });

            if let Some(claim) = shared.slot.claim() {
                return Some(Job {
                    claim,
                    signal: &shared.signal,
                });
            }
            if !shared.running.load(Ordering::Acquire) {
                return None;
            }
        }
    }

    /// Run `f` on every batch until shutdown. Returns the number of batches.
    pub fn serve<F>(&self, mut f: F) -> u64
    where
        F: FnMut(&mut [T], &A),
    {
        let mut served = 0;
        while let Some(mut job) = self.next_job() {
            let Work { items, aux } = &mut *job;
            f(items, aux);
            served += 1;
        }
        served
    }
}

impl<T, A, S: Signal> Drop for HandoffConsumer<T, A, S> {
    fn drop(&mut self) {
        self.shared.consumer_gone.store(true, Ordering::Release);
        self.shared.signal.wake_dispatcher();
    }
}

/// A claimed batch. Dropping it completes the cycle and wakes the dispatcher.
pub struct Job<'a, T, A, S: Signal> {
    claim: Claim<'a, T, A>,
    signal: &'a S,
}

impl<T, A, S: Signal> Deref for Job<'_, T, A, S> {
    type Target = Work<T, A>;

    fn deref(&self) -> &Self::Target {
        &self.claim
    }
}

impl<T, A, S: Signal> DerefMut for Job<'_, T, A, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.claim
    }
}

impl<T, A, S: Signal> Drop for Job<'_, T, A, S> {
    fn drop(&mut self) {
        self.claim.finish();
        self.signal.wake_dispatcher();
    }
}
