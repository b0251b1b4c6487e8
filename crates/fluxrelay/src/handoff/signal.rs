use crate::config::WaitStrategy;
use crate::error::RelayError;
use fluxrelay_core::cpu;
use fluxrelay_core::sys::sem::Semaphore;
use std::sync::{Condvar, Mutex, PoisonError};

/// Wait/wake primitive between the dispatcher and the worker.
///
/// The slot state is the source of truth; a `Signal` only decides how each
/// side waits for it to change. `park_*` returns once `ready()` holds, and
/// must tolerate spurious wakeups. `wake_*` is called after the state change
/// the other side is waiting for.
pub trait Signal: Send + Sync {
    /// Work was filled or shutdown was requested.
    fn wake_worker(&self);

    fn park_worker<F: Fn() -> bool>(&self, ready: F);

    /// The worker marked the slot done.
    fn wake_dispatcher(&self);

    fn park_dispatcher<F: Fn() -> bool>(&self, ready: F);
}

#[inline]
fn spin_until<F: Fn() -> bool>(ready: F) {
    while !ready() {
        cpu::relax();
    }
}

/// Both sides busy-poll. No syscalls on either path.
#[derive(Debug, Default)]
pub struct SpinSignal;

impl Signal for SpinSignal {
    #[inline]
    fn wake_worker(&self) {}

    #[inline]
    fn park_worker<F: Fn() -> bool>(&self, ready: F) {
        spin_until(ready);
    }

    #[inline]
    fn wake_dispatcher(&self) {}

    #[inline]
    fn park_dispatcher<F: Fn() -> bool>(&self, ready: F) {
        spin_until(ready);
    }
}

/// Both sides block on a condition variable.
///
/// The predicate is checked with the mutex held and the waker takes the
/// mutex before notifying, so a state change made just before `wake_*`
/// can't slip between a waiter's check and its wait.
#[derive(Debug, Default)]
pub struct CondvarSignal {
    lock: Mutex<()>,
    work: Condvar,
    done: Condvar,
}

impl CondvarSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, cond: &Condvar) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        cond.notify_one();
    }

    fn park<F: Fn() -> bool>(&self, cond: &Condvar, ready: F) {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !ready() {
            guard = cond.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Signal for CondvarSignal {
    fn wake_worker(&self) {
        self.notify(&self.work);
    }

    fn park_worker<F: Fn() -> bool>(&self, ready: F) {
        self.park(&self.work, ready);
    }

    fn wake_dispatcher(&self) {
        self.notify(&self.done);
    }

    fn park_dispatcher<F: Fn() -> bool>(&self, ready: F) {
        self.park(&self.done, ready);
    }
}

/// Worker blocks on a counting semaphore posted once per fill (and once on
/// shutdown); the dispatcher spins for completion and is never descheduled.
pub struct SemaphoreSignal {
    sem: Semaphore,
}

impl SemaphoreSignal {
    pub fn new() -> Result<Self, RelayError> {
        Ok(Self { sem: Semaphore::new(0)? })
    }

    pub fn pending_posts(&self) -> u32 {
        self.sem.value().unwrap_or(0)
    }
}

impl Signal for SemaphoreSignal {
    fn wake_worker(&self) {
        if let Err(err) = self.sem.post() {
            tracing::error!(error = %err, "sem_post failed");
        }
    }

    fn park_worker<F: Fn() -> bool>(&self, ready: F) {
        while !ready() {
            if let Err(err) = self.sem.wait() {
                tracing::error!(error = %err, "sem_wait failed, spinning");
                cpu::relax();
            }
        }
    }

    #[inline]
    fn wake_dispatcher(&self) {}

    #[inline]
    fn park_dispatcher<F: Fn() -> bool>(&self, ready: F) {
        spin_until(ready);
    }
}

/// Runtime-selected signal.
pub enum Signaler {
    Spin(SpinSignal),
    Condvar(CondvarSignal),
    Semaphore(SemaphoreSignal),
}

impl Signaler {
    pub fn new(strategy: WaitStrategy) -> Result<Self, RelayError> {
        match strategy {
            WaitStrategy::Spin => Ok(Signaler::Spin(SpinSignal)),
            WaitStrategy::Condvar => Ok(Signaler::Condvar(CondvarSignal::new())),
            WaitStrategy::Semaphore => Ok(Signaler::Semaphore(SemaphoreSignal::new()?)),
            WaitStrategy::RunLoop => Err(RelayError::InvalidConfiguration(
                "run-loop strategy has no per-cycle handoff".to_string(),
            )),
        }
    }

    pub fn strategy(&self) -> WaitStrategy {
        match self {
            Signaler::Spin(_) => WaitStrategy::Spin,
            Signaler::Condvar(_) => WaitStrategy::Condvar,
            Signaler::Semaphore(_) => WaitStrategy::Semaphore,
        }
    }
}

impl Signal for Signaler {
    #[inline]
    fn wake_worker(&self) {
        match self {
            Signaler::Spin(s) => s.wake_worker(),
            Signaler::Condvar(s) => s.wake_worker(),
            Signaler::Semaphore(s) => s.wake_worker(),
        }
    }

    #[inline]
    fn park_worker<F: Fn() -> bool>(&self, ready: F) {
        match self {
            Signaler::Spin(s) => s.park_worker(ready),
            Signaler::Condvar(s) => s.park_worker(ready),
            Signaler::Semaphore(s) => s.park_worker(ready),
        }
    }

    #[inline]
    fn wake_dispatcher(&self) {
        match self {
            Signaler::Spin(s) => s.wake_dispatcher(),
            Signaler::Condvar(s) => s.wake_dispatcher(),
            Signaler::Semaphore(s) => s.wake_dispatcher(),
        }
    }

    #[inline]
    fn park_dispatcher<F: Fn() -> bool>(&self, ready: F) {
        match self {
            Signaler::Spin(s) => s.park_dispatcher(ready),
            Signaler::Condvar(s) => s.park_dispatcher(ready),
            Signaler::Semaphore(s) => s.park_dispatcher(ready),
        }
    }
}
