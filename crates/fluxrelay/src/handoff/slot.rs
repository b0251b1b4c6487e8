use crate::error::RelayError;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Handoff slot states. One cycle is `Idle -> Filled -> Claimed -> Done -> Idle`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No work pending. The dispatcher owns the slot.
    Idle = 0,
    /// Work published, worker has not picked it up yet.
    Filled = 1,
    /// Worker owns the payload and is running the transform.
    Claimed = 2,
    /// Transform finished. The dispatcher has not taken the payload back yet.
    Done = 3,
    /// The dispatcher is writing the payload in or taking it back out.
    Busy = 4,
}

impl SlotState {
    #[inline]
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SlotState::Idle,
            1 => SlotState::Filled,
            2 => SlotState::Claimed,
            3 => SlotState::Done,
            _ => SlotState::Busy,
        }
    }
}

/// One unit of work: a batch of items and the context the transform needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work<T, A> {
    pub items: Vec<T>,
    pub aux: A,
}

impl<T, A> Work<T, A> {
    pub fn new(items: Vec<T>, aux: A) -> Self {
        Self { items, aux }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The single shared slot.
///
/// `state` is the only synchronization point. Whoever the state names as
/// owner has exclusive access to `work`:
///
/// - `Idle`, `Done`, `Busy`: the dispatcher. Leaving `Idle` or `Done` is
///   a CAS into `Busy`, so only one caller ever touches `work`.
/// - `Filled`: nobody (in transit).
/// - `Claimed`: the worker.
///
/// Every transition that hands `work` to the other side is a Release store
/// (or AcqRel CAS) paired with an Acquire load on the receiving side.
pub(crate) struct WorkSlot<T, A> {
    state: AtomicU8,
    work: UnsafeCell<Option<Work<T, A>>>,
    claims: AtomicU64,
}

// Access to `work` is serialized by the state machine above.
unsafe impl<T: Send, A: Send> Sync for WorkSlot<T, A> {}

impl<T, A> WorkSlot<T, A> {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(SlotState::Idle as u8),
            work: UnsafeCell::new(None),
            claims: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of `Filled -> Claimed` transitions so far.
    #[inline]
    pub(crate) fn claims(&self) -> u64 {
        self.claims.load(Ordering::Relaxed)
    }

    /// Move `from -> Busy`, reporting what was found on failure.
    fn lock_from(&self, from: SlotState) -> Result<(), RelayError> {
        self.state
            .compare_exchange(from as u8, SlotState::Busy as u8, Ordering::Acquire, Ordering::Acquire)
            .map(|_| ())
            .map_err(|found| RelayError::ProtocolViolation {
                expected: from,
                found: SlotState::from_u8(found),
            })
    }

    /// `Idle -> Filled`, through `Busy` while the payload is written.
    pub(crate) fn try_fill(&self, work: Work<T, A>) -> Result<(), RelayError> {
        self.lock_from(SlotState::Idle)?;

        // SAFETY: the CAS above made us the only owner of `work` until the
        // store below.
        unsafe { *self.work.get() = Some(work) };

        // Release: the payload write above is visible to the Acquire CAS in `claim`.
        self.state.store(SlotState::Filled as u8, Ordering::Release);
        Ok(())
    }

    /// `Filled -> Claimed`. Worker side only.
    pub(crate) fn claim(&self) -> Option<Claim<'_, T, A>> {
        self.state
            .compare_exchange(
                SlotState::Filled as u8,
                SlotState::Claimed as u8,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .ok()?;
        self.claims.fetch_add(1, Ordering::Relaxed);
        Some(Claim { slot: self, finished: false })
    }

    /// `Claimed -> Done`.
    #[inline]
    fn mark_done(&self) {
        // Release: every transform write to the payload is visible to the
        // dispatcher's Acquire load in `release`.
        self.state.store(SlotState::Done as u8, Ordering::Release);
    }

    /// `Done -> Idle`, through `Busy` while the payload is taken back.
    pub(crate) fn release(&self) -> Result<Work<T, A>, RelayError> {
        // Acquire: pairs with the worker's Release store of Done, so every
        // transform write is visible before we read the payload.
        self.lock_from(SlotState::Done)?;

        // SAFETY: the CAS above made us the only owner of `work`.
        let work = unsafe { (*self.work.get()).take() };
        self.state.store(SlotState::Idle as u8, Ordering::Release);

        // A Done slot always carries the payload that was filled into it.
        work.ok_or(RelayError::ProtocolViolation {
            expected: SlotState::Done,
            found: SlotState::Idle,
        })
    }
}

/// Exclusive worker access to a claimed payload.
///
/// Dropping the claim moves the slot to `Done`, whether or not the
/// transform touched the payload.
pub(crate) struct Claim<'a, T, A> {
    slot: &'a WorkSlot<T, A>,
    finished: bool,
}

impl<T, A> Claim<'_, T, A> {
    /// Mark the slot `Done`. Idempotent.
    pub(crate) fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.slot.mark_done();
        }
    }

    fn work_ptr(&self) -> *mut Work<T, A> {
        debug_assert!(!self.finished, "payload accessed after the slot was marked done");
        // SAFETY: the slot is Claimed by us; a successful `claim` only
        // happens on a Filled slot, which always carries a payload.
        match unsafe { (*self.slot.work.get()).as_mut() } {
            Some(work) => work as *mut Work<T, A>,
            None => unreachable!("claimed slot without payload"),
        }
    }
}

impl<T, A> Deref for Claim<'_, T, A> {
    type Target = Work<T, A>;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.work_ptr() }
    }
}

impl<T, A> DerefMut for Claim<'_, T, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.work_ptr() }
    }
}

impl<T, A> Drop for Claim<'_, T, A> {
    fn drop(&mut self) {
        self.finish();
    }
}
