//! The weak lock marker.
//!
//! A weak reader holds an ordinary shared lock, but also advertises itself here so that a writer
//! can ask it to step aside instead of waiting for it to finish. Weak readers are expected to poll
//! [`WeakLock::should_yield`] between units of work.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum WeakLockState {
    Unlocked = 0,
    Locked = 1,
    /// A writer is waiting, the weak reader should release as soon as possible.
    Unlocking = 2,
}
impl WeakLockState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Locked,
            2 => Self::Unlocking,
            _ => Self::Unlocked,
        }
    }
}

#[derive(Debug)]
pub struct WeakLock {
    state: AtomicU8,
}
impl Default for WeakLock {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(WeakLockState::Unlocked as u8),
        }
    }
}
impl WeakLock {
    #[must_use]
    pub fn state(&self) -> WeakLockState {
        WeakLockState::from_raw(self.state.load(Ordering::Acquire))
    }
    /// Claim the marker. Fails if another weak reader already has it.
    pub(super) fn acquire(&self) -> bool {
        self.state
            .compare_exchange(
                WeakLockState::Unlocked as u8,
                WeakLockState::Locked as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
    pub(super) fn release(&self) {
        self.state
            .store(WeakLockState::Unlocked as u8, Ordering::Release);
    }
    /// Ask a weak reader, if any, to let go. Returns whether one was asked.
    pub(super) fn request_yield(&self) -> bool {
        self.state
            .compare_exchange(
                WeakLockState::Locked as u8,
                WeakLockState::Unlocking as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
    /// Has a writer asked the weak reader to let go?
    #[must_use]
    pub fn should_yield(&self) -> bool {
        self.state() == WeakLockState::Unlocking
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn yield_protocol() {
        let lock = WeakLock::default();
        assert!(!lock.request_yield());
        assert!(lock.acquire());
        assert!(!lock.acquire());
        assert!(!lock.should_yield());
        assert!(lock.request_yield());
        assert!(lock.should_yield());
        lock.release();
        assert_eq!(lock.state(), WeakLockState::Unlocked);
    }
}
