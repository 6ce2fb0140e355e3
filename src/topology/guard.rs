/// Non-blocking try-enter guard
///
/// Acquisition is a single compare-exchange on an `AtomicBool`; the flag is
/// released when the guard drops, whichever way the guarded scope exits.
use std::sync::atomic::{AtomicBool, Ordering};

pub struct TryLockGuard<'a> {
    flag: &'a AtomicBool,
    acquired: bool,
}

impl<'a> TryLockGuard<'a> {
    pub fn new(flag: &'a AtomicBool) -> Self {
        let acquired = flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        Self { flag, acquired }
    }

    pub fn acquired(&self) -> bool {
        self.acquired
    }
}

impl Drop for TryLockGuard<'_> {
    fn drop(&mut self) {
        if self.acquired {
            self.flag.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_guard_fails_while_first_held() {
        let flag = AtomicBool::new(false);
        let first = TryLockGuard::new(&flag);
        assert!(first.acquired());

        let second = TryLockGuard::new(&flag);
        assert!(!second.acquired());

        // a failed guard must not release the flag it never took
        drop(second);
        assert!(flag.load(Ordering::Acquire));

        drop(first);
        assert!(!flag.load(Ordering::Acquire));
        assert!(TryLockGuard::new(&flag).acquired());
    }

    #[test]
    fn test_released_on_early_return() {
        fn guarded(flag: &AtomicBool, fail: bool) -> Result<(), String> {
            let guard = TryLockGuard::new(flag);
            if !guard.acquired() {
                return Err("busy".to_string());
            }
            if fail {
                return Err("probe failed".to_string());
            }
            Ok(())
        }

        let flag = AtomicBool::new(false);
        assert!(guarded(&flag, true).is_err());
        assert!(!flag.load(Ordering::Acquire));
        assert!(guarded(&flag, false).is_ok());
    }
}
