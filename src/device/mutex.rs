//! Crude mutex over a single atomic word
//!
//! Acquire is a compare-and-swap from `UNLOCKED` to `LOCKED`, release is a
//! plain store of `UNLOCKED`. There is no owner, no queue and no reentrancy.
//! Acquisition is bounded: after `max_spins` failed attempts the caller
//! gives up and drops its work for the frame.

use std::sync::atomic::{AtomicU32, Ordering};

pub const UNLOCKED: u32 = 0;
pub const LOCKED: u32 = 1;

/// View of one mutex word in a counter block
#[derive(Clone, Copy)]
pub struct CrudeMutex<'a> {
    cell: &'a AtomicU32,
}

/// Releases the mutex when dropped
pub struct CrudeMutexGuard<'a> {
    cell: &'a AtomicU32,
}

impl<'a> CrudeMutex<'a> {
    pub fn new(cell: &'a AtomicU32) -> Self {
        Self { cell }
    }

    /// Single acquisition attempt
    pub fn try_lock(&self) -> Option<CrudeMutexGuard<'a>> {
        self.cell
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| CrudeMutexGuard { cell: self.cell })
    }

    /// Retry up to `max_spins` times, yielding the thread between attempts
    pub fn lock_bounded(&self, max_spins: u32) -> Option<CrudeMutexGuard<'a>> {
        for spin in 0..max_spins.max(1) {
            if let Some(guard) = self.try_lock() {
                return Some(guard);
            }
            if spin < 16 {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
        None
    }

    pub fn is_locked(&self) -> bool {
        self.cell.load(Ordering::Relaxed) != UNLOCKED
    }
}

impl Drop for CrudeMutexGuard<'_> {
    fn drop(&mut self) {
        self.cell.store(UNLOCKED, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    #[test]
    fn test_second_attempt_fails_while_held() {
        let cell = AtomicU32::new(UNLOCKED);
        let mutex = CrudeMutex::new(&cell);
        let guard = mutex.try_lock();
        assert!(guard.is_some());
        assert!(mutex.try_lock().is_none());
        assert!(mutex.lock_bounded(4).is_none());
        drop(guard);
        assert!(!mutex.is_locked());
        assert!(mutex.try_lock().is_some());
    }

    #[test]
    fn test_exactly_one_concurrent_claimant_acquires() {
        const CLAIMANTS: usize = 16;
        for _ in 0..50 {
            let cell = AtomicU32::new(UNLOCKED);
            let acquired = AtomicUsize::new(0);
            let barrier = Barrier::new(CLAIMANTS);
            std::thread::scope(|scope| {
                let guards: Vec<_> = (0..CLAIMANTS)
                    .map(|_| {
                        scope.spawn(|| {
                            barrier.wait();
                            let guard = CrudeMutex::new(&cell).try_lock();
                            if guard.is_some() {
                                acquired.fetch_add(1, Ordering::SeqCst);
                            }
                            // hold until every claimant has tried
                            barrier.wait();
                            guard.is_some()
                        })
                    })
                    .collect();
                for handle in guards {
                    handle.join().unwrap();
                }
            });
            assert_eq!(acquired.load(Ordering::SeqCst), 1);
        }
    }
}
