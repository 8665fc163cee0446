//! Fixed-size pool of mutexes selected by key hash.
//!
//! Gives per-key mutual exclusion without allocating a lock per key. Two
//! unrelated keys that hash to the same stripe contend with each other.

use ahash::RandomState;
use parking_lot::{Mutex, MutexGuard};
use std::hash::{BuildHasher, Hash, Hasher};

/// Striped lock pool.
///
/// The hasher is seeded once at construction, so a key maps to the same
/// stripe for the lifetime of the pool.
///
/// # Example
///
/// ```
/// use pi_meter_common::StripedLock;
///
/// let locks = StripedLock::new(30);
/// let guard = locks.lock(&"device:s1");
/// // ... exclusive section for device:s1 ...
/// drop(guard);
/// ```
#[derive(Debug)]
pub struct StripedLock {
    stripes: Box<[Mutex<()>]>,
    hasher: RandomState,
}

impl StripedLock {
    /// Creates a pool with `stripes` locks (at least one).
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self {
            stripes,
            hasher: RandomState::new(),
        }
    }

    /// Returns the number of stripes.
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Returns the stripe index a key maps to.
    pub fn stripe_for<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    /// Blocks until the stripe for `key` is acquired.
    ///
    /// The lock is released when the guard is dropped.
    pub fn lock<K: Hash + ?Sized>(&self, key: &K) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_for(key)].lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_stripe_is_stable() {
        let locks = StripedLock::new(30);
        let first = locks.stripe_for("device:s1");
        for _ in 0..100 {
            assert_eq!(locks.stripe_for("device:s1"), first);
        }
        assert!(first < locks.stripe_count());
    }

    #[test]
    fn test_zero_stripes_clamped() {
        let locks = StripedLock::new(0);
        assert_eq!(locks.stripe_count(), 1);
        let _guard = locks.lock("anything");
    }

    #[test]
    fn test_same_key_is_exclusive() {
        let locks = Arc::new(StripedLock::new(8));
        let inside = Arc::new(AtomicBool::new(false));
        let entered = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let entered = Arc::clone(&entered);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _guard = locks.lock("device:s1");
                        assert!(!inside.swap(true, Ordering::SeqCst));
                        entered.fetch_add(1, Ordering::SeqCst);
                        inside.store(false, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(entered.load(Ordering::SeqCst), 800);
    }

    #[test]
    fn test_distinct_stripes_do_not_block() {
        let locks = StripedLock::new(64);
        let a = "device:s1";
        let b = (0..1000)
            .map(|i| format!("device:{}", i))
            .find(|k| locks.stripe_for(k.as_str()) != locks.stripe_for(a))
            .unwrap();

        let _ga = locks.lock(a);
        // Would deadlock if both keys shared the stripe.
        let _gb = locks.lock(b.as_str());
    }
}
