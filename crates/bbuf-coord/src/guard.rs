use std::marker::PhantomData;

use crate::{CoordError, DistributedCondition, DistributedLock};

/// Scoped ownership of one hold level of a [`DistributedLock`].
///
/// Dropping the guard releases that level, whichever way the scope is left.
/// The guard is tied to the owning thread and cannot be sent elsewhere.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct LockGuard<'a, L: DistributedLock> {
    lock: &'a L,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: DistributedLock> LockGuard<'a, L> {
    /// Wrap a hold level the caller has already acquired.
    pub(crate) fn new(lock: &'a L) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// The lock this guard holds.
    pub fn lock(&self) -> &L {
        self.lock
    }

    /// Park on `condition` until signaled.
    ///
    /// Holding the guard is the proof that the caller owns the lock, so the
    /// precondition of [`DistributedCondition::await_uninterruptibly`] holds by
    /// construction. On return the lock is owned again.
    pub fn await_on(&self, condition: &L::Condition) -> Result<(), CoordError> {
        condition.await_uninterruptibly()
    }
}

impl<L: DistributedLock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.unlock() {
            tracing::warn!(lock = %self.lock.name(), %err, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingLock {
        holds: Arc<AtomicUsize>,
        waits: Arc<AtomicUsize>,
    }

    struct CountingCondition {
        waits: Arc<AtomicUsize>,
    }

    impl DistributedCondition for CountingCondition {
        fn name(&self) -> &str {
            "counting"
        }

        fn await_uninterruptibly(&self) -> Result<(), CoordError> {
            self.waits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn signal_all(&self) -> Result<(), CoordError> {
            Ok(())
        }
    }

    impl DistributedLock for CountingLock {
        type Condition = CountingCondition;

        fn name(&self) -> &str {
            "counting"
        }

        fn lock(&self) -> Result<(), CoordError> {
            self.holds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn unlock(&self) -> Result<(), CoordError> {
            self.holds.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        fn new_condition(&self, _name: &str) -> Result<CountingCondition, CoordError> {
            Ok(CountingCondition {
                waits: self.waits.clone(),
            })
        }

        fn is_held_by_current(&self) -> bool {
            self.holds.load(Ordering::SeqCst) > 0
        }

        fn hold_count(&self) -> usize {
            self.holds.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = CountingLock::default();
        {
            let _outer = lock.guard().unwrap();
            let _inner = lock.guard().unwrap();
            assert_eq!(lock.hold_count(), 2);
        }
        assert_eq!(lock.hold_count(), 0);
    }

    #[test]
    fn guard_releases_on_early_return() {
        fn fails(lock: &CountingLock) -> Result<(), CoordError> {
            let _guard = lock.guard()?;
            Err(CoordError::Unavailable {
                name: "counting".into(),
            })
        }

        let lock = CountingLock::default();
        assert!(fails(&lock).is_err());
        assert_eq!(lock.hold_count(), 0);
    }

    #[test]
    fn await_on_delegates_to_condition() {
        let lock = CountingLock::default();
        let cond = lock.new_condition("c").unwrap();
        let guard = lock.guard().unwrap();
        guard.await_on(&cond).unwrap();
        guard.await_on(&cond).unwrap();
        assert_eq!(lock.waits.load(Ordering::SeqCst), 2);
        assert!(guard.lock().is_held_by_current());
    }
}
