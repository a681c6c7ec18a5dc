//! Contract for cluster-wide coordination primitives.
//!
//! A bounded buffer shared by independent processes cannot rely on in-process
//! mutexes: mutual exclusion, blocking waits and the buffer state itself have to
//! live in a coordination service. This crate describes what such a service must
//! provide, without committing to a transport.
//!
//! # Primitives
//!
//! - [`DistributedLock`]: named, reentrant mutual exclusion across processes
//! - [`DistributedCondition`]: named wait-queue bound to one lock, with
//!   uninterruptible waits and broadcast wake
//! - [`ReplicatedCell`]: named value visible to every participant, readable and
//!   writable only while holding its guarding lock
//! - [`Coordinator`]: obtains or creates the above by name
//!
//! # Scoped acquisition
//!
//! [`DistributedLock::lock`] and [`DistributedLock::unlock`] must be paired 1:1.
//! Prefer [`DistributedLock::guard`], which returns a [`LockGuard`] that releases
//! one level of ownership when dropped, on every exit path.

mod error;
mod guard;

pub use error::*;
pub use guard::*;

/// A named wait-queue bound to a [`DistributedLock`].
///
/// Wakes are broadcast only. A waiter that returns from
/// [`await_uninterruptibly`](Self::await_uninterruptibly) holds the lock again
/// but has no guarantee that the predicate it waited for is true; it must
/// re-check it in a loop.
pub trait DistributedCondition: Send + Sync {
    /// Name of the condition, unique within its lock.
    fn name(&self) -> &str;

    /// Atomically release the associated lock, park until signaled, then
    /// reacquire the lock before returning.
    ///
    /// All hold levels of the caller are released while parked and restored on
    /// wake. The wait cannot be interrupted and has no timeout.
    ///
    /// Returns [`CoordError::NotOwner`] if the caller does not hold the lock.
    fn await_uninterruptibly(&self) -> Result<(), CoordError>;

    /// Wake every participant currently parked on this condition.
    ///
    /// Returns [`CoordError::NotOwner`] if the caller does not hold the lock.
    fn signal_all(&self) -> Result<(), CoordError>;
}

/// A cluster-wide mutual exclusion handle identified by name.
///
/// Acquisition is reentrant: the owner may call [`lock`](Self::lock) again and
/// must then call [`unlock`](Self::unlock) the same number of times.
pub trait DistributedLock: Send + Sync {
    type Condition: DistributedCondition;

    /// Name the lock was obtained under.
    fn name(&self) -> &str;

    /// Block until the caller owns the lock, or add one hold level if it
    /// already does.
    fn lock(&self) -> Result<(), CoordError>;

    /// Release one hold level.
    fn unlock(&self) -> Result<(), CoordError>;

    /// Create or bind the named wait-queue of this lock.
    ///
    /// Binding the same name twice yields handles to the same queue.
    fn new_condition(&self, name: &str) -> Result<Self::Condition, CoordError>;

    /// Whether the calling owner currently holds the lock.
    fn is_held_by_current(&self) -> bool;

    /// Number of hold levels of the calling owner (zero if not held).
    fn hold_count(&self) -> usize;

    /// Acquire the lock and return a guard that releases it when dropped.
    fn guard(&self) -> Result<LockGuard<'_, Self>, CoordError>
    where
        Self: Sized,
    {
        self.lock()?;
        Ok(LockGuard::new(self))
    }
}

/// A named value replicated across participants.
///
/// Reads and updates are only legal while the guarding lock is held; a cell
/// used without it returns [`CoordError::NotOwner`]. An update is applied as a
/// whole or not at all.
pub trait ReplicatedCell<S>: Send + Sync {
    /// Name of the cell, identical to the name of its guarding lock.
    fn name(&self) -> &str;

    /// Run `f` against the current value.
    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R, CoordError>;

    /// Run `f` against the current value and publish the result.
    fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, CoordError>;
}

/// Entry point into a coordination service.
pub trait Coordinator: Send + Sync {
    type Lock: DistributedLock;
    type Cell<S: Send + 'static>: ReplicatedCell<S>;

    /// Obtain the lock named `name`, creating it if it does not exist.
    fn lock(&self, name: &str) -> Result<Self::Lock, CoordError>;

    /// Obtain the cell guarded by `lock`, initializing it with `init` if it
    /// does not exist yet.
    fn cell<S: Send + 'static>(
        &self,
        lock: &Self::Lock,
        init: impl FnOnce() -> S,
    ) -> Result<Self::Cell<S>, CoordError>;

    /// Attach to an existing cell guarded by `lock`.
    ///
    /// Returns [`CoordError::UnknownObject`] if no cell was created under that
    /// name.
    fn attach_cell<S: Send + 'static>(
        &self,
        lock: &Self::Lock,
    ) -> Result<Self::Cell<S>, CoordError>;
}
