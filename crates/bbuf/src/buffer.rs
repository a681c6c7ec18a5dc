use std::num::NonZeroUsize;

use bbuf_coord::{Coordinator, DistributedCondition, DistributedLock, ReplicatedCell};
use uuid::Uuid;

use crate::config::{BufferConfig, NOT_EMPTY_CONDITION, NOT_FULL_CONDITION};
use crate::error::BufferError;
use crate::ring::{Ring, RingStatus};

type ConditionOf<C> = <<C as Coordinator>::Lock as DistributedLock>::Condition;

/// A fixed-capacity FIFO queue shared by every participant of a coordination
/// service.
///
/// The ring itself lives in a replicated cell guarded by a lock named after the
/// buffer. `put` and `take` acquire that lock, park on the `notFull` /
/// `notEmpty` condition while their predicate fails, wake the opposite side,
/// mutate the ring, and release the lock when the guard goes out of scope.
///
/// The ring update is the last coordination call of every operation. Woken
/// participants cannot run before the guard drops, so signaling first is not
/// observable, and a failed call leaves the ring as it was.
///
/// Wakes are broadcast and carry no promise: every woken participant re-checks
/// its predicate and parks again if another one got there first.
///
/// Waits are uninterruptible and unbounded. A producer blocked on a full buffer
/// only returns once some consumer takes a value (or the service fails).
pub struct BoundedBuffer<V: Send + 'static, C: Coordinator> {
    name: String,
    capacity: usize,
    lock: C::Lock,
    not_empty: ConditionOf<C>,
    not_full: ConditionOf<C>,
    ring: C::Cell<Ring<V>>,
}

impl<V: Send + 'static, C: Coordinator> BoundedBuffer<V, C> {
    /// Create a buffer with `capacity` slots under a fresh, unique name.
    pub fn new(coord: &C, capacity: usize) -> Result<Self, BufferError> {
        Self::with_config(coord, &BufferConfig::with_capacity(capacity))
    }

    pub fn with_config(coord: &C, config: &BufferConfig) -> Result<Self, BufferError> {
        let slots = NonZeroUsize::new(config.capacity).ok_or(BufferError::ZeroCapacity)?;

        let name = format!("{}-{}", config.name_prefix, Uuid::new_v4());
        let lock = coord.lock(&name)?;
        let capacity = slots.get();
        let ring = coord.cell(&lock, || Ring::<V>::with_capacity(slots))?;
        tracing::debug!(buffer = %name, capacity, "created bounded buffer");

        Self::bind(name, capacity, lock, ring)
    }

    /// Attach to a buffer another participant created under `name`.
    pub fn attach(coord: &C, name: &str) -> Result<Self, BufferError> {
        let lock = coord.lock(name)?;
        let ring = coord.attach_cell::<Ring<V>>(&lock)?;
        let capacity = {
            let _guard = lock.guard()?;
            ring.read(Ring::capacity)?
        };
        tracing::debug!(buffer = %name, capacity, "attached to bounded buffer");

        Self::bind(name.to_owned(), capacity, lock, ring)
    }

    fn bind(
        name: String,
        capacity: usize,
        lock: C::Lock,
        ring: C::Cell<Ring<V>>,
    ) -> Result<Self, BufferError> {
        let not_empty = lock.new_condition(NOT_EMPTY_CONDITION)?;
        let not_full = lock.new_condition(NOT_FULL_CONDITION)?;
        Ok(Self {
            name,
            capacity,
            lock,
            not_empty,
            not_full,
            ring,
        })
    }

    /// Insert `value`, blocking while the buffer is full.
    ///
    /// On success the value is in the buffer and every consumer waiting for a
    /// value has been woken. If the coordination service fails, the error is
    /// returned as is, the buffer is left unchanged and `value` is dropped.
    pub fn put(&self, value: V) -> Result<(), BufferError> {
        let guard = self.lock.guard()?;
        let mut pending = value;
        loop {
            if !self.ring.read(Ring::is_full)? {
                self.not_empty.signal_all()?;
                match self.ring.update(|ring| ring.push(pending))? {
                    Ok(()) => return Ok(()),
                    Err(rejected) => pending = rejected,
                }
            }
            tracing::trace!(buffer = %self.name, "full, producer parked");
            guard.await_on(&self.not_full)?;
        }
    }

    /// Remove the oldest value, blocking while the buffer is empty.
    ///
    /// If the coordination service fails, the value stays in the buffer for
    /// the next taker.
    pub fn take(&self) -> Result<V, BufferError> {
        let guard = self.lock.guard()?;
        loop {
            if !self.ring.read(Ring::is_empty)? {
                self.not_full.signal_all()?;
                if let Some(value) = self.ring.update(Ring::pop)? {
                    return Ok(value);
                }
            }
            tracing::trace!(buffer = %self.name, "empty, consumer parked");
            guard.await_on(&self.not_empty)?;
        }
    }

    /// Insert `value` if a slot is free, otherwise hand it back without
    /// blocking.
    pub fn try_put(&self, value: V) -> Result<Result<(), V>, BufferError> {
        let _guard = self.lock.guard()?;
        if self.ring.read(Ring::is_full)? {
            return Ok(Err(value));
        }
        self.not_empty.signal_all()?;
        Ok(self.ring.update(|ring| ring.push(value))?)
    }

    /// Remove the oldest value if there is one, without blocking.
    pub fn try_take(&self) -> Result<Option<V>, BufferError> {
        let _guard = self.lock.guard()?;
        if self.ring.read(Ring::is_empty)? {
            return Ok(None);
        }
        self.not_full.signal_all()?;
        Ok(self.ring.update(Ring::pop)?)
    }

    /// Whether the buffer held no value at the time of the call.
    ///
    /// The answer may be stale as soon as the lock is released; use it for
    /// polling, not for deciding whether `take` would block.
    pub fn is_empty(&self) -> Result<bool, BufferError> {
        self.query(Ring::is_empty)
    }

    /// Whether every slot was occupied at the time of the call.
    pub fn is_full(&self) -> Result<bool, BufferError> {
        self.query(Ring::is_full)
    }

    /// Number of values held at the time of the call.
    pub fn len(&self) -> Result<usize, BufferError> {
        self.query(Ring::len)
    }

    /// Indices and occupancy at the time of the call.
    pub fn status(&self) -> Result<RingStatus, BufferError> {
        self.query(Ring::status)
    }

    fn query<R>(&self, f: impl FnOnce(&Ring<V>) -> R) -> Result<R, BufferError> {
        let _guard = self.lock.guard()?;
        Ok(self.ring.read(f)?)
    }

    /// Number of slots. Fixed at construction, read without locking.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Name of the buffer lock; pass it to [`attach`](Self::attach) to share
    /// the buffer.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<V: Send + 'static, C: Coordinator> std::fmt::Debug for BoundedBuffer<V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("not_empty", &self.not_empty.name())
            .field("not_full", &self.not_full.name())
            .finish_non_exhaustive()
    }
}
