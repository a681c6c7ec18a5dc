use std::sync::Arc;

use bbuf_coord::{CoordError, DistributedLock, ReplicatedCell};

use crate::fault::FaultInjector;
use crate::lock::MemLock;
use crate::sync::{Mutex, lock};

/// State cell guarded by a [`MemLock`].
///
/// The value lives once per coordinator; every handle attached under the same
/// name sees the same value.
pub struct MemCell<S> {
    lock: MemLock,
    value: Arc<Mutex<S>>,
    faults: Arc<FaultInjector>,
}

impl<S> MemCell<S> {
    pub(crate) fn new(lock: MemLock, value: Arc<Mutex<S>>, faults: Arc<FaultInjector>) -> Self {
        Self {
            lock,
            value,
            faults,
        }
    }

    fn ensure_owned(&self) -> Result<(), CoordError> {
        if !self.lock.is_held_by_current() {
            return Err(CoordError::NotOwner {
                name: self.lock.name().to_owned(),
            });
        }
        self.faults.check(self.lock.name())
    }
}

impl<S: Send> ReplicatedCell<S> for MemCell<S> {
    fn name(&self) -> &str {
        self.lock.name()
    }

    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R, CoordError> {
        self.ensure_owned()?;
        let value = lock(&self.value);
        Ok(f(&*value))
    }

    fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, CoordError> {
        self.ensure_owned()?;
        let mut value = lock(&self.value);
        Ok(f(&mut *value))
    }
}

impl<S> Clone for MemCell<S> {
    fn clone(&self) -> Self {
        Self {
            lock: self.lock.clone(),
            value: self.value.clone(),
            faults: self.faults.clone(),
        }
    }
}

impl<S> std::fmt::Debug for MemCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemCell")
            .field("name", &self.lock.name())
            .finish_non_exhaustive()
    }
}
