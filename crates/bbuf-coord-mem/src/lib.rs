//! In-process coordination service.
//!
//! [`MemCoordinator`] implements the [`bbuf_coord`] contract for participants
//! that live in one process. Locks, conditions and cells are looked up by name
//! in a registry shared by every clone of the coordinator, so two handles
//! obtained under the same name refer to the same object, as they would on a
//! cluster.
//!
//! Objects live as long as the service: dropping every handle to a lock or cell
//! does not remove it, just as it would not on a cluster. Use
//! [`MemCoordinator::destroy`] to retire a name explicitly.
//!
//! The logical owner of a lock is the calling thread. Locks are reentrant and
//! count hold levels; a condition wait releases every level and restores them
//! on wake.
//!
//! # Fault injection
//!
//! Every coordinator carries a [`FaultInjector`]. Tests use it to make the
//! service look unreachable and observe how callers propagate
//! [`CoordError::Unavailable`].
//!
//! # Loom Testing
//!
//! Enable the `loom` feature to model-check the lock and condition protocol:
//!
//! ```text
//! cargo test -p bbuf-coord-mem --features loom
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use bbuf_coord::{CoordError, Coordinator, DistributedLock};

pub mod cell;
pub mod fault;
pub mod lock;
mod sync;

pub use cell::MemCell;
pub use fault::{FaultAction, FaultConfig, FaultInjector};
pub use lock::{MemCondition, MemLock};

use crate::lock::LockCore;
use crate::sync::Mutex;

/// Shared registry behind every clone of a [`MemCoordinator`].
struct Registry {
    locks: Mutex<HashMap<String, Arc<LockCore>>>,
    cells: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    faults: Arc<FaultInjector>,
}

/// Coordination service whose participants are threads of this process.
#[derive(Clone)]
pub struct MemCoordinator {
    registry: Arc<Registry>,
}

impl MemCoordinator {
    /// Create a coordinator with fault injection disabled.
    pub fn new() -> Self {
        Self::with_faults(&FaultConfig::default())
    }

    pub fn with_faults(config: &FaultConfig) -> Self {
        Self {
            registry: Arc::new(Registry {
                locks: Mutex::new(HashMap::new()),
                cells: Mutex::new(HashMap::new()),
                faults: Arc::new(FaultInjector::from_config(config)),
            }),
        }
    }

    /// The fault injector consulted by every call on this coordinator.
    pub fn faults(&self) -> &FaultInjector {
        &self.registry.faults
    }

    /// Names of every lock created so far, sorted.
    pub fn lock_names(&self) -> Vec<String> {
        let mut names: Vec<String> = sync::lock(&self.registry.locks).keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove the lock named `name` and the cell it guards from the registry.
    ///
    /// Handles obtained earlier keep working on the retired objects, which are
    /// freed once the last of them is dropped. Looking the name up again
    /// creates a fresh lock; attaching to its cell fails with
    /// [`CoordError::UnknownObject`]. Returns whether anything was removed.
    pub fn destroy(&self, name: &str) -> bool {
        let lock = sync::lock(&self.registry.locks).remove(name);
        let cell = sync::lock(&self.registry.cells).remove(name);
        let removed = lock.is_some() || cell.is_some();
        if removed {
            tracing::debug!(lock = %name, "destroyed lock and cell");
        }
        removed
    }

    fn downcast_cell<S: Send + 'static>(
        &self,
        lock: &MemLock,
        slot: Arc<dyn Any + Send + Sync>,
    ) -> Result<MemCell<S>, CoordError> {
        let value = slot
            .downcast::<Mutex<S>>()
            .map_err(|_| CoordError::TypeMismatch {
                name: lock.name().to_owned(),
            })?;
        Ok(MemCell::new(
            lock.clone(),
            value,
            self.registry.faults.clone(),
        ))
    }
}

impl Default for MemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemCoordinator")
            .field("locks", &self.lock_names())
            .field("faults", &self.registry.faults)
            .finish()
    }
}

impl Coordinator for MemCoordinator {
    type Lock = MemLock;
    type Cell<S: Send + 'static> = MemCell<S>;

    fn lock(&self, name: &str) -> Result<MemLock, CoordError> {
        self.registry.faults.check(name)?;

        let core = sync::lock(&self.registry.locks)
            .entry(name.to_owned())
            .or_insert_with(|| {
                tracing::debug!(lock = %name, "created lock");
                Arc::new(LockCore::new(name, self.registry.faults.clone()))
            })
            .clone();
        Ok(MemLock::from_core(core))
    }

    fn cell<S: Send + 'static>(
        &self,
        lock: &MemLock,
        init: impl FnOnce() -> S,
    ) -> Result<MemCell<S>, CoordError> {
        self.registry.faults.check(lock.name())?;

        let slot = sync::lock(&self.registry.cells)
            .entry(lock.name().to_owned())
            .or_insert_with(|| {
                let slot: Arc<dyn Any + Send + Sync> = Arc::new(Mutex::new(init()));
                slot
            })
            .clone();
        self.downcast_cell(lock, slot)
    }

    fn attach_cell<S: Send + 'static>(&self, lock: &MemLock) -> Result<MemCell<S>, CoordError> {
        self.registry.faults.check(lock.name())?;

        let slot = sync::lock(&self.registry.cells)
            .get(lock.name())
            .cloned()
            .ok_or_else(|| CoordError::UnknownObject {
                name: lock.name().to_owned(),
            })?;
        self.downcast_cell(lock, slot)
    }
}
