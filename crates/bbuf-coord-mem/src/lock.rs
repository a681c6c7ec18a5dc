use std::collections::HashMap;
use std::sync::Arc;

use bbuf_coord::{CoordError, DistributedCondition, DistributedLock};

use crate::fault::FaultInjector;
use crate::sync::{Condvar, Mutex, ThreadId, current, lock, wait};

/// Ownership and wait-queue bookkeeping of one named lock.
///
/// Every handle obtained under the same name shares one `LockCore`.
pub(crate) struct LockCore {
    name: String,
    state: Mutex<LockState>,
    /// Signaled whenever the lock becomes free.
    released: Condvar,
    /// One queue per condition name; the generations live in `LockState`.
    queues: Mutex<HashMap<String, Arc<Condvar>>>,
    faults: Arc<FaultInjector>,
}

struct LockState {
    owner: Option<ThreadId>,
    holds: usize,
    /// Bumped by every `signal_all` on the condition of that name.
    generations: HashMap<String, u64>,
}

impl LockCore {
    pub(crate) fn new(name: &str, faults: Arc<FaultInjector>) -> Self {
        Self {
            name: name.to_owned(),
            state: Mutex::new(LockState {
                owner: None,
                holds: 0,
                generations: HashMap::new(),
            }),
            released: Condvar::new(),
            queues: Mutex::new(HashMap::new()),
            faults,
        }
    }

    fn not_owner(&self) -> CoordError {
        CoordError::NotOwner {
            name: self.name.clone(),
        }
    }
}

/// Reentrant lock owned by the calling thread.
///
/// Cloning yields another handle to the same lock.
#[derive(Clone)]
pub struct MemLock {
    core: Arc<LockCore>,
}

impl MemLock {
    pub(crate) fn from_core(core: Arc<LockCore>) -> Self {
        Self { core }
    }

    /// Whether `self` and `other` are handles to the same named lock.
    pub fn same_lock(&self, other: &MemLock) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl DistributedLock for MemLock {
    type Condition = MemCondition;

    fn name(&self) -> &str {
        &self.core.name
    }

    fn lock(&self) -> Result<(), CoordError> {
        self.core.faults.check(&self.core.name)?;

        let me = current().id();
        let mut state = lock(&self.core.state);
        if state.owner == Some(me) {
            state.holds += 1;
            tracing::trace!(lock = %self.core.name, holds = state.holds, "reentered");
            return Ok(());
        }

        while state.owner.is_some() {
            state = wait(&self.core.released, state);
        }
        state.owner = Some(me);
        state.holds = 1;
        tracing::trace!(lock = %self.core.name, "acquired");
        Ok(())
    }

    fn unlock(&self) -> Result<(), CoordError> {
        let me = current().id();
        let mut state = lock(&self.core.state);
        if state.owner != Some(me) {
            return Err(self.core.not_owner());
        }

        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            self.core.released.notify_one();
            tracing::trace!(lock = %self.core.name, "released");
        }
        Ok(())
    }

    fn new_condition(&self, name: &str) -> Result<MemCondition, CoordError> {
        self.core.faults.check(&self.core.name)?;

        let queue = lock(&self.core.queues)
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Condvar::new()))
            .clone();
        lock(&self.core.state)
            .generations
            .entry(name.to_owned())
            .or_insert(0);

        Ok(MemCondition {
            core: self.core.clone(),
            name: name.to_owned(),
            queue,
        })
    }

    fn is_held_by_current(&self) -> bool {
        lock(&self.core.state).owner == Some(current().id())
    }

    fn hold_count(&self) -> usize {
        let state = lock(&self.core.state);
        if state.owner == Some(current().id()) {
            state.holds
        } else {
            0
        }
    }
}

impl std::fmt::Debug for MemLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemLock")
            .field("name", &self.core.name)
            .finish_non_exhaustive()
    }
}

/// Named wait-queue of a [`MemLock`].
#[derive(Clone)]
pub struct MemCondition {
    core: Arc<LockCore>,
    name: String,
    queue: Arc<Condvar>,
}

impl MemCondition {
    fn generation(&self, generations: &HashMap<String, u64>) -> u64 {
        generations.get(&self.name).copied().unwrap_or(0)
    }
}

impl DistributedCondition for MemCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn await_uninterruptibly(&self) -> Result<(), CoordError> {
        let me = current().id();
        if lock(&self.core.state).owner != Some(me) {
            return Err(self.core.not_owner());
        }
        self.core.faults.check(&self.core.name)?;

        let mut state = lock(&self.core.state);
        let saved_holds = state.holds;
        let entered = self.generation(&state.generations);

        // Releasing and parking happen under the same internal mutex, so a
        // signal issued by the next owner cannot be missed.
        state.owner = None;
        state.holds = 0;
        self.core.released.notify_one();
        tracing::trace!(lock = %self.core.name, condition = %self.name, "parked");

        while self.generation(&state.generations) == entered {
            state = wait(&self.queue, state);
        }
        while state.owner.is_some() {
            state = wait(&self.core.released, state);
        }
        state.owner = Some(me);
        state.holds = saved_holds;
        tracing::trace!(lock = %self.core.name, condition = %self.name, "woken");
        Ok(())
    }

    fn signal_all(&self) -> Result<(), CoordError> {
        let me = current().id();
        if lock(&self.core.state).owner != Some(me) {
            return Err(self.core.not_owner());
        }
        self.core.faults.check(&self.core.name)?;

        let mut state = lock(&self.core.state);
        let generation = state.generations.entry(self.name.clone()).or_insert(0);
        *generation = generation.wrapping_add(1);
        self.queue.notify_all();
        Ok(())
    }
}

impl std::fmt::Debug for MemCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemCondition")
            .field("lock", &self.core.name)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
