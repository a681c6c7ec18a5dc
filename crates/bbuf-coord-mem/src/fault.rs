//! Fault injection for testing.
//!
//! The in-process coordinator never fails on its own. To exercise the error
//! paths of code built on top of it, a [`FaultInjector`] can simulate an
//! unreachable service: every coordination call consults it first and fails
//! with [`CoordError::Unavailable`] when told to.
//!
//! # Example
//!
//! ```rust
//! use bbuf_coord_mem::{FaultAction, FaultInjector};
//!
//! let injector = FaultInjector::new();
//! injector.set_error_rate(500); // 5.00% of calls fail
//!
//! match injector.action() {
//!     FaultAction::Pass => { /* proceed */ }
//!     FaultAction::Fail => { /* report the service as unavailable */ }
//!     FaultAction::Delay(_) => { /* stall, then proceed */ }
//! }
//! ```

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use bbuf_coord::CoordError;

/// Initial fault settings of a coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultConfig {
    /// Start with the service marked unreachable.
    pub outage: bool,
    /// Share of calls that fail, in basis points (0-10000 = 0.00%-100.00%).
    pub error_rate: u32,
    /// Stall applied to every call, in milliseconds.
    pub delay_ms: u32,
}

/// Action to take for a coordination call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultAction {
    /// Serve the call normally.
    Pass,
    /// Report the service as unavailable.
    Fail,
    /// Stall for the given duration, then serve the call.
    Delay(Duration),
}

pub struct FaultInjector {
    outage: AtomicBool,
    /// Error rate in basis points (0-10000 = 0.00%-100.00%)
    error_rate: AtomicU32,
    delay_ms: AtomicU32,
    /// Calls still allowed through before every call fails; `u64::MAX` when
    /// unarmed.
    pass_budget: AtomicU64,
    /// Counter for generating pseudo-random values
    counter: AtomicU64,
    random_state: RandomState,
    injected: AtomicU64,
}

impl FaultInjector {
    /// Create an injector with all faults disabled.
    pub fn new() -> Self {
        Self::from_config(&FaultConfig::default())
    }

    pub fn from_config(config: &FaultConfig) -> Self {
        FaultInjector {
            outage: AtomicBool::new(config.outage),
            error_rate: AtomicU32::new(config.error_rate.min(10000)),
            delay_ms: AtomicU32::new(config.delay_ms),
            pass_budget: AtomicU64::new(u64::MAX),
            counter: AtomicU64::new(0),
            random_state: RandomState::new(),
            injected: AtomicU64::new(0),
        }
    }

    /// Decide what to do with the next call.
    ///
    /// An outage takes priority over an exhausted pass budget, then the error
    /// rate, then the delay.
    pub fn action(&self) -> FaultAction {
        if self.outage.load(Ordering::Relaxed) {
            return FaultAction::Fail;
        }

        let budget = self
            .pass_budget
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |budget| match budget {
                u64::MAX | 0 => None,
                budget => Some(budget - 1),
            });
        if budget == Err(0) {
            return FaultAction::Fail;
        }

        let error_rate = self.error_rate.load(Ordering::Relaxed);
        if error_rate > 0 && self.rand_basis_points() < error_rate {
            return FaultAction::Fail;
        }

        let delay_ms = self.delay_ms.load(Ordering::Relaxed);
        if delay_ms > 0 {
            return FaultAction::Delay(Duration::from_millis(delay_ms as u64));
        }

        FaultAction::Pass
    }

    /// Apply the next action to a call on the object `name`.
    pub fn check(&self, name: &str) -> Result<(), CoordError> {
        match self.action() {
            FaultAction::Pass => Ok(()),
            FaultAction::Delay(duration) => {
                std::thread::sleep(duration);
                Ok(())
            }
            FaultAction::Fail => {
                self.injected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(object = %name, "injected coordination failure");
                Err(CoordError::Unavailable {
                    name: name.to_owned(),
                })
            }
        }
    }

    /// Mark the service reachable or unreachable.
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::Relaxed);
    }

    /// Let the next `calls` calls through, then fail every call until
    /// [`clear_fail_after`](Self::clear_fail_after).
    ///
    /// Used to land a failure at an exact point inside a multi-call sequence.
    pub fn fail_after(&self, calls: u64) {
        self.pass_budget
            .store(calls.min(u64::MAX - 1), Ordering::Relaxed);
    }

    pub fn clear_fail_after(&self) {
        self.pass_budget.store(u64::MAX, Ordering::Relaxed);
    }

    /// Values above 10000 are clamped to 10000.
    pub fn set_error_rate(&self, rate: u32) {
        self.error_rate.store(rate.min(10000), Ordering::Relaxed);
    }

    pub fn set_delay(&self, delay_ms: u32) {
        self.delay_ms.store(delay_ms, Ordering::Relaxed);
    }

    pub fn outage(&self) -> bool {
        self.outage.load(Ordering::Relaxed)
    }

    pub fn error_rate(&self) -> u32 {
        self.error_rate.load(Ordering::Relaxed)
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms.load(Ordering::Relaxed)
    }

    /// Number of failures injected so far.
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    /// Pseudo-random value in [0, 10000), derived from a counter and a hasher.
    fn rand_basis_points(&self) -> u32 {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = self.random_state.build_hasher();
        counter.hash(&mut hasher);
        (hasher.finish() % 10000) as u32
    }
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FaultInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjector")
            .field("outage", &self.outage())
            .field("error_rate", &self.error_rate())
            .field("delay_ms", &self.delay_ms())
            .field("injected", &self.injected())
            .finish()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn new_injector_passes_all() {
        let injector = FaultInjector::new();
        for _ in 0..100 {
            assert_eq!(injector.action(), FaultAction::Pass);
            assert!(injector.check("lock").is_ok());
        }
        assert_eq!(injector.injected(), 0);
    }

    #[test]
    fn outage_fails_every_call() {
        let injector = FaultInjector::new();
        injector.set_outage(true);
        for _ in 0..10 {
            assert_eq!(
                injector.check("lock"),
                Err(CoordError::Unavailable {
                    name: "lock".into()
                })
            );
        }
        assert_eq!(injector.injected(), 10);

        injector.set_outage(false);
        assert!(injector.check("lock").is_ok());
    }

    #[test]
    fn outage_takes_priority_over_delay() {
        let injector = FaultInjector::from_config(&FaultConfig {
            outage: true,
            error_rate: 0,
            delay_ms: 50,
        });
        assert_eq!(injector.action(), FaultAction::Fail);
    }

    #[test]
    fn fail_after_lets_budget_through_then_fails() {
        let injector = FaultInjector::new();
        injector.fail_after(2);
        assert!(injector.check("lock").is_ok());
        assert!(injector.check("lock").is_ok());
        assert!(injector.check("lock").is_err());
        assert!(injector.check("lock").is_err());

        injector.clear_fail_after();
        assert!(injector.check("lock").is_ok());
        assert_eq!(injector.injected(), 2);
    }

    #[test]
    fn set_error_rate_clamps_to_max() {
        let injector = FaultInjector::new();
        injector.set_error_rate(20000);
        assert_eq!(injector.error_rate(), 10000);

        let injector = FaultInjector::from_config(&FaultConfig {
            error_rate: 20000,
            ..FaultConfig::default()
        });
        assert_eq!(injector.error_rate(), 10000);
    }

    #[test]
    fn delay_always_delays() {
        let injector = FaultInjector::new();
        injector.set_delay(5);
        match injector.action() {
            FaultAction::Delay(d) => assert_eq!(d.as_millis(), 5),
            other => panic!("expected Delay(5ms), got {:?}", other),
        }
    }

    #[test]
    fn error_rate_is_statistical() {
        let injector = FaultInjector::new();
        injector.set_error_rate(5000);

        let trials = 1000;
        let failures = (0..trials)
            .filter(|_| injector.action() == FaultAction::Fail)
            .count();

        assert!(
            (400..=600).contains(&failures),
            "expected ~500 failures with 50% rate, got {}",
            failures
        );
    }
}
