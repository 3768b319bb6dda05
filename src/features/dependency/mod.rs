use crate::common::time::Clock;
use crate::config::{DEFAULT_DEPENDENCY_RETRIES, DEFAULT_DEPENDENCY_RETRY_DELAY_SECS};
use crate::features::results::ResultStore;
use crate::probe::ProbeResult;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_DEPENDENCY_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_DEPENDENCY_RETRY_DELAY_SECS),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DependencyError {
    #[error("dependency {dependency} not resolved after {attempts} retries")]
    Unresolved { dependency: String, attempts: u32 },
}

/// Polls the result store for a dependency's result. This is best-effort: it
/// converges only if the dependency publishes within the retry window.
pub struct DependencyWaiter<'a> {
    store: &'a ResultStore,
    clock: &'a dyn Clock,
    policy: WaitPolicy,
}

impl<'a> DependencyWaiter<'a> {
    pub fn new(store: &'a ResultStore, clock: &'a dyn Clock, policy: WaitPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Returns the dependency's result as soon as it is present. Each missed
    /// attempt calls `on_retry(attempt)` and sleeps `retry_delay`; after the
    /// last attempt the store is checked once more before giving up.
    pub fn wait_for(
        &self,
        dependency: &str,
        mut on_retry: impl FnMut(u32),
    ) -> Result<ProbeResult, DependencyError> {
        for attempt in 1..=self.policy.max_attempts {
            if let Some(result) = self.store.get(dependency) {
                return Ok(result);
            }
            on_retry(attempt);
            self.clock.sleep(self.policy.retry_delay);
        }

        self.store
            .get(dependency)
            .ok_or_else(|| DependencyError::Unresolved {
                dependency: dependency.to_string(),
                attempts: self.policy.max_attempts,
            })
    }
}
