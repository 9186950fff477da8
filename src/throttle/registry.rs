//! Keyed limiter registry.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::limiter::Limiter;
use super::policy::LimitPolicy;
use super::rules::LimitRules;
use crate::error::Result;

/// Independent limiters indexed by key.
///
/// Limiters are created on first use from the matching rule. Calls under
/// different keys never affect each other's admission timing.
#[derive(Debug)]
pub struct LimiterRegistry {
    limiters: DashMap<String, Arc<Limiter>>,
    rules: LimitRules,
}

impl LimiterRegistry {
    /// Create a registry where every key gets `default_policy`.
    pub fn new(default_policy: LimitPolicy) -> Result<Self> {
        Self::with_rules(LimitRules::new(default_policy))
    }

    /// Create a registry from per-key rules.
    pub fn with_rules(rules: LimitRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self {
            limiters: DashMap::new(),
            rules,
        })
    }

    /// The rules this registry creates limiters from.
    pub fn rules(&self) -> &LimitRules {
        &self.rules
    }

    /// Get the limiter for `key`, creating it if needed.
    pub fn limiter(&self, key: &str) -> Result<Arc<Limiter>> {
        if let Some(limiter) = self.limiters.get(key) {
            return Ok(limiter.value().clone());
        }

        let entry = self
            .limiters
            .entry(key.to_string())
            .or_try_insert_with(|| {
                let policy = self.rules.policy_for(key);
                debug!(
                    key = %key,
                    limit = policy.limit,
                    window_ms = policy.window_ms,
                    "Creating limiter for key"
                );
                Limiter::with_policy(policy).map(Arc::new)
            })?;
        Ok(entry.value().clone())
    }

    /// Run `task` through the limiter for `key`.
    ///
    /// Only a failure to build the key's limiter is reported as an error;
    /// the task's own output is returned inside `Ok` unchanged.
    pub async fn execute<F, Fut>(&self, key: &str, task: F) -> Result<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let limiter = self.limiter(key)?;
        Ok(limiter.execute(task).await)
    }

    /// Drop the limiter for `key`. Its window state is lost.
    pub fn remove(&self, key: &str) -> Option<Arc<Limiter>> {
        self.limiters.remove(key).map(|(_, limiter)| limiter)
    }

    /// Drop all limiters.
    pub fn clear(&self) {
        self.limiters.clear();
    }

    /// Number of limiters created so far.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Whether no limiter has been created yet.
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
