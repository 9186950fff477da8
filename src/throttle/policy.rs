//! Limit policies: how many admissions per window, and how saturated callers wait.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GateError, Result};

/// Default number of admissions per window.
pub const DEFAULT_LIMIT: u32 = 15;
/// Default window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// How a caller that finds the window saturated waits for capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Sleep a full window from the failed check, then restart the window
    /// and proceed without re-checking. Each waiter waits on its own.
    #[default]
    FullWindow,
    /// Sleep until the current window's reset point, then re-run the
    /// admission check. Waiters share the reset point and race for the
    /// fresh window's slots.
    SharedReset,
}

/// A rate policy: at most `limit` admissions per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPolicy {
    /// Maximum admissions allowed per window
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Behaviour once the window is saturated
    #[serde(default)]
    pub wait: WaitPolicy,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window_ms: DEFAULT_WINDOW_MS,
            wait: WaitPolicy::default(),
        }
    }
}

impl LimitPolicy {
    /// Create a policy with the default wait behaviour.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window_ms: window.as_millis().try_into().unwrap_or(u64::MAX),
            wait: WaitPolicy::default(),
        }
    }

    /// Replace the wait behaviour.
    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// The window as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Reject policies that cannot admit anything.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(GateError::InvalidConfiguration(
                "limit must be greater than zero".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(GateError::InvalidConfiguration(
                "window must be at least one millisecond".to_string(),
            ));
        }
        Ok(())
    }
}
