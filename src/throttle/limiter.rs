//! Windowed call limiter.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::policy::{LimitPolicy, WaitPolicy};
use super::window::{Admission, AdmissionWindow, WindowSnapshot};
use crate::error::Result;

/// Delays calls so that at most `limit` of them start per window.
///
/// Excess calls are never rejected. A caller that finds the window
/// saturated is suspended until capacity is available, as described by the
/// limiter's [`WaitPolicy`]. Only the waiting call path is suspended; other
/// tasks keep running.
///
/// This struct is thread-safe and can be shared across tasks with `Arc`.
#[derive(Debug)]
pub struct Limiter {
    policy: LimitPolicy,
    window: Mutex<AdmissionWindow>,
}

impl Limiter {
    /// Create a limiter admitting `limit` calls per `window`.
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        Self::with_policy(LimitPolicy::new(limit, window))
    }

    /// Create a limiter from a full policy.
    pub fn with_policy(policy: LimitPolicy) -> Result<Self> {
        policy.validate()?;

        debug!(
            limit = policy.limit,
            window_ms = policy.window_ms,
            wait = ?policy.wait,
            "Creating limiter"
        );

        Ok(Self::from_valid_policy(policy))
    }

    fn from_valid_policy(policy: LimitPolicy) -> Self {
        Self {
            window: Mutex::new(AdmissionWindow::new(
                policy.limit,
                policy.window(),
                Instant::now(),
            )),
            policy,
        }
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> &LimitPolicy {
        &self.policy
    }

    /// Run `task` once the limiter admits it and hand back its output.
    ///
    /// The output is returned untouched, so a failing task's error reaches
    /// the caller as-is. The admission slot is consumed before `task` is
    /// invoked and is not given back when it fails.
    pub async fn execute<F, Fut>(&self, task: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        self.admit().await;
        task().await
    }

    /// Wait until a call may start and count it against the window.
    pub async fn admit(&self) {
        match self.policy.wait {
            WaitPolicy::FullWindow => self.admit_full_window().await,
            WaitPolicy::SharedReset => self.admit_shared_reset().await,
        }
    }

    /// Current window state. Observing never rolls the window over.
    pub fn snapshot(&self) -> WindowSnapshot {
        self.window.lock().snapshot(Instant::now())
    }

    async fn admit_full_window(&self) {
        let admission = self.window.lock().try_admit(Instant::now());

        match admission {
            Admission::Granted { admitted } => {
                trace!(admitted, limit = self.policy.limit, "Call admitted");
            }
            Admission::Saturated { .. } => {
                let window = self.policy.window();
                debug!(
                    limit = self.policy.limit,
                    wait_ms = self.policy.window_ms,
                    "Window saturated, waiting a full window"
                );

                tokio::time::sleep(window).await;

                let mut state = self.window.lock();
                let admitted = state.restart_and_admit(Instant::now());
                state.record_delay();
                trace!(admitted, "Call admitted after waiting");
            }
        }
    }

    async fn admit_shared_reset(&self) {
        let mut delayed = false;

        loop {
            let admission = {
                let mut state = self.window.lock();
                let admission = state.try_admit(Instant::now());
                if delayed && matches!(admission, Admission::Granted { .. }) {
                    state.record_delay();
                }
                admission
            };

            match admission {
                Admission::Granted { admitted } => {
                    trace!(admitted, limit = self.policy.limit, delayed, "Call admitted");
                    return;
                }
                Admission::Saturated { resets_at } => {
                    debug!(
                        limit = self.policy.limit,
                        wait_ms = resets_at
                            .saturating_duration_since(Instant::now())
                            .as_millis() as u64,
                        "Window saturated, waiting for reset"
                    );
                    delayed = true;
                    tokio::time::sleep_until(resets_at).await;
                }
            }
        }
    }
}

impl Default for Limiter {
    /// 15 calls per minute.
    fn default() -> Self {
        Self::from_valid_policy(LimitPolicy::default())
    }
}
