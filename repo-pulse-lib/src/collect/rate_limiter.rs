//! Sliding-window call budget.
//!
//! The local window is checked first: [`RateLimiter::wait_if_needed`] parks the
//! caller until fewer than `max_requests` calls were recorded within the trailing
//! window. When the remote API still reports exhaustion, [`RateLimiter::call`] sleeps
//! until the reported reset plus a margin and retries the same operation, a bounded
//! number of times.

use super::github::{ApiError, ApiResult, RateLimitInfo};
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

const LOG_TARGET: &str = "      rate";

/// Tuning for [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    /// Calls the remote API allows per window.
    pub limit: u32,

    /// Fraction of `limit` this process allows itself, in (0, 1].
    pub buffer: f64,

    pub window: Duration,

    /// Added to the remote reset time before retrying a rate-limited call.
    pub reset_margin: Duration,

    /// Upper bound of a single rate-limit sleep.
    pub max_wait: Duration,

    /// Retries of one operation after rate-limited responses.
    pub max_retries: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: 5000,
            buffer: 0.8,
            window: Duration::from_secs(3600),
            reset_margin: Duration::from_secs(1),
            max_wait: Duration::from_secs(3600),
            max_retries: 3,
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    max_requests: usize,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "product is a small non-negative call count")]
    pub fn new(settings: RateLimitSettings) -> Self {
        let max_requests = (f64::from(settings.limit) * settings.buffer).floor().max(1.0) as usize;

        Self {
            settings,
            max_requests,
            calls: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    #[must_use]
    pub const fn max_requests(&self) -> usize {
        self.max_requests
    }

    #[must_use]
    pub const fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Wait until another call fits in the window.
    pub async fn wait_if_needed(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().expect("lock not poisoned");
                let now = Instant::now();
                self.prune(&mut calls, now);

                if calls.len() < self.max_requests {
                    return;
                }

                // The window is full, so the oldest entry exists.
                calls.front().map_or(Duration::ZERO, |oldest| (*oldest + self.settings.window).saturating_duration_since(now))
            };

            log::info!(
                target: LOG_TARGET,
                "Local call budget of {} per {:?} reached, waiting {:.1}s",
                self.max_requests,
                self.settings.window,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Record one call against the budget.
    pub fn record(&self) {
        let mut calls = self.calls.lock().expect("lock not poisoned");
        calls.push_back(Instant::now());
    }

    /// Calls still allowed in the current window.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        let mut calls = self.calls.lock().expect("lock not poisoned");
        self.prune(&mut calls, Instant::now());
        self.max_requests.saturating_sub(calls.len())
    }

    /// Run one logical API operation under the budget.
    ///
    /// Every attempt waits for local capacity first and is recorded once the server
    /// answered. A rate-limited answer is retried after the reported reset, up to
    /// `max_retries` times; the last rate-limited error is returned after that.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut retries = 0;
        loop {
            self.wait_if_needed().await;
            let result = op().await;

            if result.as_ref().err().is_none_or(ApiError::reached_server) {
                self.record();
            }

            match result {
                Err(ApiError::RateLimited(info)) if retries < self.settings.max_retries => {
                    retries += 1;
                    let wait = self.reset_wait(&info, Utc::now());
                    log::warn!(
                        target: LOG_TARGET,
                        "Rate limited while {operation}, retry {retries}/{} in {:.0}s (resets at {})",
                        self.settings.max_retries,
                        wait.as_secs_f64(),
                        info.reset_at.with_timezone(&chrono::Local).format("%T")
                    );
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    /// Time to sleep after a rate-limited response: until reset plus margin, capped at `max_wait`.
    #[must_use]
    pub fn reset_wait(&self, info: &RateLimitInfo, now: DateTime<Utc>) -> Duration {
        let until_reset = (info.reset_at - now).to_std().unwrap_or(Duration::ZERO);
        (until_reset + self.settings.reset_margin).min(self.settings.max_wait)
    }

    fn prune(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while calls.front().is_some_and(|t| now.saturating_duration_since(*t) >= self.settings.window) {
            let _ = calls.pop_front();
        }
    }
}
