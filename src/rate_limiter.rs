use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::constants::{
    DEFAULT_MAX_REPORTS_PER_WINDOW, DEFAULT_WINDOW_SECONDS, MAX_WINDOW_SECONDS,
};
use crate::error::{PhishError, Result};
use crate::storage::Storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_per_window: u64,
    pub window_duration_seconds: u64,
    /// Re-check the limit atomically with the insert instead of relying on the
    /// up-front count alone.
    pub strict: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: DEFAULT_MAX_REPORTS_PER_WINDOW,
            window_duration_seconds: DEFAULT_WINDOW_SECONDS,
            strict: false,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_duration_seconds == 0 || self.window_duration_seconds > MAX_WINDOW_SECONDS {
            return Err(PhishError::Config(format!(
                "rate_limit.window_duration_seconds must be between 1 and {}, got {}",
                MAX_WINDOW_SECONDS, self.window_duration_seconds
            )));
        }
        Ok(())
    }

    fn window(&self) -> Duration {
        let secs = self.window_duration_seconds.min(MAX_WINDOW_SECONDS) as i64;
        Duration::try_seconds(secs).unwrap_or(Duration::zero())
    }
}

/// Per-user submission limit over a rolling window, counted from durable reports.
///
/// The check reserves nothing. Two submissions racing the same count can both
/// pass unless `strict` is set, in which case the store enforces the limit again
/// inside the insert.
pub struct RateLimiter {
    storage: Arc<dyn Storage>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(storage: Arc<dyn Storage>, config: RateLimitConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn limit(&self) -> u64 {
        self.config.max_per_window
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.config.window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Accept when the user has fewer than `limit` reports created at or after `window_start`.
    pub async fn check_and_count(
        &self,
        user_id: Uuid,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> Result<bool> {
        let count = self.storage.count_reports_since(user_id, window_start).await?;
        debug!(%user_id, count, limit, "Rate limit check");
        Ok(count < limit)
    }

    /// `check_and_count` with the configured window ending at `now`.
    pub async fn check(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.check_and_count(user_id, self.window_start(now), self.config.max_per_window)
            .await
    }
}
