//! Weekly message quota.
//!
//! Usage is counted per user per calendar week (Monday 00:00 local time to
//! the following Monday). [`RateLimiter::try_increment`] is the admission
//! gate; it relies on [`UsageStore::try_increment`] being atomic per
//! `(user, week)` key, so concurrent requests can never overshoot the limit.

pub mod window;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use window::WeekWindow;

use crate::entities::{UsageRecord, UsageStore};

/// Number of past weeks returned by [`RateLimiter::history`].
pub const HISTORY_WEEKS: i64 = 10;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("weekly message limit of {limit} reached")]
    QuotaExceeded { limit: i64 },

    #[error("usage store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Read-only view of a user's quota in one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
    pub window: WeekWindow,
}

impl Admission {
    /// When the quota resets: the start of the next window.
    pub fn reset_at(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.window.end
    }
}

#[derive(Debug)]
pub struct RateLimiter<S> {
    store: Arc<S>,
    limit: i64,
}

impl<S> Clone for RateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            limit: self.limit,
        }
    }
}

impl<S: UsageStore> RateLimiter<S> {
    pub fn new(store: Arc<S>, limit: i64) -> Self {
        Self {
            store,
            limit: limit.max(0),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Current quota for `user_id`. Never mutates.
    pub async fn check_admission(&self, user_id: &str) -> Result<Admission, RateLimitError> {
        self.check_admission_in(user_id, WeekWindow::current()).await
    }

    pub async fn check_admission_in(
        &self,
        user_id: &str,
        window: WeekWindow,
    ) -> Result<Admission, RateLimitError> {
        let used = self
            .store
            .get_usage(user_id, window.start_ms())
            .await?
            .map(|r| r.message_count)
            .unwrap_or(0);
        debug!(user_id, used, limit = self.limit, "checked admission");
        Ok(Admission {
            admitted: used < self.limit,
            used,
            limit: self.limit,
            remaining: (self.limit - used).max(0),
            window,
        })
    }

    /// Count one message against the current week. Returns the new count or
    /// [`RateLimitError::QuotaExceeded`] without touching stored state.
    pub async fn try_increment(&self, user_id: &str) -> Result<i64, RateLimitError> {
        self.try_increment_in(user_id, WeekWindow::current()).await
    }

    pub async fn try_increment_in(
        &self,
        user_id: &str,
        window: WeekWindow,
    ) -> Result<i64, RateLimitError> {
        let now_ms = Utc::now().timestamp_millis();
        match self
            .store
            .try_increment(user_id, window.start_ms(), self.limit, now_ms)
            .await?
        {
            Some(count) => {
                info!(user_id, count, limit = self.limit, "message admitted");
                Ok(count)
            }
            None => {
                warn!(user_id, limit = self.limit, "weekly message limit reached");
                Err(RateLimitError::QuotaExceeded { limit: self.limit })
            }
        }
    }

    /// Give back one message (e.g. after a failed send). Floors at zero.
    pub async fn decrement(&self, user_id: &str) -> Result<i64, RateLimitError> {
        self.decrement_in(user_id, WeekWindow::current()).await
    }

    pub async fn decrement_in(
        &self,
        user_id: &str,
        window: WeekWindow,
    ) -> Result<i64, RateLimitError> {
        let now_ms = Utc::now().timestamp_millis();
        let count = self
            .store
            .decrement(user_id, window.start_ms(), now_ms)
            .await?;
        info!(user_id, count, "message usage decremented");
        Ok(count)
    }

    /// Up to [`HISTORY_WEEKS`] weekly records, most recent first.
    pub async fn history(&self, user_id: &str) -> Result<Vec<UsageRecord>, RateLimitError> {
        Ok(self.store.usage_history(user_id, HISTORY_WEEKS).await?)
    }
}
