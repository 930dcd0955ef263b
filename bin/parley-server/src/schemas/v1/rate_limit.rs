use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::UsageRecord;
use crate::limiter::Admission;

/// Response body for `GET /v1/rate-limit`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub can_send_message: bool,
    pub current_count: i64,
    pub limit: i64,
    pub remaining: i64,
    /// Monday 00:00 of the current week (RFC 3339).
    pub week_start: String,
    /// When the counter starts again from zero (RFC 3339).
    pub reset_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageCountResponse {
    pub message_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageHistoryEntry {
    /// Epoch milliseconds.
    pub week_start: i64,
    pub count: i64,
    /// Epoch milliseconds.
    pub last_updated: i64,
}

impl From<Admission> for RateLimitStatus {
    fn from(a: Admission) -> Self {
        Self {
            can_send_message: a.admitted,
            current_count: a.used,
            limit: a.limit,
            remaining: a.remaining,
            week_start: a.window.start.to_rfc3339(),
            reset_date: a.reset_at().to_rfc3339(),
        }
    }
}

impl From<UsageRecord> for UsageHistoryEntry {
    fn from(r: UsageRecord) -> Self {
        Self {
            week_start: r.week_start,
            count: r.message_count,
            last_updated: r.last_updated,
        }
    }
}
