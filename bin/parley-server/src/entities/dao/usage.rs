/// A row in the `usage_counters` table.
///
/// Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub user_id: String,
    /// Monday 00:00 of the accounting week.
    pub week_start: i64,
    pub message_count: i64,
    pub last_updated: i64,
}
