use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use crate::entities::{SqlStore, dao::UsageRecord};

/// Weekly message counters keyed by `(user_id, week_start)`.
///
/// `try_increment` and `decrement` must be atomic per key: two concurrent
/// calls for the same key may never both observe the same starting count.
pub trait UsageStore: Send + Sync + 'static {
    fn get_usage(
        &self,
        user_id: &str,
        week_start: i64,
    ) -> impl Future<Output = Result<Option<UsageRecord>, sqlx::Error>> + Send;

    /// Create the row with a count of 1 (when `limit` is positive), or add one
    /// to an existing count below `limit`. Returns the new count, or `None`
    /// when the count had already reached `limit` (the row is left untouched).
    fn try_increment(
        &self,
        user_id: &str,
        week_start: i64,
        limit: i64,
        now_ms: i64,
    ) -> impl Future<Output = Result<Option<i64>, sqlx::Error>> + Send;

    /// Subtract one, never going below zero. Returns the new count; a missing
    /// row counts as zero and is not created.
    fn decrement(
        &self,
        user_id: &str,
        week_start: i64,
        now_ms: i64,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Most recent weeks first.
    fn usage_history(
        &self,
        user_id: &str,
        max_weeks: i64,
    ) -> impl Future<Output = Result<Vec<UsageRecord>, sqlx::Error>> + Send;
}

type UsageRow = (String, i64, i64, i64);

fn to_record((user_id, week_start, message_count, last_updated): UsageRow) -> UsageRecord {
    UsageRecord {
        user_id,
        week_start,
        message_count,
        last_updated,
    }
}

impl UsageStore for SqlStore {
    async fn get_usage(
        &self,
        user_id: &str,
        week_start: i64,
    ) -> Result<Option<UsageRecord>, sqlx::Error> {
        let row: Option<UsageRow> = sqlx::query_as(
            "SELECT user_id, week_start, message_count, last_updated \
             FROM usage_counters WHERE user_id = ?1 AND week_start = ?2",
        )
        .bind(user_id)
        .bind(week_start)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(to_record))
    }

    async fn try_increment(
        &self,
        user_id: &str,
        week_start: i64,
        limit: i64,
        now_ms: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        // Single statement: SQLite's write lock makes the conditional upsert
        // atomic. When either WHERE clause rejects the write no row is
        // returned; the first one keeps a zero limit from inserting.
        let row: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO usage_counters (user_id, week_start, message_count, last_updated) \
             SELECT ?1, ?2, 1, ?3 WHERE ?4 > 0 \
             ON CONFLICT (user_id, week_start) DO UPDATE \
                SET message_count = usage_counters.message_count + 1, last_updated = ?3 \
                WHERE usage_counters.message_count < ?4 \
             RETURNING message_count",
        )
        .bind(user_id)
        .bind(week_start)
        .bind(now_ms)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(count,)| count))
    }

    async fn decrement(
        &self,
        user_id: &str,
        week_start: i64,
        now_ms: i64,
    ) -> Result<i64, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE usage_counters \
             SET message_count = MAX(message_count - 1, 0), last_updated = ?3 \
             WHERE user_id = ?1 AND week_start = ?2 \
             RETURNING message_count",
        )
        .bind(user_id)
        .bind(week_start)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(count,)| count).unwrap_or(0))
    }

    async fn usage_history(
        &self,
        user_id: &str,
        max_weeks: i64,
    ) -> Result<Vec<UsageRecord>, sqlx::Error> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            "SELECT user_id, week_start, message_count, last_updated \
             FROM usage_counters WHERE user_id = ?1 \
             ORDER BY week_start DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(max_weeks)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(to_record).collect())
    }
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// Process-local [`UsageStore`]; every operation runs under one mutex.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    records: Mutex<HashMap<(String, i64), UsageRecord>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut HashMap<(String, i64), UsageRecord>) -> T) -> T {
        let mut guard = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

impl UsageStore for MemoryUsageStore {
    async fn get_usage(
        &self,
        user_id: &str,
        week_start: i64,
    ) -> Result<Option<UsageRecord>, sqlx::Error> {
        Ok(self.with_records(|records| records.get(&(user_id.to_owned(), week_start)).cloned()))
    }

    async fn try_increment(
        &self,
        user_id: &str,
        week_start: i64,
        limit: i64,
        now_ms: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        Ok(self.with_records(|records| {
            match records.get_mut(&(user_id.to_owned(), week_start)) {
                None if limit < 1 => None,
                None => {
                    records.insert(
                        (user_id.to_owned(), week_start),
                        UsageRecord {
                            user_id: user_id.to_owned(),
                            week_start,
                            message_count: 1,
                            last_updated: now_ms,
                        },
                    );
                    Some(1)
                }
                Some(record) if record.message_count >= limit => None,
                Some(record) => {
                    record.message_count += 1;
                    record.last_updated = now_ms;
                    Some(record.message_count)
                }
            }
        }))
    }

    async fn decrement(
        &self,
        user_id: &str,
        week_start: i64,
        now_ms: i64,
    ) -> Result<i64, sqlx::Error> {
        Ok(self.with_records(|records| {
            match records.get_mut(&(user_id.to_owned(), week_start)) {
                None => 0,
                Some(record) => {
                    record.message_count = (record.message_count - 1).max(0);
                    record.last_updated = now_ms;
                    record.message_count
                }
            }
        }))
    }

    async fn usage_history(
        &self,
        user_id: &str,
        max_weeks: i64,
    ) -> Result<Vec<UsageRecord>, sqlx::Error> {
        Ok(self.with_records(|records| {
            let mut history: Vec<UsageRecord> = records
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            history.sort_by(|a, b| b.week_start.cmp(&a.week_start));
            history.truncate(usize::try_from(max_weeks).unwrap_or(0));
            history
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const WEEK: i64 = 7 * 24 * 3600 * 1000;

    async fn exercise<S: UsageStore>(store: &S) {
        assert_eq!(store.try_increment("u1", 0, 2, 10).await.unwrap(), Some(1));
        assert_eq!(store.try_increment("u1", 0, 2, 11).await.unwrap(), Some(2));
        assert_eq!(store.try_increment("u1", 0, 2, 12).await.unwrap(), None);

        let record = store.get_usage("u1", 0).await.unwrap().unwrap();
        assert_eq!(record.message_count, 2);
        assert_eq!(record.last_updated, 11, "rejected increment must not touch the row");

        assert_eq!(store.decrement("u1", 0, 13).await.unwrap(), 1);
        assert_eq!(store.decrement("u1", 0, 14).await.unwrap(), 0);
        assert_eq!(store.decrement("u1", 0, 15).await.unwrap(), 0);
        assert_eq!(store.decrement("nobody", 0, 15).await.unwrap(), 0);
        assert!(store.get_usage("nobody", 0).await.unwrap().is_none());

        for week in 1..=12 {
            store.try_increment("u1", week * WEEK, 2, 20).await.unwrap();
        }
        store.try_increment("u2", 5 * WEEK, 2, 20).await.unwrap();

        let history = store.usage_history("u1", 10).await.unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].week_start, 12 * WEEK);
        assert!(history.windows(2).all(|w| w[0].week_start > w[1].week_start));
        assert!(history.iter().all(|r| r.user_id == "u1"));
    }

    #[tokio::test]
    async fn memory_store_semantics() {
        exercise(&MemoryUsageStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_semantics() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn zero_limit_admits_nothing() {
        let sql = SqlStore::connect("sqlite::memory:").await.unwrap();
        assert_eq!(sql.try_increment("u", 0, 0, 1).await.unwrap(), None);
        assert!(sql.get_usage("u", 0).await.unwrap().is_none());

        let memory = MemoryUsageStore::default();
        assert_eq!(memory.try_increment("u", 0, 0, 1).await.unwrap(), None);
        assert!(memory.get_usage("u", 0).await.unwrap().is_none());
    }
}
