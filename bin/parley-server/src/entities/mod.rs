//! Persistence layer.
//!
//! Each concern has its own store trait ([`UsageStore`], [`ChatStore`],
//! [`PreferenceStore`]) implemented for [`SqlStore`]. Handlers only see the
//! traits, so another backend can be slotted in by implementing them and
//! changing the concrete type in [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures, so no
//! `async-trait` is needed for static dispatch.

pub mod chat;
pub mod dao;
pub mod preferences;
pub mod usage;

pub use dao::{Chat, ChatMessage, UsageRecord, UserPreferences};

pub use chat::ChatStore;
pub use preferences::PreferenceStore;
pub use usage::{MemoryUsageStore, UsageStore};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Clone, Debug)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://parley.db?mode=rwc"` or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = if url.contains(":memory:") {
            // Every connection to `:memory:` is a separate database, so keep
            // exactly one alive for the lifetime of the pool.
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };
        let pool = options.connect(url).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

/// Fixed-width RFC 3339 so that stored timestamps sort lexicographically.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str, column: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, column, error = %e, "failed to parse stored timestamp; using now");
        Utc::now()
    })
}
