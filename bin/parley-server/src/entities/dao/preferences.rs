use chrono::{DateTime, Utc};

/// A row in the `user_preferences` table.
#[derive(Debug, Clone)]
pub struct UserPreferences {
    pub user_id: String,
    pub model: String,
    /// `"light"`, `"dark"` or `"system"`.
    pub theme: String,
    pub updated_at: DateTime<Utc>,
}
