use std::future::Future;

use crate::entities::dao::UserPreferences;
use crate::entities::{SqlStore, format_timestamp, parse_timestamp};

pub trait PreferenceStore: Send + Sync + 'static {
    fn get_preferences(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<UserPreferences>, sqlx::Error>> + Send;

    fn put_preferences(
        &self,
        prefs: UserPreferences,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

impl PreferenceStore for SqlStore {
    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>, sqlx::Error> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT user_id, model, theme, updated_at FROM user_preferences WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(user_id, model, theme, updated_at)| UserPreferences {
            user_id,
            model,
            theme,
            updated_at: parse_timestamp(&updated_at, "user_preferences.updated_at"),
        }))
    }

    async fn put_preferences(&self, prefs: UserPreferences) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_preferences (user_id, model, theme, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id) DO UPDATE SET model = ?2, theme = ?3, updated_at = ?4",
        )
        .bind(&prefs.user_id)
        .bind(&prefs.model)
        .bind(&prefs.theme)
        .bind(format_timestamp(&prefs.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
