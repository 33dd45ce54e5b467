use chrono::Utc;
use sqlx::Row;

use super::{RepositoryError, SettingsRepository};
use crate::DbPool;

pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SettingsRepository for SqlSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM bot_setting WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            row.try_get::<String, _>("value")
                .map_err(|error| RepositoryError::Decode(error.to_string()))
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO bot_setting (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM bot_setting WHERE key = ?").bind(key).execute(&self.pool).await?;
        Ok(())
    }
}
