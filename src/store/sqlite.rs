use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::models::{ChannelRecord, UserRecord};
use super::{StoreError, UserStore};

pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    pub async fn connect(path: &str, pool_size: u32) -> Result<Self, StoreError> {
        let pool = if path == ":memory:" {
            let options = SqliteConnectOptions::new().filename("file::memory:").shared_cache(true).create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(pool_size)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(path = %parent.display(), error = %e, "failed to create store directory");
                    }
                }
            }
            let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(pool_size)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "user store connected");
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn table_exists(pool: &SqlitePool, table: &str) -> bool {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)")
            .bind(table)
            .fetch_one(pool)
            .await
            .unwrap_or(false)
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
        if !Self::table_exists(pool, "users").await {
            for statement in include_str!("../../migrations/001_init.sql").split(';') {
                let sql = statement.trim();
                if sql.is_empty() {
                    continue;
                }
                sqlx::query(sql).execute(pool).await?;
            }
            info!("user store migrations applied (001_init)");
        }
        Ok(())
    }

    fn row_to_user(row: sqlx::sqlite::SqliteRow) -> UserRecord {
        UserRecord {
            id: row.get("id"),
            username: row.get("username"),
            username_safe: row.get("username_safe"),
            password_md5: row.get("password_md5"),
            privileges: row.get("privileges"),
            silence_end: row.get("silence_end"),
            donor_expire: row.get("donor_expire"),
            frozen: row.get::<i64, _>("frozen") != 0,
            freezedate: row.get("freezedate"),
            first_login_after_frozen: row.get::<i64, _>("firstloginafterfrozen") != 0,
            country: row.get("country"),
            osuver: row.get("osuver"),
        }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn fetch_by_username_safe(&self, username_safe: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE username_safe = ?").bind(username_safe).fetch_optional(&self.pool).await?;
        Ok(row.map(Self::row_to_user))
    }

    async fn fetch_by_id(&self, user_id: i32) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?").bind(user_id).fetch_optional(&self.pool).await?;
        Ok(row.map(Self::row_to_user))
    }

    async fn update_password_md5(&self, user_id: i32, password_md5: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_md5 = ? WHERE id = ?").bind(password_md5).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn set_privileges(&self, user_id: i32, privileges: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET privileges = ? WHERE id = ?").bind(privileges).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn set_silence_end(&self, user_id: i32, silence_end: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET silence_end = ? WHERE id = ?").bind(silence_end).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn set_frozen(&self, user_id: i32, frozen: bool, freezedate: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET frozen = ?, freezedate = ? WHERE id = ?").bind(frozen as i64).bind(freezedate).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn set_country(&self, user_id: i32, country: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET country = ? WHERE id = ?").bind(country).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn set_osuver(&self, user_id: i32, osuver: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET osuver = ? WHERE id = ?").bind(osuver).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn load_channels(&self) -> Result<Vec<ChannelRecord>, StoreError> {
        let rows = sqlx::query("SELECT name, description, public_read, public_write FROM bancho_channels").fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| ChannelRecord {
                name: row.get("name"),
                description: row.get("description"),
                public_read: row.get::<i64, _>("public_read") != 0,
                public_write: row.get::<i64, _>("public_write") != 0,
            })
            .collect())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM bancho_settings WHERE key = ?").bind(key).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO bancho_settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn log_private_message(&self, time: i64, from_id: i32, to_id: i32, message: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO chat_logs (time, from_id, to_id, message) VALUES (?, ?, ?, ?)")
            .bind(time)
            .bind(from_id)
            .bind(to_id)
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn log_channel_message(&self, time: i64, from_id: i32, channel: &str, message: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO chat_chan_logs (time, from_id, channel, message) VALUES (?, ?, ?, ?)")
            .bind(time)
            .bind(from_id)
            .bind(channel)
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn log_ban(&self, time: i64, from_id: i32, to_id: i32, summary: &str, detail: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO ban_logs (time, from_id, to_id, summary, detail) VALUES (?, ?, ?, ?, ?)")
            .bind(time)
            .bind(from_id)
            .bind(to_id)
            .bind(summary)
            .bind(detail)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn file_report(&self, time: i64, from_id: i32, to_id: i32, reason: &str, chatlog: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO reports (time, from_id, to_id, reason, chatlog) VALUES (?, ?, ?, ?, ?)")
            .bind(time)
            .bind(from_id)
            .bind(to_id)
            .bind(reason)
            .bind(chatlog)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_returns_none() {
        let store = SqliteUserStore::connect(":memory:", 1).await.unwrap();
        assert!(store.fetch_by_username_safe("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn setting_roundtrips() {
        let store = SqliteUserStore::connect(":memory:", 1).await.unwrap();
        store.set_setting("maintenance", "0").await.unwrap();
        assert_eq!(store.get_setting("maintenance").await.unwrap().as_deref(), Some("0"));
    }
}
