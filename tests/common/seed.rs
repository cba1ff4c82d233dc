//! Seeds a scratch user-store database directly over sqlx, mirroring the
//! schema in `migrations/001_init.sql`, so login tests exercise the real
//! verification path (bcrypt-over-MD5) instead of stubbing it out.

#![allow(dead_code)]

use bcrypt::{hash, DEFAULT_COST};
use md5::{Digest, Md5};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

pub struct SeededUser {
    pub id: i32,
    pub username: String,
}

fn md5_hex(password: &str) -> String {
    let digest = Md5::digest(password.as_bytes());
    format!("{digest:x}")
}

fn safe(username: &str) -> String {
    username.to_lowercase().replace(' ', "_")
}

/// Inserts a user with the given privileges/frozen state into `db_path`,
/// creating the database file (and schema) if it doesn't exist yet.
pub async fn seed_user(db_path: &str, username: &str, password: &str, privileges: i64, frozen: bool) -> anyhow::Result<SeededUser> {
    let options = SqliteConnectOptions::new().filename(db_path).create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    for statement in include_str!("../../migrations/001_init.sql").split(';') {
        let sql = statement.trim();
        if !sql.is_empty() {
            sqlx::query(sql).execute(&pool).await?;
        }
    }

    let bcrypt_hash = hash(md5_hex(password), DEFAULT_COST)?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, username_safe, password_md5, privileges, frozen) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(username)
    .bind(safe(username))
    .bind(&bcrypt_hash)
    .bind(privileges)
    .bind(frozen as i64)
    .fetch_one(&pool)
    .await?;

    pool.close().await;

    Ok(SeededUser { id: id as i32, username: username.to_string() })
}

/// Pre-creates a public channel row so `load_channels` picks it up at boot
/// — channel joins are refused for anything not already in the registry.
pub async fn seed_channel(db_path: &str, name: &str, description: &str) -> anyhow::Result<()> {
    let options = SqliteConnectOptions::new().filename(db_path).create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    for statement in include_str!("../../migrations/001_init.sql").split(';') {
        let sql = statement.trim();
        if !sql.is_empty() {
            sqlx::query(sql).execute(&pool).await?;
        }
    }

    sqlx::query("INSERT INTO bancho_channels (name, description, public_read, public_write) VALUES (?, ?, 1, 1)")
        .bind(name)
        .bind(description)
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
