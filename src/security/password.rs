//! Password verification for the login pipeline: bcrypt-over-MD5, with a
//! short-lived cache so repeat logins from the same client don't re-pay
//! bcrypt's cost every time.
//!
//! Clients submit the MD5 of their password (the osu! client hashes it
//! client-side before sending); the store holds a bcrypt hash of that MD5
//! string. The cache keeps only a SHA-256 digest of the verified MD5,
//! never the credential itself, per the re-design noted for this core.

use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

const CACHE_TTL_SECS: i64 = 600;

struct CacheEntry {
    digest: [u8; 32],
    expires_at: i64,
}

/// Per-user cache of the most recently bcrypt-verified password digest.
#[derive(Default)]
pub struct PasswordCache {
    entries: DashMap<i32, CacheEntry>,
}

fn digest_of(password_md5: &str) -> [u8; 32] {
    Sha256::digest(password_md5.as_bytes()).into()
}

impl PasswordCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn hit(&self, user_id: i32, password_md5: &str, now: i64) -> bool {
        self.entries.get(&user_id).is_some_and(|e| e.expires_at > now && e.digest == digest_of(password_md5))
    }

    fn remember(&self, user_id: i32, password_md5: &str, now: i64) {
        self.entries.insert(user_id, CacheEntry { digest: digest_of(password_md5), expires_at: now + CACHE_TTL_SECS });
    }

    pub fn forget(&self, user_id: i32) {
        self.entries.remove(&user_id);
    }
}

/// Verifies `password_md5` against `stored_hash` for `user_id`, consulting
/// and updating `cache` to bypass bcrypt on repeat logins within the TTL.
/// Runs the actual bcrypt compare on a blocking thread.
pub async fn verify(cache: &Arc<PasswordCache>, user_id: i32, password_md5: &str, stored_hash: &str, now: i64) -> Result<bool, bcrypt::BcryptError> {
    if cache.hit(user_id, password_md5, now) {
        return Ok(true);
    }

    let owned_md5 = password_md5.to_string();
    let stored_hash = stored_hash.to_string();
    let matched = tokio::task::spawn_blocking(move || bcrypt::verify(&owned_md5, &stored_hash))
        .await
        .unwrap_or_else(|e| Err(bcrypt::BcryptError::InvalidHash(e.to_string())))?;

    if matched {
        cache.remember(user_id, password_md5, now);
    }
    Ok(matched)
}

/// Hashes a plaintext-equivalent (the client's MD5) for storage, at the
/// bcrypt cost configured for new accounts.
pub async fn hash(password_md5: &str) -> Result<String, bcrypt::BcryptError> {
    let password_md5 = password_md5.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(&password_md5, bcrypt::DEFAULT_COST))
        .await
        .unwrap_or_else(|e| Err(bcrypt::BcryptError::InvalidHash(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify_round_trips() {
        let cache = Arc::new(PasswordCache::new());
        let hash = hash("deadbeef").await.unwrap();
        assert!(verify(&cache, 1, "deadbeef", &hash, 0).await.unwrap());
        assert!(!verify(&cache, 1, "wrongmd5", &hash, 0).await.unwrap());
    }

    #[tokio::test]
    async fn cache_hit_bypasses_bcrypt_within_ttl() {
        let cache = Arc::new(PasswordCache::new());
        let hash = hash("deadbeef").await.unwrap();
        assert!(verify(&cache, 7, "deadbeef", &hash, 0).await.unwrap());
        // Garbage hash would fail bcrypt::verify outright; cache hit must
        // short-circuit before that call.
        assert!(verify(&cache, 7, "deadbeef", "not-a-real-hash", 100).await.unwrap());
        assert!(!verify(&cache, 7, "deadbeef", "not-a-real-hash", CACHE_TTL_SECS + 1).await.is_ok_and(|ok| ok));
    }
}
