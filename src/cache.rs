//! Cache-aside layer in front of the token store, keyed by fingerprint,
//! with a per-identity secondary index for bulk invalidation.
//!
//! The cache is an accelerator, not a second source of truth: any backend
//! fault on the read path degrades to a miss and forces a store fallback,
//! never an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::token::{fingerprint, Fingerprint, Scope, Token};

/// Upper bound on any single cache round trip.
const CACHE_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Value stored under a fingerprint key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub identity: i64,
    pub scope: Scope,
    pub expiry: DateTime<Utc>,
}

#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Computes the fingerprint locally from the plaintext; a caller can
    /// never feed the cache a fingerprint of its own choosing. An entry
    /// whose expiry has lapsed is a miss and is eagerly removed.
    async fn lookup(&self, scope: Scope, plaintext: &str) -> Option<CachedToken>;

    /// Writes the fingerprint entry and appends to the identity index as
    /// one atomic batch, so invalidation-by-identity can never miss a
    /// concurrently populated entry.
    async fn populate(&self, token: &Token) -> anyhow::Result<()>;

    /// Deletes every fingerprint entry named by the identity index, then
    /// the index itself. Entries already absent are no-ops.
    async fn invalidate_for_identity(&self, identity: i64) -> anyhow::Result<()>;
}

/// Redis-backed implementation. Entries are JSON under
/// `<hash_prefix>:<hex fingerprint>`; the per-identity index is a list
/// of hex fingerprints under `<identity_prefix>:<identity>`.
#[derive(Clone)]
pub struct RedisTokenCache {
    conn: ConnectionManager,
    hash_prefix: String,
    identity_prefix: String,
}

impl RedisTokenCache {
    pub fn new(conn: ConnectionManager, hash_prefix: &str, identity_prefix: &str) -> Self {
        Self {
            conn,
            hash_prefix: hash_prefix.to_string(),
            identity_prefix: identity_prefix.to_string(),
        }
    }

    fn hash_key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}:{}", self.hash_prefix, hex::encode(fingerprint))
    }

    fn identity_key(&self, identity: i64) -> String {
        format!("{}:{}", self.identity_prefix, identity)
    }
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    async fn lookup(&self, scope: Scope, plaintext: &str) -> Option<CachedToken> {
        let key = self.hash_key(&fingerprint(plaintext));
        let mut conn = self.conn.clone();

        let raw = match tokio::time::timeout(
            CACHE_OP_TIMEOUT,
            conn.get::<_, Option<String>>(&key),
        )
        .await
        {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "token cache read failed, treating as miss");
                return None;
            }
            Err(_) => {
                tracing::warn!("token cache read timed out, treating as miss");
                return None;
            }
        };

        // A value we cannot decode is a miss, not an error.
        let cached: CachedToken = serde_json::from_str(&raw).ok()?;

        if cached.scope != scope {
            return None;
        }

        if cached.expiry <= Utc::now() {
            // Lazy expiry: drop the lapsed entry so it stops taking space.
            match tokio::time::timeout(CACHE_OP_TIMEOUT, conn.del::<_, ()>(&key)).await {
                Ok(Err(e)) => tracing::debug!(error = %e, "failed to evict expired cache entry"),
                Err(_) => tracing::debug!("eviction of expired cache entry timed out"),
                Ok(Ok(())) => {}
            }
            return None;
        }

        Some(cached)
    }

    async fn populate(&self, token: &Token) -> anyhow::Result<()> {
        let key = self.hash_key(&token.fingerprint);
        let value = serde_json::to_string(&CachedToken {
            identity: token.identity,
            scope: token.scope,
            expiry: token.expiry,
        })?;

        let ttl_secs = (token.expiry - Utc::now()).num_seconds().max(1) as u64;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(&key, value, ttl_secs)
            .ignore()
            .rpush(self.identity_key(token.identity), hex::encode(token.fingerprint))
            .ignore();

        let mut conn = self.conn.clone();
        tokio::time::timeout(CACHE_OP_TIMEOUT, pipe.query_async::<_, ()>(&mut conn))
            .await
            .map_err(|_| anyhow::anyhow!("token cache populate timed out"))??;
        Ok(())
    }

    async fn invalidate_for_identity(&self, identity: i64) -> anyhow::Result<()> {
        let index_key = self.identity_key(identity);
        let mut conn = self.conn.clone();

        let hashes: Vec<String> = tokio::time::timeout(
            CACHE_OP_TIMEOUT,
            conn.lrange(&index_key, 0, -1),
        )
        .await
        .map_err(|_| anyhow::anyhow!("token cache invalidation timed out"))??;

        if !hashes.is_empty() {
            let keys: Vec<String> = hashes
                .iter()
                .map(|h| format!("{}:{}", self.hash_prefix, h))
                .collect();
            // DEL on an already-expired entry is a no-op per missing key.
            tokio::time::timeout(CACHE_OP_TIMEOUT, conn.del::<_, ()>(keys))
                .await
                .map_err(|_| anyhow::anyhow!("token cache invalidation timed out"))??;
        }

        tokio::time::timeout(CACHE_OP_TIMEOUT, conn.del::<_, ()>(&index_key))
            .await
            .map_err(|_| anyhow::anyhow!("token cache invalidation timed out"))??;
        Ok(())
    }
}
