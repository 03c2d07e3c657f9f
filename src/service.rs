//! Orchestrates codec, store, and cache: issuance, cache-first
//! verification with store fallback, and invalidation.

use std::sync::Arc;

use chrono::Duration;

use crate::cache::TokenCache;
use crate::errors::AppError;
use crate::models::token::{self, Scope, Token};
use crate::store::TokenStore;

/// Per-scope token lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct ScopeTtls {
    pub activation: Duration,
    pub authentication: Duration,
}

impl Default for ScopeTtls {
    fn default() -> Self {
        Self {
            activation: Duration::hours(72),
            authentication: Duration::hours(24),
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    cache: Arc<dyn TokenCache>,
    ttls: ScopeTtls,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, cache: Arc<dyn TokenCache>, ttls: ScopeTtls) -> Self {
        Self { store, cache, ttls }
    }

    fn ttl_for(&self, scope: Scope) -> Duration {
        match scope {
            Scope::Activation => self.ttls.activation,
            Scope::Authentication => self.ttls.authentication,
        }
    }

    /// Resolve a plaintext to the identity it authenticates.
    ///
    /// Cache first; on a miss the store answers and the entry is refilled
    /// in a detached task so the caller never waits on the cache. Unknown,
    /// expired, and malformed plaintexts all fail identically.
    #[tracing::instrument(skip(self, plaintext), fields(scope = %scope))]
    pub async fn verify(&self, scope: Scope, plaintext: &str) -> Result<i64, AppError> {
        if !token::validate_plaintext(plaintext) {
            return Err(AppError::InvalidCredential);
        }

        if let Some(cached) = self.cache.lookup(scope, plaintext).await {
            return Ok(cached.identity);
        }

        let fingerprint = token::fingerprint(plaintext);
        match self.store.find_by_fingerprint(scope, &fingerprint).await? {
            Some(record) => {
                let refill = Token {
                    plaintext: plaintext.to_string(),
                    fingerprint,
                    identity: record.identity,
                    scope,
                    expiry: record.expiry,
                };
                let cache = Arc::clone(&self.cache);
                tokio::spawn(async move {
                    if let Err(e) = cache.populate(&refill).await {
                        tracing::warn!(error = %e, "cache refill after store fallback failed");
                    }
                });
                Ok(record.identity)
            }
            None => Err(AppError::InvalidCredential),
        }
    }

    /// Mint a new token for the pair, invalidating every prior one.
    ///
    /// Order matters: store rows and cache entries for the pair go first,
    /// then the insert, then the cache fill, so the cache can never hold a
    /// token the invalidation should have covered.
    pub async fn issue(&self, identity: i64, scope: Scope) -> Result<Token, AppError> {
        self.store.delete_all_for_identity(scope, identity).await?;
        if let Err(e) = self.cache.invalidate_for_identity(identity).await {
            tracing::warn!(identity, error = %e, "cache invalidation on re-issue failed");
        }

        let token = Token::generate(identity, self.ttl_for(scope), scope)?;
        self.store.insert(&token).await?;

        // The store write has committed; a cache fill failure only costs
        // the next verification a store round trip.
        if let Err(e) = self.cache.populate(&token).await {
            tracing::warn!(identity, error = %e, "cache population after issue failed");
        }

        Ok(token)
    }

    /// Drop every token for the pair, store first, then cache. Called on
    /// logout and after any password change.
    pub async fn revoke(&self, identity: i64, scope: Scope) -> Result<(), AppError> {
        self.store.delete_all_for_identity(scope, identity).await?;
        if let Err(e) = self.cache.invalidate_for_identity(identity).await {
            tracing::warn!(identity, error = %e, "cache invalidation on revoke failed");
        }
        Ok(())
    }
}
