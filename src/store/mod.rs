pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::token::{Fingerprint, Scope, Token};

/// What the store returns for a live token. Scope and expiry are filtered
/// at the query, so a record coming back is valid by construction.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub identity: i64,
    pub expiry: DateTime<Utc>,
}

/// Durable record of issued tokens; the source of truth. The cache in
/// front of it may lag but must never contradict it.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), AppError>;

    /// Returns the token only if the scope matches and it has not expired.
    /// Rows that are present but expired or scope-mismatched never surface.
    async fn find_by_fingerprint(
        &self,
        scope: Scope,
        fingerprint: &Fingerprint,
    ) -> Result<Option<TokenRecord>, AppError>;

    /// Removes every token row for the pair. Deleting zero rows is success.
    async fn delete_all_for_identity(&self, scope: Scope, identity: i64) -> Result<(), AppError>;
}
