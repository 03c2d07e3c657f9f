use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::token::{Fingerprint, Scope, Token};
use crate::store::{TokenRecord, TokenStore};

/// Upper bound on any single statement. A slow database fails the request
/// with a timeout instead of hanging its task.
const STATEMENT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Run one statement under the per-operation deadline.
async fn bounded<T, F>(op: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(STATEMENT_TIMEOUT, op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(sqlx::Error::PoolTimedOut)) => {
            Err(AppError::Unavailable("database pool exhausted".to_string()))
        }
        Ok(Err(e)) => Err(AppError::Database(e)),
        Err(_) => Err(AppError::Timeout),
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    identity: i64,
    expiry: DateTime<Utc>,
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: &Token) -> Result<(), AppError> {
        bounded(
            sqlx::query(
                "INSERT INTO tokens (hash, identity, expiry, scope) VALUES ($1, $2, $3, $4)",
            )
            .bind(&token.fingerprint[..])
            .bind(token.identity)
            .bind(token.expiry)
            .bind(token.scope.as_str())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_by_fingerprint(
        &self,
        scope: Scope,
        fingerprint: &Fingerprint,
    ) -> Result<Option<TokenRecord>, AppError> {
        // Expiry is filtered here, not after retrieval, so expired rows
        // never surface as found.
        let row = bounded(
            sqlx::query_as::<_, TokenRow>(
                "SELECT identity, expiry FROM tokens \
                 WHERE hash = $1 AND scope = $2 AND expiry > now()",
            )
            .bind(&fingerprint[..])
            .bind(scope.as_str())
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(|r| TokenRecord {
            identity: r.identity,
            expiry: r.expiry,
        }))
    }

    async fn delete_all_for_identity(&self, scope: Scope, identity: i64) -> Result<(), AppError> {
        bounded(
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND identity = $2")
                .bind(scope.as_str())
                .bind(identity)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
