use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::token::Scope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub scope: Scope,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    pub identity: i64,
}

/// Resolve a bearer plaintext to the identity it authenticates.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, AppError> {
    let identity = state.service.verify(req.scope, &req.token).await?;
    Ok(Json(AuthenticateResponse { identity }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub identity: i64,
    pub scope: Scope,
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub token: String,
    /// Absolute expiry, milliseconds since the epoch.
    pub expiry: i64,
}

/// Mint a token for the pair, revoking all prior ones first. The
/// plaintext in the response is the only time it ever leaves the service.
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTokenRequest>,
) -> Result<Json<CreateTokenResponse>, AppError> {
    let token = state.service.issue(req.identity, req.scope).await?;
    Ok(Json(CreateTokenResponse {
        token: token.plaintext,
        expiry: token.expiry.timestamp_millis(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteTokensRequest {
    pub scope: Scope,
    pub identity: i64,
}

/// Revoke every token the identity holds under the scope.
pub async fn delete_all_tokens(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteTokensRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.service.revoke(req.identity, req.scope).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn health() -> &'static str {
    "ok"
}
