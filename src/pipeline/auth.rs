use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::models::token::Scope;
use crate::AppState;

/// Verified identity attached to the request after authentication, so
/// downstream handlers read it without re-verifying.
#[derive(Debug, Clone, Copy)]
pub struct AuthIdentity(pub i64);

pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state
        .selector
        .checks_for(req.method(), req.uri().path())
        .auth
    {
        return Ok(next.run(req).await);
    }

    let plaintext = bearer_token(req.headers()).ok_or(AppError::InvalidCredential)?;
    let identity = state
        .service
        .verify(Scope::Authentication, &plaintext)
        .await?;

    req.extensions_mut().insert(AuthIdentity(identity));
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}
