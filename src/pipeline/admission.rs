use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::pipeline::client_addr::ClientAddr;
use crate::AppState;

/// Admission control. Runs before authentication so an unauthenticated
/// flood is still throttled.
pub async fn admission(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state
        .selector
        .checks_for(req.method(), req.uri().path())
        .rate_limit
    {
        return Ok(next.run(req).await);
    }

    let client = req
        .extensions()
        .get::<ClientAddr>()
        .map(|c| c.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    if !state.limiter.allow(&client) {
        tracing::debug!(client = %client, "request rejected by admission control");
        return Err(AppError::QuotaExceeded);
    }

    Ok(next.run(req).await)
}
