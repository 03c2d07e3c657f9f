use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::pipeline;
use crate::AppState;

pub mod handlers;

/// Build the service router with the full check chain. Layer order is
/// outermost first: trace, client-address extraction, admission control,
/// then authentication.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/healthz", get(handlers::health))
        .route("/v1/tokens/authenticate", post(handlers::authenticate))
        .route(
            "/v1/tokens",
            post(handlers::create_token).delete(handlers::delete_all_tokens),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn_with_state(
                    state.clone(),
                    pipeline::client_addr::extract_client_addr,
                ))
                .layer(from_fn_with_state(
                    state.clone(),
                    pipeline::admission::admission,
                ))
                .layer(from_fn_with_state(
                    state.clone(),
                    pipeline::auth::authenticate,
                )),
        )
        .with_state(state)
}
