use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use redis::aio::ConnectionManager;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cache;
mod cli;
mod config;
mod errors;
mod limiter;
mod models;
mod pipeline;
mod service;
mod store;

use cache::RedisTokenCache;
use config::Config;
use limiter::RateLimiter;
use models::token::Scope;
use pipeline::selector::Selector;
use service::{ScopeTtls, TokenService};
use store::postgres::PgTokenStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub service: TokenService,
    pub limiter: Arc<RateLimiter>,
    pub selector: Selector,
    pub config: Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "authgate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Token { command }) => {
            let store = PgTokenStore::connect(&cfg.database_url, cfg.db_max_connections).await?;
            let state = build_state(cfg, store).await?;
            handle_token_command(command, &state).await
        }
        None => run_server(cfg, None).await,
    }
}

async fn run_server(cfg: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let port = port_override.unwrap_or(cfg.port);

    tracing::info!("connecting to database");
    let store = PgTokenStore::connect(&cfg.database_url, cfg.db_max_connections).await?;

    tracing::info!("running migrations");
    store.migrate().await?;

    let state = build_state(cfg, store).await?;

    limiter::spawn_sweep(state.limiter.clone());
    tracing::info!("idle-bucket sweep started");

    let app = api::router(state).layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("authgate listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn build_state(cfg: Config, store: PgTokenStore) -> anyhow::Result<Arc<AppState>> {
    tracing::info!("connecting to redis");
    let redis_client = redis::Client::open(cfg.redis_url.as_str())?;
    let redis_conn = ConnectionManager::new(redis_client).await?;
    let cache = RedisTokenCache::new(
        redis_conn,
        &cfg.cache_hash_prefix,
        &cfg.cache_identity_prefix,
    );

    let ttls = ScopeTtls {
        activation: chrono::Duration::hours(cfg.activation_ttl_hours),
        authentication: chrono::Duration::hours(cfg.authentication_ttl_hours),
    };
    let service = TokenService::new(Arc::new(store), Arc::new(cache), ttls);
    let limiter = Arc::new(RateLimiter::new(cfg.limiter.clone()));
    let selector = Selector::service_defaults();

    Ok(Arc::new(AppState {
        service,
        limiter,
        selector,
        config: cfg,
    }))
}

async fn handle_token_command(cmd: cli::TokenCommands, state: &AppState) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Issue { identity, scope } => {
            let scope: Scope = scope.parse()?;
            let token = state.service.issue(identity, scope).await?;
            println!(
                "Token issued:\n  Identity: {}\n  Scope:    {}\n  Token:    {}\n  Expires:  {}",
                identity, scope, token.plaintext, token.expiry
            );
        }
        cli::TokenCommands::Revoke { identity, scope } => {
            let scope: Scope = scope.parse()?;
            state.service.revoke(identity, scope).await?;
            println!("Tokens revoked for identity {identity} under scope {scope}");
        }
    }
    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so
/// clients can correlate errors with service logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
