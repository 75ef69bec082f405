mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use courier_api::auth::{self, AppState, AppStateInner, AuthService};
use courier_api::messages::{self, MessageService};
use courier_api::middleware::require_auth;
use courier_api::users;
use courier_auth::{PasswordHasher, TokenIssuer};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.jwt_secret == config::DEV_SECRET {
        warn!("COURIER_JWT_SECRET is not set; tokens are signed with the dev secret");
    }

    // Shared state, constructed once and injected everywhere
    let db = Arc::new(courier_db::Database::open(&config.db_path)?);
    let hasher = PasswordHasher::new(config.hash_work_factor)?;
    let tokens = TokenIssuer::new(&config.jwt_secret, config.token_ttl_days);

    let state: AppState = Arc::new(AppStateInner {
        auth: AuthService::new(db.clone(), hasher, tokens.clone())?,
        messages: MessageService::new(db.clone()),
        db,
        tokens,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{username}", get(users::get_user))
        .route("/users/{username}/messages/sent", get(messages::sent_messages))
        .route("/users/{username}/messages/received", get(messages::received_messages))
        .route("/messages", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
