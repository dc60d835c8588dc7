pub mod handlers;
pub mod types;

use crate::account::auth::{SessionRegistry, TokenSigner};
use crate::account::store::AccountStore;
use crate::game::EconomyEngine;
use crate::mint::MintCoordinator;
use crate::rate_limit::RateLimiter;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccountStore>,
    pub engine: EconomyEngine,
    pub coordinator: Arc<MintCoordinator>,
    pub tokens: Arc<TokenSigner>,
    pub sessions: Arc<SessionRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub starting_balance: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route("/game/buy-card", post(handlers::buy_card))
        .route("/game/scratch-card", post(handlers::scratch_card))
        .route("/user/link-wallet", post(handlers::link_wallet))
        .route("/mint/:badge_type", post(handlers::mint_badge))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    state: AppState,
    bind_addr: String,
}

impl RpcServer {
    pub fn new(state: AppState, port: u16) -> Self {
        Self {
            state,
            bind_addr: format!("0.0.0.0:{}", port),
        }
    }

    pub async fn start(self) {
        let app = router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .expect("Failed to bind RPC server");

        info!("RPC server listening on {}", self.bind_addr);
        axum::serve(listener, app).await.expect("RPC server failed");
    }
}
