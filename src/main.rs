use clap::Parser;
use scratchvault::account::auth::{SessionRegistry, TokenSigner};
use scratchvault::account::store::{AccountStore, EmailPolicy};
use scratchvault::config::VaultConfig;
use scratchvault::game::EconomyEngine;
use scratchvault::mint::{HttpMinter, MintCoordinator};
use scratchvault::rate_limit::RateLimiter;
use scratchvault::rpc::{AppState, RpcServer};
use scratchvault::storage::SledStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scratchvault", about = "Scratch-card game ledger server")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "scratchvault.toml")]
    config: String,

    /// Override the configured RPC port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = VaultConfig::load_or_default(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.auth.token_secret == "change-me" {
        warn!("token_secret is the shipped default; set a real secret in production");
    }

    let policy = if config.economy.case_insensitive_email {
        EmailPolicy::CaseInsensitive
    } else {
        EmailPolicy::Exact
    };
    let store: Arc<dyn AccountStore> = Arc::new(
        SledStore::open(&config.server.data_dir, policy).expect("Failed to open ledger store"),
    );

    let minter = Arc::new(HttpMinter::new(
        &config.minter.endpoint,
        Duration::from_secs(config.minter.timeout_secs),
    ));
    let coordinator = Arc::new(MintCoordinator::new(store.clone(), minter));

    // Refund anything left mid-mint by a previous run
    match coordinator.reconcile_reservations() {
        Ok(0) => {}
        Ok(n) => info!("reconciled {} stale mint reservation(s)", n),
        Err(e) => warn!("reservation reconciliation failed: {}", e),
    }

    let state = AppState {
        store: store.clone(),
        engine: EconomyEngine::new(store),
        coordinator,
        tokens: Arc::new(TokenSigner::new(
            &config.auth.token_secret,
            config.auth.token_ttl_secs,
        )),
        sessions: Arc::new(SessionRegistry::new(config.auth.session_ttl_secs)),
        limiter: Arc::new(RateLimiter::new(
            config.rate_limit.window_secs,
            config.rate_limit.ceiling,
        )),
        starting_balance: config.economy.starting_balance,
    };

    let port = cli.port.unwrap_or(config.server.port);
    RpcServer::new(state, port).start().await;
}
