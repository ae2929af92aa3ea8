//! # Check Gateway Service
//!
//! Binary entry point for the check-run gateway.
//!
//! This executable:
//! - Parses command-line flags
//! - Loads configuration from files and `CG__` environment variables
//! - Reads credentials from the environment
//! - Picks the dedup store (Upstash when configured, in-memory otherwise)
//! - Starts the HTTP server from check-gateway-api
//!
//! Configuration and credential errors exit with status 3.

use anyhow::Context;
use check_gateway_api::{load_config, start_server, AppState, GatewaySecrets};
use check_gateway_core::{DedupStore, InMemoryDedupStore, UpstashDedupStore};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_ERROR_EXIT_CODE: i32 = 3;

/// GitHub check-run gateway
#[derive(Debug, Parser)]
#[command(name = "check-gateway", version, about)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON by extension)
    #[arg(long, env = "CHECK_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref());

    let (level, json) = match &loaded {
        Ok(config) => (
            config.logging.level.as_str(),
            cli.json_logs || config.logging.json_format,
        ),
        Err(_) => ("info", cli.json_logs),
    };
    init_tracing(level, json);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration is invalid; aborting");
            std::process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        owners = config.supported_owners.len(),
        checks = ?config.checks.names,
        "Starting check gateway"
    );

    let secrets = match GatewaySecrets::from_env(&config.supported_owners) {
        Ok(secrets) => secrets,
        Err(e) => {
            error!(error = %e, "Credentials are incomplete; aborting");
            std::process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    };

    let (dedup_store, memory_store) = match build_dedup_store(&secrets) {
        Ok(stores) => stores,
        Err(e) => {
            error!(error = %e, "Failed to create dedup store; aborting");
            std::process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    };

    let state = match AppState::new(config, &secrets, dedup_store) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialise gateway; aborting");
            std::process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    };

    start_server(state, memory_store)
        .await
        .context("check gateway server failed")?;

    info!("Check gateway stopped");
    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "check_gateway={level},check_gateway_api={level},check_gateway_core={level},github_checks_sdk={level},tower_http=info"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Upstash when both REST variables are set, otherwise a process-local store.
///
/// The in-memory store is returned separately so the server can purge it.
fn build_dedup_store(
    secrets: &GatewaySecrets,
) -> anyhow::Result<(Arc<dyn DedupStore>, Option<InMemoryDedupStore>)> {
    match &secrets.upstash {
        Some(upstash) => {
            let store = UpstashDedupStore::new(upstash.clone())
                .context("failed to build Upstash client")?;
            info!(url = %upstash.url, "Using Upstash dedup store");
            Ok((Arc::new(store), None))
        }
        None => {
            warn!(
                "UPSTASH_REDIS_REST_URL not set; using in-memory dedup store, duplicates are only suppressed within this instance"
            );
            let store = InMemoryDedupStore::new();
            Ok((Arc::new(store.clone()), Some(store)))
        }
    }
}
