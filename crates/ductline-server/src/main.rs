//! Ductline server
//!
//! HTTP backend for the waitlist and its paid Fast Track.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ductline_server::auth::TokenVerifier;
use ductline_server::http::{AppState, build_router};
use ductline_server::payments::{CheckoutService, PayPalClient, PayPalConfig};
use ductline_server::storage::ServerDatabase;
use ductline_server::waitlist::WaitlistService;

#[derive(Parser, Debug)]
#[command(name = "ductline-server")]
#[command(version, about = "Ductline server - waitlist ranking and Fast Track payments")]
struct Args {
    /// Path to a JSON config file, layered over the global config.
    #[arg(long, env = "DUCTLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config).
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file (overrides config).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "DUCTLINE_LOG_JSON")]
    log_json: bool,

    /// OTLP endpoint for trace export (requires the `metrics` feature).
    #[arg(long, env = "DUCTLINE_METRICS_ENDPOINT")]
    metrics_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry = ductline_core::tracing_init::init_tracing_with_metrics(
        "ductline_server=info,tower_http=info",
        args.log_json,
        args.metrics_endpoint.as_deref(),
    );

    let mut config = ductline_core::config::load_config(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.listen_addr = addr.to_string();
    }
    if let Some(path) = args.db_path {
        config.server.database_path = Some(path);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.listen_addr,
        "Starting ductline-server"
    );

    let db_path = match config.server.database_path.clone() {
        Some(path) => path,
        None => ductline_core::config::database_path()
            .context("Cannot determine default database path")?,
    };
    info!(path = %db_path.display(), "Opening server database");
    let db = ServerDatabase::open(&db_path).await?;

    let gateway = PayPalClient::new(&PayPalConfig::from(&config.payments))
        .context("Payment processor is not configured")?;
    let waitlist = WaitlistService::new(db.clone(), config.waitlist.clone());
    let checkout = CheckoutService::new(
        db,
        Arc::new(gateway),
        waitlist.clone(),
        config.payments.currency.clone(),
    );
    let verifier = Arc::new(TokenVerifier::from_config(&config.auth));

    let listen_addr = config.server.listen_addr.clone();
    let app = build_router(AppState {
        waitlist,
        checkout,
        verifier,
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!(addr = %listen_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    telemetry.shutdown();
    Ok(())
}
