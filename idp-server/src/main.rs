use std::net::SocketAddr;

use clap::Parser;
use tracing::info;

use idp_server::config::{Args, ServerConfig};
use idp_server::create_app;
use idp_server::state::AppState;
use telemetry::{init_tracing, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_format = if args.pretty_logs { LogFormat::Pretty } else { LogFormat::Json };
    init_tracing(log_format, "idp_server=info,tower_http=info")
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting idp-server");

    let config = ServerConfig::try_from(&args)?;
    let metrics_handle = telemetry::install_recorder()?;
    let state = AppState::bootstrap(config, metrics_handle)?;

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {e}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "idp-server listening");
    info!(issuer = %args.issuer, profile = %args.profile, "authorization core bootstrapped");

    axum::serve(listener, app).await?;

    Ok(())
}
