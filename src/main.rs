use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use research_agent::{
    clients::BridgePipeline,
    config::{Config, DEFAULT_LOG_FILTER},
    http::{HttpState, build_router},
    server,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "research-agent", version, about = "Research Agent API server")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides RESEARCH_HTTP_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Directory served under /static (overrides RESEARCH_STATIC_DIR)
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    research_agent::load_env();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(dir) = cli.static_dir {
        config.server.static_dir = dir;
    }

    info!("Starting Research Agent Server...");
    if !config.credentials.openai_configured() {
        warn!("OPENAI_API_KEY is not set; /research will fail until it is configured");
    }
    if !config.credentials.tavily_configured() {
        warn!("TAVILY_API_KEY is not set; /research will fail until it is configured");
    }
    info!(
        command = %config.bridge.command,
        research_timeout_ms = config.executor.research_timeout_ms,
        report_timeout_ms = config.executor.report_timeout_ms,
        "Research worker configured"
    );

    let bind = config.server.bind;
    let server_config = config.server.clone();
    let pipeline = Arc::new(BridgePipeline::new(config.bridge.clone()));
    let state = HttpState::new(config, pipeline);
    let lifecycle = state.lifecycle.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", bind))?;
    info!(
        "Listening on http://{} (static files from {})",
        bind,
        server_config.static_dir.display()
    );

    server::spawn_signal_listener(lifecycle.shutdown_token());
    server::serve(listener, app, &server_config, lifecycle).await?;

    info!("Research Agent Server stopped");
    Ok(())
}
