use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use github_app_router::builtin::ping_router;
use github_app_router::config::AppConfig;
use github_app_router::github::GitHubClient;
use github_app_router::routing::{CallingConvention, HandlerLoader, Registry};
use github_app_router::server::{AppState, build_router};

/// Receives GitHub App webhooks and dispatches them to registered handlers.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "GITHUB_APP_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "github_app_router=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    info!(?config, "Loaded configuration");

    if config.name.is_empty() {
        warn!("No app name configured; mention commands are disabled");
    }
    if config.webhook_secret.is_empty() {
        warn!("No webhook secret configured; deliveries are not authenticated");
    }

    let client = GitHubClient::from_config(&config)?;
    match client.app_id() {
        Some(app_id) => info!(app_id, "Authenticating as GitHub App"),
        None if config.token.is_some() => info!("Authenticating with token"),
        None => warn!("No credentials configured; API calls are anonymous"),
    }

    let registry = Arc::new(Registry::new(config.slug()));
    let loader = HandlerLoader::new().on_load(CallingConvention::Suspendable, |registry| {
        registry.register(ping_router())
    });

    let addr = config.listen_addr;
    let app = build_router(AppState::new(config, registry, Arc::new(loader), client));

    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
