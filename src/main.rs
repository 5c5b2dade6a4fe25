use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use langpack::{
    assets::{AssetStore, DirectoryAssetStore, HttpAssetStore},
    config::Config,
    language::LanguagePackService,
    marketing::MarketingService,
    mirror::{AssetSyncCache, LocalMirror, SyncSettings},
    state::FileStateStore,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "langpack-server")]
#[command(version)]
#[command(about = "Mirrors language-pack tables and serves phone-to-language lookups")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(cli: &Cli) {
    let log_filter = format!("langpack={0},langpack_server={0}", cli.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn asset_store(config: &Config) -> Result<Arc<dyn AssetStore>> {
    if let Some(base_url) = &config.assets.base_url {
        info!("Using remote asset store at {}", base_url);
        let store = HttpAssetStore::new(base_url, config.assets.request_timeout)?;
        return Ok(Arc::new(store));
    }

    let directory = config
        .assets
        .directory
        .clone()
        .context("assets: neither base_url nor directory is configured")?;
    info!("Using local asset directory {:?}", directory);
    Ok(Arc::new(DirectoryAssetStore::new(directory)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    info!("Starting language-pack server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    if config.marketing.client_id.is_empty() || config.marketing.subdomain.is_empty() {
        warn!("Marketing credentials are not configured; webhook upserts will fail");
    }

    let sync = Arc::new(AssetSyncCache::new(
        asset_store(&config)?,
        LocalMirror::new(&config.mirror.path),
        SyncSettings::from_config(&config.assets, &config.mirror),
    ));
    info!("Mirroring language pack into {:?}", config.mirror.path);

    let state_store = Arc::new(FileStateStore::new(&config.state.path));
    let marketing = MarketingService::new(&config.marketing, &config.tracking, state_store)?;

    let state = AppState {
        config: Arc::new(config),
        language: LanguagePackService::new(sync),
        marketing: Arc::new(marketing),
    };

    let web_server = WebServer::new(state)?;
    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match ready_rx.await {
            Ok(Ok(())) => info!("Web server is accepting connections"),
            Ok(Err(e)) => error!("Web server failed to start: {}", e),
            Err(_) => {}
        }
    });

    web_server.serve_with_signal(ready_tx).await?;
    info!("Web server stopped");
    Ok(())
}
