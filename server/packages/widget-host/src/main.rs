use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use widget_bridge::BridgeConfig;
use widget_host::catalog::DEFAULT_BASE_URL;
use widget_host::{run_server, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "widget-host")]
#[command(about = "Serve sandboxed widgets with the host bridge injected", version)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    #[arg(long, default_value = "assets")]
    assets_dir: PathBuf,

    /// Absolute URL the assets directory is reachable at.
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long)]
    max_height: Option<u32>,

    #[arg(long)]
    request_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(err) = run().await {
        tracing::error!(error = %err, "widget-host failed");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_logfmt::builder()
                .layer()
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    // Bridge defaults honour the WIDGET_BRIDGE_* environment overrides.
    let defaults = BridgeConfig::from_env(url::Url::parse(&cli.base_url)?);
    run_server(ServerConfig {
        host: cli.host,
        port: cli.port,
        assets_dir: cli.assets_dir,
        base_url: cli.base_url,
        max_height: cli.max_height.unwrap_or(defaults.max_height),
        request_timeout: cli
            .request_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout),
    })
    .await?;
    Ok(())
}
