use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use app::{build_router, AppState};
use catalog::WidgetCatalog;

pub mod app;
mod assets;
pub mod catalog;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub assets_dir: PathBuf,
    pub base_url: String,
    pub max_height: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address `{addr}`: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("assets directory {} does not exist", .0.display())]
    MissingAssets(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    if !config.assets_dir.is_dir() {
        return Err(ServerError::MissingAssets(config.assets_dir));
    }
    let addr_text = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = addr_text
        .parse()
        .map_err(|source| ServerError::InvalidAddress {
            addr: addr_text.clone(),
            source,
        })?;

    let mut state = AppState::new(WidgetCatalog::new(&config.assets_dir, &config.base_url));
    state.max_height = config.max_height;
    state.request_timeout = config.request_timeout;
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %addr,
        assets = %config.assets_dir.display(),
        base_url = %config.base_url,
        "widget-host listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}
