use std::time::Duration;

use url::Url;
use widget_bridge_protocol::{DisplayMode, HostInfo};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_HEIGHT: u32 = 600;

/// Sandbox flags of the outer relay frame. Fixed for every widget.
pub const OUTER_SANDBOX_FLAGS: &str = "allow-scripts allow-same-origin allow-popups allow-forms";
/// Sandbox flags of the inner widget frame when the host supplies none.
pub const DEFAULT_WIDGET_SANDBOX_FLAGS: &str = "allow-scripts allow-forms";

const REQUEST_TIMEOUT_ENV: &str = "WIDGET_BRIDGE_REQUEST_TIMEOUT_MS";
const ALLOW_LOCALHOST_ENV: &str = "WIDGET_BRIDGE_ALLOW_LOCALHOST";
const MAX_HEIGHT_ENV: &str = "WIDGET_BRIDGE_MAX_HEIGHT";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host_info: HostInfo,
    /// Address the relay page is served from. Its origin is the only
    /// non-development origin the host accepts messages from.
    pub sandbox_url: Url,
    pub request_timeout: Duration,
    pub allow_localhost_origins: bool,
    pub max_height: u32,
    pub available_display_modes: Vec<DisplayMode>,
}

impl BridgeConfig {
    pub fn new(sandbox_url: Url) -> Self {
        Self {
            host_info: HostInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            sandbox_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            allow_localhost_origins: true,
            max_height: DEFAULT_MAX_HEIGHT,
            available_display_modes: DisplayMode::ALL.to_vec(),
        }
    }

    pub fn from_env(sandbox_url: Url) -> Self {
        let mut config = Self::new(sandbox_url);
        config.request_timeout = duration_from_env_ms(REQUEST_TIMEOUT_ENV, config.request_timeout);
        config.allow_localhost_origins =
            bool_from_env(ALLOW_LOCALHOST_ENV, config.allow_localhost_origins);
        config.max_height = std::env::var(MAX_HEIGHT_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(config.max_height);
        config
    }

    pub fn with_host_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.host_info = HostInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn sandbox_origin(&self) -> String {
        self.sandbox_url.origin().ascii_serialization()
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Location of the relay page itself.
    pub location: Url,
    /// Referrer reported by the relay document, if any.
    pub referrer: Option<String>,
    /// Port of the host when no referrer is available. The host is assumed to
    /// share the relay's scheme and hostname.
    pub fallback_host_port: Option<u16>,
    pub allow_localhost_origins: bool,
}

impl RelayConfig {
    pub fn new(location: Url) -> Self {
        Self {
            location,
            referrer: None,
            fallback_host_port: None,
            allow_localhost_origins: bool_from_env(ALLOW_LOCALHOST_ENV, true),
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_fallback_host_port(mut self, port: u16) -> Self {
        self.fallback_host_port = Some(port);
        self
    }
}

fn duration_from_env_ms(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .map(Duration::from_millis)
            .unwrap_or(default),
        Err(_) => default,
    }
}

fn bool_from_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|value| {
            let trimmed = value.trim();
            trimmed == "1" || trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(default)
}
