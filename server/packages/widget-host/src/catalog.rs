//! Built-in widget catalog and asset loading.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

/// MIME type of widget UI resources.
pub const RESOURCE_MIME_TYPE: &str = "text/html;profile=mcp-app";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/assets";

/// External domains the bundled widgets load scripts, styles, images and
/// fonts from.
pub const EXTERNAL_RESOURCE_DOMAINS: &[&str] = &[
    "https://cdn.openai.com",
    "https://images.unsplash.com",
    "https://persistent.oaistatic.com",
    "https://cesium.com",
    "https://tile.openstreetmap.org",
];

/// External domains widgets fetch from at runtime.
pub const EXTERNAL_CONNECT_DOMAINS: &[&str] = &["https://cesium.com", "https://tile.openstreetmap.org"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDefinition {
    pub identifier: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub template_uri: &'static str,
    pub invoking: &'static str,
    pub invoked: &'static str,
    pub component_name: &'static str,
}

macro_rules! widget {
    ($identifier:literal, $title:literal, $description:literal, $component:literal, $invoking:literal, $invoked:literal) => {
        WidgetDefinition {
            identifier: $identifier,
            title: $title,
            description: $description,
            template_uri: concat!("ui://widget/", $component, ".html"),
            invoking: $invoking,
            invoked: $invoked,
            component_name: $component,
        }
    };
}

pub const BUILTIN_WIDGETS: &[WidgetDefinition] = &[
    widget!("show_card", "Show Card Widget", "Display an interactive card widget with items.", "boilerplate", "Loading card widget...", "Card widget ready"),
    widget!("show_carousel", "Show Carousel", "Display a horizontal carousel of cards for browsing multiple items.", "carousel", "Loading carousel...", "Carousel ready"),
    widget!("show_dashboard", "Show Dashboard", "Display a dashboard with stats, metrics, and activity feed.", "dashboard", "Loading dashboard...", "Dashboard ready"),
    widget!("show_gallery", "Show Gallery", "Display an image gallery with grid layout and lightbox viewer.", "gallery", "Loading gallery...", "Gallery ready"),
    widget!("show_list", "Show List", "Display a vertical list with thumbnails and metadata.", "list", "Loading list...", "List ready"),
    widget!("show_map", "Show Map", "Display an interactive 3D globe zoomed to a specific location.", "map", "Loading map...", "Map ready"),
    widget!("show_qr", "Generate QR Code", "Generate a QR code from text or a URL.", "qr", "Generating QR code...", "QR code ready"),
    widget!("get_scenario_data", "SaaS Scenario Modeler", "Interactive SaaS financial projection tool with scenario templates.", "scenario-modeler", "Loading scenario modeler...", "Scenario modeler ready"),
    widget!("show_shop", "Show Shopping Cart", "Display a shopping cart with products and checkout flow.", "shop", "Loading shopping cart...", "Shopping cart ready"),
    widget!("show_solar_system", "Show Solar System", "Display an interactive 3D solar system visualization.", "solar-system", "Loading solar system...", "Solar system ready"),
    widget!("get_system_info", "System Monitor", "Display real-time system monitoring with CPU and memory usage charts.", "system-monitor", "Loading system monitor...", "System monitor ready"),
    widget!("show_todo", "Show Todo List", "Display an interactive todo list manager with multiple lists.", "todo", "Loading todo list...", "Todo list ready"),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown widget `{identifier}`")]
    NotFound { identifier: String },
    #[error("widget html for `{component}` not found in {}", dir.display())]
    MissingAsset { component: String, dir: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CspDomains {
    pub resource_domains: Vec<String>,
    pub connect_domains: Vec<String>,
}

#[derive(Debug, Clone)]
struct CachedHtml {
    path: PathBuf,
    modified: SystemTime,
    html: String,
}

#[derive(Debug)]
pub struct WidgetCatalog {
    assets_dir: PathBuf,
    base_url: String,
    cache: Mutex<HashMap<&'static str, CachedHtml>>,
}

impl WidgetCatalog {
    pub fn new(assets_dir: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn definitions(&self) -> &'static [WidgetDefinition] {
        BUILTIN_WIDGETS
    }

    pub fn get(&self, identifier: &str) -> Result<&'static WidgetDefinition, CatalogError> {
        BUILTIN_WIDGETS
            .iter()
            .find(|widget| widget.identifier == identifier)
            .ok_or_else(|| CatalogError::NotFound {
                identifier: identifier.to_string(),
            })
    }

    pub fn by_uri(&self, uri: &str) -> Option<&'static WidgetDefinition> {
        BUILTIN_WIDGETS.iter().find(|widget| widget.template_uri == uri)
    }

    /// Widget HTML with `./` asset references made absolute against the base
    /// URL. Reloaded whenever the file on disk changes.
    pub fn load_html(&self, widget: &WidgetDefinition) -> Result<String, CatalogError> {
        let path = self.resolve_html_path(widget.component_name)?;
        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;

        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.get(widget.component_name) {
                if cached.path == path && cached.modified == modified {
                    return Ok(cached.html.clone());
                }
            }
        }

        let raw = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        let html = raw
            .replace("src=\"./", &format!("src=\"{}/", self.base_url))
            .replace("href=\"./", &format!("href=\"{}/", self.base_url));
        tracing::debug!(component = widget.component_name, path = %path.display(), "loaded widget html");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                widget.component_name,
                CachedHtml {
                    path,
                    modified,
                    html: html.clone(),
                },
            );
        }
        Ok(html)
    }

    /// `<component>.html`, else the last of the sorted `<component>-*.html`
    /// (hashed build outputs).
    fn resolve_html_path(&self, component: &str) -> Result<PathBuf, CatalogError> {
        let exact = self.assets_dir.join(format!("{component}.html"));
        if exact.is_file() {
            return Ok(exact);
        }

        let prefix = format!("{component}-");
        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.assets_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.file_name()
                            .and_then(|name| name.to_str())
                            .map(|name| name.starts_with(&prefix) && name.ends_with(".html"))
                            .unwrap_or(false)
                    })
                    .collect()
            })
            .unwrap_or_default();
        candidates.sort();
        candidates.pop().ok_or_else(|| CatalogError::MissingAsset {
            component: component.to_string(),
            dir: self.assets_dir.clone(),
        })
    }

    pub fn csp(&self) -> CspDomains {
        let origin = Url::parse(&self.base_url)
            .ok()
            .map(|url| url.origin())
            .filter(|origin| origin.is_tuple())
            .map(|origin| origin.ascii_serialization());
        let with_origin = |external: &[&str]| {
            origin
                .iter()
                .cloned()
                .chain(external.iter().map(|domain| domain.to_string()))
                .collect::<Vec<_>>()
        };
        CspDomains {
            resource_domains: with_origin(EXTERNAL_RESOURCE_DOMAINS),
            connect_domains: with_origin(EXTERNAL_CONNECT_DOMAINS),
        }
    }

    /// `_meta` attached to a widget's tool and resource.
    pub fn meta(&self, widget: &WidgetDefinition) -> Value {
        json!({
            "ui": {
                "resourceUri": widget.template_uri,
                "csp": self.csp(),
            }
        })
    }
}
