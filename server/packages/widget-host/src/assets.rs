//! Static widget bundles served from the assets directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::app::AppState;

pub(crate) async fn handle_asset(
    State(state): State<Arc<AppState>>,
    AxumPath(path): AxumPath<String>,
) -> Response {
    let Some(target) = resolve(state.catalog.assets_dir(), &path) else {
        tracing::debug!(path = %path, "rejecting asset path");
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&target).await {
        Ok(contents) => file_response(&target, contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::warn!(path = %target.display(), error = %err, "failed to read asset");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Joins `path` under `root`, refusing anything that could leave it.
fn resolve(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    if relative.as_os_str().is_empty() {
        return None;
    }
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

fn file_response(path: &Path, contents: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(contents));
    *response.status_mut() = StatusCode::OK;
    let value = HeaderValue::from_static(content_type_for(path));
    response.headers_mut().insert(header::CONTENT_TYPE, value);
    response
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("json") | Some("map") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
