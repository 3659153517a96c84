use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use widget_bridge::config::{DEFAULT_MAX_HEIGHT, DEFAULT_REQUEST_TIMEOUT};
use widget_bridge::{inject_legacy_bridge, LegacySnapshot};
use widget_bridge_error::ProblemDetails;
use widget_bridge_protocol::{protocol_schema, DisplayMode, ProtocolApi, Theme};

use crate::assets::handle_asset;
use crate::catalog::{CatalogError, WidgetCatalog, WidgetDefinition, RESOURCE_MIME_TYPE};

#[derive(Debug)]
pub struct AppState {
    pub catalog: WidgetCatalog,
    pub max_height: u32,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(catalog: WidgetCatalog) -> Self {
        Self {
            catalog,
            max_height: DEFAULT_MAX_HEIGHT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct WidgetSummary {
    #[serde(flatten)]
    definition: WidgetDefinition,
    #[serde(rename = "_meta")]
    meta: Value,
}

#[derive(Debug, Serialize)]
struct WidgetListResponse {
    widgets: Vec<WidgetSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceResponse {
    uri: &'static str,
    mime_type: &'static str,
    text: String,
    #[serde(rename = "_meta")]
    meta: Value,
}

#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    pub uri: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderRequest {
    pub theme: Theme,
    pub display_mode: DisplayMode,
    pub max_height: Option<u32>,
    pub tool_output: Option<Value>,
    pub tool_input: Option<Value>,
    pub widget_state: Option<Value>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("unknown resource `{uri}`")]
    UnknownResource { uri: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title) = match &self {
            ApiError::Catalog(CatalogError::NotFound { .. }) => (StatusCode::NOT_FOUND, "widget_not_found"),
            ApiError::Catalog(CatalogError::MissingAsset { .. }) => {
                (StatusCode::NOT_FOUND, "widget_asset_missing")
            }
            ApiError::Catalog(CatalogError::Io { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "widget_asset_unreadable")
            }
            ApiError::UnknownResource { .. } => (StatusCode::NOT_FOUND, "resource_not_found"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        problem(status, title, &self.to_string())
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // Widgets load bundles and resources from the sandbox origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/v1/health", get(get_health))
        .route("/v1/widgets", get(list_widgets))
        .route("/v1/widgets/:id/resource", get(get_resource))
        .route("/v1/resources", get(read_resource))
        .route("/v1/widgets/:id/render", post(render_widget))
        .route("/v1/schema", get(get_schema))
        .route("/assets/*path", get(handle_asset))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn list_widgets(State(state): State<Arc<AppState>>) -> Json<WidgetListResponse> {
    let widgets = state
        .catalog
        .definitions()
        .iter()
        .map(|definition| WidgetSummary {
            definition: *definition,
            meta: state.catalog.meta(definition),
        })
        .collect();
    Json(WidgetListResponse { widgets })
}

async fn get_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResourceResponse>, ApiError> {
    let widget = state.catalog.get(&id)?;
    resource_response(&state, widget).map(Json)
}

/// Resource read by template URI, as MCP clients address widgets.
async fn read_resource(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<ResourceResponse>, ApiError> {
    let widget = state
        .catalog
        .by_uri(&query.uri)
        .ok_or(ApiError::UnknownResource { uri: query.uri })?;
    resource_response(&state, widget).map(Json)
}

fn resource_response(state: &AppState, widget: &WidgetDefinition) -> Result<ResourceResponse, ApiError> {
    let text = state.catalog.load_html(widget)?;
    Ok(ResourceResponse {
        uri: widget.template_uri,
        mime_type: RESOURCE_MIME_TYPE,
        text,
        meta: state.catalog.meta(widget),
    })
}

async fn render_widget(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RenderRequest>,
) -> Result<Response, ApiError> {
    let widget = state.catalog.get(&id)?;
    let html = state.catalog.load_html(widget)?;
    let snapshot = LegacySnapshot::new(
        request.theme,
        request.display_mode,
        request.max_height.unwrap_or(state.max_height),
    )
    .with_tool_output(request.tool_output)
    .with_tool_input(request.tool_input)
    .with_widget_state(request.widget_state);
    tracing::debug!(
        widget = widget.identifier,
        theme = request.theme.as_str(),
        display_mode = request.display_mode.as_str(),
        "rendering widget"
    );
    let rendered = inject_legacy_bridge(&html, &snapshot, state.request_timeout);
    Ok(([(header::CACHE_CONTROL, "no-store")], Html(rendered)).into_response())
}

async fn get_schema() -> Json<Value> {
    Json(json!({
        "protocol": protocol_schema(),
        "openapi": ProtocolApi::openapi(),
    }))
}

fn problem(status: StatusCode, title: &str, detail: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/problem+json")],
        Json(ProblemDetails::new(status.as_u16(), title, Some(detail.to_string()))),
    )
        .into_response()
}
