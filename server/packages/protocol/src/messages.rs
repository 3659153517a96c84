//! Typed messages decoded at the parsing boundary.
//!
//! Each direction has its own tagged union: [`HostBound`] for what the host
//! bridge receives from the relay/widget, [`WidgetBound`] for what a widget
//! receives from its host. Method strings never travel past `decode`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use widget_bridge_error::BridgeError;

use crate::context::{HostContext, SandboxResourceParams, ToolInputParams};
use crate::methods::{Method, Spelling};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("method not found: {method}")]
    MethodNotFound { method: String },
    #[error("invalid params for {method}: {source}")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ProtocolError> for BridgeError {
    fn from(value: ProtocolError) -> Self {
        match value {
            ProtocolError::MethodNotFound { method } => BridgeError::MethodNotFound { method },
            ProtocolError::InvalidParams { method, source } => BridgeError::InvalidParams {
                method,
                message: source.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub message: T,
    pub spelling: Spelling,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub app_info: Option<Value>,
    #[serde(default)]
    pub app_capabilities: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default = "empty_object")]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenLinkParams {
    #[serde(alias = "href")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplayModeParams {
    pub mode: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Notice,
    #[serde(alias = "warn")]
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogParams {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub logger: Option<String>,
    #[serde(default, alias = "message")]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SizeChangedParams {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WidgetStateParams {
    #[serde(default)]
    pub state: Value,
}

/// Messages the host side receives through the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum HostBound {
    SandboxProxyReady,
    Initialize(InitializeParams),
    Initialized,
    ToolsCall(ToolCallParams),
    OpenLink(OpenLinkParams),
    RequestDisplayMode(DisplayModeParams),
    UpdateModelContext(Value),
    SendMessage { text: String },
    SetWidgetState(WidgetStateParams),
    Log(LogParams),
    SizeChanged(SizeChangedParams),
}

impl HostBound {
    pub fn decode(method: &str, params: Option<Value>) -> Result<Decoded<Self>, ProtocolError> {
        let (kind, spelling) = Method::parse(method).ok_or_else(|| not_found(method))?;
        let message = match kind {
            Method::SandboxProxyReady => Self::SandboxProxyReady,
            Method::Initialize => Self::Initialize(parse_params(method, params)?),
            Method::Initialized => Self::Initialized,
            Method::ToolsCall => Self::ToolsCall(parse_params(method, params)?),
            Method::OpenLink => Self::OpenLink(parse_params(method, params)?),
            Method::RequestDisplayMode => Self::RequestDisplayMode(parse_params(method, params)?),
            Method::UpdateModelContext => {
                Self::UpdateModelContext(params.unwrap_or_else(empty_object))
            }
            Method::SendMessage => Self::SendMessage {
                text: follow_up_text(params.as_ref()).ok_or_else(|| {
                    invalid(method, "expected `prompt` or text `content`")
                })?,
            },
            Method::SetWidgetState => Self::SetWidgetState(parse_params(method, params)?),
            Method::LogMessage => Self::Log(parse_params(method, params)?),
            Method::SizeChanged => Self::SizeChanged(parse_params(method, params)?),
            Method::SandboxResourceReady
            | Method::ToolInput
            | Method::ToolResult
            | Method::HostContextChanged => return Err(not_found(method)),
        };
        Ok(Decoded { message, spelling })
    }
}

/// Messages a widget receives from its host.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetBound {
    SandboxResourceReady(SandboxResourceParams),
    ToolInput(ToolInputParams),
    ToolResult(Value),
    HostContextChanged(HostContext),
}

impl WidgetBound {
    pub fn decode(method: &str, params: Option<Value>) -> Result<Decoded<Self>, ProtocolError> {
        let (kind, spelling) = Method::parse(method).ok_or_else(|| not_found(method))?;
        let message = match kind {
            Method::SandboxResourceReady => {
                Self::SandboxResourceReady(parse_params(method, params)?)
            }
            Method::ToolInput => Self::ToolInput(parse_params(method, params)?),
            Method::ToolResult => Self::ToolResult(params.unwrap_or(Value::Null)),
            Method::HostContextChanged => Self::HostContextChanged(parse_params(method, params)?),
            Method::SandboxProxyReady
            | Method::Initialize
            | Method::Initialized
            | Method::ToolsCall
            | Method::OpenLink
            | Method::RequestDisplayMode
            | Method::LogMessage
            | Method::UpdateModelContext
            | Method::SizeChanged
            | Method::SendMessage
            | Method::SetWidgetState => return Err(not_found(method)),
        };
        Ok(Decoded { message, spelling })
    }
}

/// Extracts the structured payload of a `tool-result` notification, which is
/// either `structuredContent` or the bare params.
pub fn tool_output_from_result(params: &Value) -> Value {
    params
        .get("structuredContent")
        .cloned()
        .unwrap_or_else(|| params.clone())
}

fn follow_up_text(params: Option<&Value>) -> Option<String> {
    let params = params?;
    if let Some(prompt) = params.get("prompt").and_then(Value::as_str) {
        return Some(prompt.to_string());
    }
    match params.get("content")? {
        Value::String(text) => Some(text.clone()),
        Value::Object(block) => block.get("text").and_then(Value::as_str).map(str::to_string),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
        _ => None,
    }
}

fn parse_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T, ProtocolError> {
    serde_json::from_value(params.unwrap_or_else(empty_object)).map_err(|source| {
        ProtocolError::InvalidParams {
            method: method.to_string(),
            source,
        }
    })
}

fn invalid(method: &str, message: &str) -> ProtocolError {
    ProtocolError::InvalidParams {
        method: method.to_string(),
        source: serde::de::Error::custom(message),
    }
}

fn not_found(method: &str) -> ProtocolError {
    ProtocolError::MethodNotFound {
        method: method.to_string(),
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
