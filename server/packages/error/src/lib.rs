use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError,
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError => "Server error",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(Self::ParseError),
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            -32000 => Some(Self::ServerError),
            _ => None,
        }
    }
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize, JsonSchema, ToSchema)]
#[error("json-rpc error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found() -> Self {
        Self::new(ErrorCode::MethodNotFound, ErrorCode::MethodNotFound.title())
    }

    pub fn request_timeout() -> Self {
        Self::new(ErrorCode::ServerError, "Request timeout")
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("method not found: {method}")]
    MethodNotFound { method: String },
    #[error("{capability} not supported")]
    NotSupported { capability: String },
    #[error("invalid params for {method}: {message}")]
    InvalidParams { method: String, message: String },
    #[error("{message}")]
    ToolCallFailed { name: String, message: String },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error(transparent)]
    Remote(#[from] RpcError),
}

impl BridgeError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MethodNotFound { .. } => ErrorCode::MethodNotFound,
            Self::NotSupported { .. } => ErrorCode::MethodNotFound,
            Self::InvalidParams { .. } => ErrorCode::InvalidParams,
            Self::ToolCallFailed { .. } => ErrorCode::ServerError,
            Self::Transport { .. } => ErrorCode::ServerError,
            Self::Remote(err) => err.error_code().unwrap_or(ErrorCode::ServerError),
        }
    }

    /// Converts the error into the object sent back across the frame boundary.
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::MethodNotFound { method } => {
                let mut map = Map::new();
                map.insert("method".to_string(), Value::String(method.clone()));
                RpcError::method_not_found().with_data(Value::Object(map))
            }
            Self::NotSupported { .. } => RpcError::new(self.error_code(), self.to_string()),
            Self::InvalidParams { method, message } => {
                let mut map = Map::new();
                map.insert("method".to_string(), Value::String(method.clone()));
                RpcError::new(self.error_code(), message.clone()).with_data(Value::Object(map))
            }
            Self::ToolCallFailed { message, .. } => {
                RpcError::new(self.error_code(), message.clone())
            }
            Self::Transport { message } => RpcError::new(self.error_code(), message.clone()),
            Self::Remote(err) => err.clone(),
        }
    }
}

impl From<BridgeError> for RpcError {
    fn from(value: BridgeError) -> Self {
        value.to_rpc_error()
    }
}

impl From<&BridgeError> for RpcError {
    fn from(value: &BridgeError) -> Self {
        value.to_rpc_error()
    }
}

/// RFC 7807 body returned by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl ProblemDetails {
    pub fn new(status: u16, title: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            type_: "about:blank".to_string(),
            title: title.into(),
            status,
            detail,
            extensions: Map::new(),
        }
    }
}
