use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use widget_bridge_error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Correlation id of a request. Widgets may use either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "\"{value}\""),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Wire form of every message crossing a frame boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JsonRpcMessage {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("message is not a json-rpc object: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported jsonrpc version `{0}`")]
    UnsupportedVersion(String),
    #[error("response carries both result and error")]
    AmbiguousResponse,
    #[error("request carries result or error members")]
    RequestWithOutcome,
    #[error("message has neither method nor id")]
    Unclassifiable,
}

/// A validated message: exactly one of request, notification or response.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: RequestId,
        outcome: Result<Value, RpcError>,
    },
}

impl JsonRpcMessage {
    pub fn request(id: RequestId, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: Some(method.to_string()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: Some(method.to_string()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn response(id: RequestId, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            params: None,
            result,
            error,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn into_envelope(self) -> Result<Envelope, EnvelopeError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(self.jsonrpc));
        }

        match (self.id, self.method) {
            (Some(id), Some(method)) => {
                if self.result.is_some() || self.error.is_some() {
                    return Err(EnvelopeError::RequestWithOutcome);
                }
                Ok(Envelope::Request {
                    id,
                    method,
                    params: self.params,
                })
            }
            (None, Some(method)) => {
                if self.result.is_some() || self.error.is_some() {
                    return Err(EnvelopeError::RequestWithOutcome);
                }
                Ok(Envelope::Notification {
                    method,
                    params: self.params,
                })
            }
            (Some(id), None) => {
                let outcome = match (self.result, self.error) {
                    (Some(_), Some(_)) => return Err(EnvelopeError::AmbiguousResponse),
                    (_, Some(error)) => Err(error),
                    (result, None) => Ok(result.unwrap_or(Value::Null)),
                };
                Ok(Envelope::Response { id, outcome })
            }
            (None, None) => Err(EnvelopeError::Unclassifiable),
        }
    }
}

impl Envelope {
    /// Validates a raw posted value. Anything that is not a JSON-RPC 2.0
    /// object is rejected.
    pub fn parse(value: &Value) -> Result<Self, EnvelopeError> {
        if !value.is_object() {
            return Err(EnvelopeError::Unclassifiable);
        }
        let message = JsonRpcMessage::deserialize(value)?;
        message.into_envelope()
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } => None,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { id, .. } | Self::Response { id, .. } => Some(id),
            Self::Notification { .. } => None,
        }
    }
}

impl From<Envelope> for JsonRpcMessage {
    fn from(value: Envelope) -> Self {
        match value {
            Envelope::Request { id, method, params } => Self {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: Some(id),
                method: Some(method),
                params,
                result: None,
                error: None,
            },
            Envelope::Notification { method, params } => Self {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: None,
                method: Some(method),
                params,
                result: None,
                error: None,
            },
            Envelope::Response { id, outcome } => Self::response(id, outcome),
        }
    }
}
