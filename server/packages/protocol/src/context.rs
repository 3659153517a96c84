use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Protocol generation announced in the `initialize` response.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Inline,
    Fullscreen,
    Pip,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [Self::Inline, Self::Fullscreen, Self::Pip];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Fullscreen => "fullscreen",
            Self::Pip => "pip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDimensions {
    pub max_height: u32,
}

/// Environmental facts pushed from host to widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostContext {
    pub theme: Theme,
    pub display_mode: DisplayMode,
    pub available_display_modes: Vec<DisplayMode>,
    pub container_dimensions: ContainerDimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_state: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct HostInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct EmptyCapability {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct TextCapability {
    pub text: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_links: Option<EmptyCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_tools: Option<EmptyCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<EmptyCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_model_context: Option<TextCapability>,
}

impl HostCapabilities {
    pub fn full() -> Self {
        Self {
            open_links: Some(EmptyCapability {}),
            server_tools: Some(EmptyCapability {}),
            logging: Some(EmptyCapability {}),
            update_model_context: Some(TextCapability { text: true }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub host_info: HostInfo,
    pub host_capabilities: HostCapabilities,
    pub host_context: HostContext,
}

/// Payload of `ui/notifications/sandbox-resource-ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct SandboxResourceParams {
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Result shape of `tools/call` and the `tool-result` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl ToolCallResult {
    /// Wraps an arbitrary tool result as a single text block. Strings are
    /// passed through, everything else is JSON-encoded.
    pub fn text(result: &Value) -> Self {
        let text = match result {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self {
            content: vec![ContentBlock::Text { text }],
            structured_content: None,
        }
    }

    pub fn structured(result: Value) -> Self {
        let mut wrapped = Self::text(&result);
        wrapped.structured_content = Some(result);
        wrapped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct ToolInputParams {
    #[serde(default)]
    pub arguments: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn initialize_result_matches_wire_shape() {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            host_info: HostInfo {
                name: "chat-host".to_string(),
                version: "1.0.0".to_string(),
            },
            host_capabilities: HostCapabilities::full(),
            host_context: HostContext {
                theme: Theme::Dark,
                display_mode: DisplayMode::Inline,
                available_display_modes: DisplayMode::ALL.to_vec(),
                container_dimensions: ContainerDimensions { max_height: 600 },
                widget_state: None,
            },
        };

        assert_eq!(
            serde_json::to_value(&result).expect("serialize"),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "hostInfo": {"name": "chat-host", "version": "1.0.0"},
                "hostCapabilities": {
                    "openLinks": {},
                    "serverTools": {},
                    "logging": {},
                    "updateModelContext": {"text": true}
                },
                "hostContext": {
                    "theme": "dark",
                    "displayMode": "inline",
                    "availableDisplayModes": ["inline", "fullscreen", "pip"],
                    "containerDimensions": {"maxHeight": 600}
                }
            })
        );
    }

    #[test]
    fn tool_result_text_encodes_json() {
        let wrapped = ToolCallResult::text(&json!({"a": 1}));
        assert_eq!(
            serde_json::to_value(&wrapped).expect("serialize"),
            json!({"content": [{"type": "text", "text": "{\"a\":1}"}]})
        );
    }

    #[test]
    fn display_mode_parses_known_names_only() {
        assert_eq!(DisplayMode::parse("pip"), Some(DisplayMode::Pip));
        assert_eq!(DisplayMode::parse("theatre"), None);
    }
}
