//! Wire types shared by the host bridge, the sandbox relay and widgets.

use serde_json::{json, Value};
use utoipa::OpenApi;

pub mod context;
pub mod envelope;
pub mod messages;
pub mod methods;

pub use context::{
    ContainerDimensions, ContentBlock, DisplayMode, EmptyCapability, HostCapabilities,
    HostContext, HostInfo, InitializeResult, SandboxResourceParams, TextCapability, Theme,
    ToolCallResult, ToolInputParams, PROTOCOL_VERSION,
};
pub use envelope::{Envelope, EnvelopeError, JsonRpcMessage, RequestId, JSONRPC_VERSION};
pub use messages::{
    tool_output_from_result, Decoded, DisplayModeParams, HostBound, InitializeParams, LogLevel,
    LogParams, OpenLinkParams, ProtocolError, SizeChangedParams, ToolCallParams, WidgetBound,
    WidgetStateParams,
};
pub use methods::{Method, Spelling};
pub use widget_bridge_error::{BridgeError, ErrorCode, RpcError};

#[derive(OpenApi)]
#[openapi(components(schemas(
    Theme,
    DisplayMode,
    ContainerDimensions,
    HostContext,
    HostInfo,
    EmptyCapability,
    TextCapability,
    HostCapabilities,
    InitializeResult,
    SandboxResourceParams,
    ContentBlock,
    ToolCallResult,
    ToolInputParams,
    RpcError
)))]
pub struct ProtocolApi;

/// JSON Schema documents for the envelope and the payloads hosts construct.
pub fn protocol_schema() -> Value {
    json!({
        "envelope": schemars::schema_for!(JsonRpcMessage),
        "hostContext": schemars::schema_for!(HostContext),
        "initializeResult": schemars::schema_for!(InitializeResult),
        "sandboxResource": schemars::schema_for!(SandboxResourceParams),
        "toolCallResult": schemars::schema_for!(ToolCallResult),
    })
}
