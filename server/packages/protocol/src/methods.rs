//! Method names of the host/widget protocol.
//!
//! Older widgets use camel-cased spellings for a handful of methods. Both
//! spellings decode to the same [`Method`]; the [`Spelling`] is kept so the
//! host can acknowledge in the shape the widget's generation expects.

pub const SANDBOX_PROXY_READY: &str = "ui/notifications/sandbox-proxy-ready";
pub const SANDBOX_RESOURCE_READY: &str = "ui/notifications/sandbox-resource-ready";
pub const INITIALIZE: &str = "ui/initialize";
pub const INITIALIZED: &str = "ui/notifications/initialized";
pub const TOOL_INPUT: &str = "ui/notifications/tool-input";
pub const TOOL_RESULT: &str = "ui/notifications/tool-result";
pub const HOST_CONTEXT_CHANGED: &str = "ui/notifications/host-context-changed";
pub const TOOLS_CALL: &str = "tools/call";
pub const OPEN_LINK: &str = "ui/open-link";
pub const REQUEST_DISPLAY_MODE: &str = "ui/request-display-mode";
pub const LOG_MESSAGE: &str = "notifications/message";
pub const UPDATE_MODEL_CONTEXT: &str = "ui/update-model-context";
pub const SIZE_CHANGED: &str = "ui/notifications/size-changed";
pub const SEND_MESSAGE: &str = "ui/message";
pub const SET_WIDGET_STATE: &str = "ui/set-widget-state";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    SandboxProxyReady,
    SandboxResourceReady,
    Initialize,
    Initialized,
    ToolInput,
    ToolResult,
    HostContextChanged,
    ToolsCall,
    OpenLink,
    RequestDisplayMode,
    LogMessage,
    UpdateModelContext,
    SizeChanged,
    SendMessage,
    SetWidgetState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spelling {
    Current,
    Legacy,
}

const METHOD_TABLE: &[(&str, Method, Spelling)] = &[
    (SANDBOX_PROXY_READY, Method::SandboxProxyReady, Spelling::Current),
    (SANDBOX_RESOURCE_READY, Method::SandboxResourceReady, Spelling::Current),
    (INITIALIZE, Method::Initialize, Spelling::Current),
    ("initialize", Method::Initialize, Spelling::Legacy),
    (INITIALIZED, Method::Initialized, Spelling::Current),
    ("notifications/initialized", Method::Initialized, Spelling::Legacy),
    ("initialized", Method::Initialized, Spelling::Legacy),
    (TOOL_INPUT, Method::ToolInput, Spelling::Current),
    (TOOL_RESULT, Method::ToolResult, Spelling::Current),
    (HOST_CONTEXT_CHANGED, Method::HostContextChanged, Spelling::Current),
    (TOOLS_CALL, Method::ToolsCall, Spelling::Current),
    (OPEN_LINK, Method::OpenLink, Spelling::Current),
    ("ui/openLink", Method::OpenLink, Spelling::Legacy),
    (REQUEST_DISPLAY_MODE, Method::RequestDisplayMode, Spelling::Current),
    ("ui/requestDisplayMode", Method::RequestDisplayMode, Spelling::Legacy),
    (LOG_MESSAGE, Method::LogMessage, Spelling::Current),
    ("ui/log", Method::LogMessage, Spelling::Legacy),
    (UPDATE_MODEL_CONTEXT, Method::UpdateModelContext, Spelling::Current),
    ("ui/updateContext", Method::UpdateModelContext, Spelling::Legacy),
    (SIZE_CHANGED, Method::SizeChanged, Spelling::Current),
    (SEND_MESSAGE, Method::SendMessage, Spelling::Current),
    ("ui/sendFollowUpMessage", Method::SendMessage, Spelling::Legacy),
    (SET_WIDGET_STATE, Method::SetWidgetState, Spelling::Current),
    ("ui/setWidgetState", Method::SetWidgetState, Spelling::Legacy),
];

impl Method {
    pub fn parse(name: &str) -> Option<(Self, Spelling)> {
        METHOD_TABLE
            .iter()
            .find(|(candidate, _, _)| *candidate == name)
            .map(|(_, method, spelling)| (*method, *spelling))
    }

    /// Canonical (current) spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SandboxProxyReady => SANDBOX_PROXY_READY,
            Self::SandboxResourceReady => SANDBOX_RESOURCE_READY,
            Self::Initialize => INITIALIZE,
            Self::Initialized => INITIALIZED,
            Self::ToolInput => TOOL_INPUT,
            Self::ToolResult => TOOL_RESULT,
            Self::HostContextChanged => HOST_CONTEXT_CHANGED,
            Self::ToolsCall => TOOLS_CALL,
            Self::OpenLink => OPEN_LINK,
            Self::RequestDisplayMode => REQUEST_DISPLAY_MODE,
            Self::LogMessage => LOG_MESSAGE,
            Self::UpdateModelContext => UPDATE_MODEL_CONTEXT,
            Self::SizeChanged => SIZE_CHANGED,
            Self::SendMessage => SEND_MESSAGE,
            Self::SetWidgetState => SET_WIDGET_STATE,
        }
    }

    pub fn legacy_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        METHOD_TABLE
            .iter()
            .filter(move |(_, method, spelling)| method == self && *spelling == Spelling::Legacy)
            .map(|(name, _, _)| *name)
    }
}
