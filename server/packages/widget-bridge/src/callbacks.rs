//! Hooks the embedding application hands to the host bridge.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

pub const OPEN_LINK_TARGET: &str = "_blank";
pub const OPEN_LINK_FEATURES: &str = "noopener,noreferrer";

pub type ToolCallFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

/// Executes a named backend tool on behalf of a widget.
pub trait ToolExecutor: Send + Sync + 'static {
    fn call_tool(&self, name: &str, arguments: Value) -> ToolCallFuture;
}

impl<F, Fut> ToolExecutor for F
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    fn call_tool(&self, name: &str, arguments: Value) -> ToolCallFuture {
        Box::pin(self(name.to_string(), arguments))
    }
}

/// UI-level events raised by a widget.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    UpdateModelContext { context: Value },
    /// The host decides whether the mode is granted.
    RequestDisplayMode { mode: String },
    FollowUpMessage { text: String },
    WidgetStateChanged { state: Value },
}

pub trait UiEventSink: Send + Sync + 'static {
    fn on_message(&self, event: UiEvent);
}

impl<F> UiEventSink for F
where
    F: Fn(UiEvent) + Send + Sync + 'static,
{
    fn on_message(&self, event: UiEvent) {
        self(event)
    }
}

/// Opens a new top-level browsing context.
pub trait WindowOpener: Send + Sync + 'static {
    fn open(&self, url: &str, target: &str, features: &str);
}

#[derive(Clone, Default)]
pub struct BridgeCallbacks {
    pub tool_executor: Option<Arc<dyn ToolExecutor>>,
    pub ui_events: Option<Arc<dyn UiEventSink>>,
    pub window_opener: Option<Arc<dyn WindowOpener>>,
}

impl BridgeCallbacks {
    pub fn with_tool_executor(mut self, executor: impl ToolExecutor) -> Self {
        self.tool_executor = Some(Arc::new(executor));
        self
    }

    pub fn with_ui_events(mut self, sink: Arc<dyn UiEventSink>) -> Self {
        self.ui_events = Some(sink);
        self
    }

    pub fn with_window_opener(mut self, opener: Arc<dyn WindowOpener>) -> Self {
        self.window_opener = Some(opener);
        self
    }

    pub(crate) fn emit(&self, event: UiEvent) {
        match &self.ui_events {
            Some(sink) => sink.on_message(event),
            None => tracing::debug!(event = ?event, "no ui event sink configured; dropping event"),
        }
    }
}

impl fmt::Debug for BridgeCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeCallbacks")
            .field("tool_executor", &self.tool_executor.is_some())
            .field("ui_events", &self.ui_events.is_some())
            .field("window_opener", &self.window_opener.is_some())
            .finish()
    }
}
