//! Widget-side session.
//!
//! [`WidgetSession`] is what widget code holds instead of a global bridge
//! object. Host pushes publish a fresh immutable [`WidgetGlobals`] snapshot;
//! UI bindings subscribe to the watch channel and re-render on change.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use widget_bridge_error::{BridgeError, RpcError};
use widget_bridge_protocol::methods::{
    INITIALIZE, INITIALIZED, LOG_MESSAGE, OPEN_LINK, REQUEST_DISPLAY_MODE, SEND_MESSAGE,
    SET_WIDGET_STATE, SIZE_CHANGED, TOOLS_CALL,
};
use widget_bridge_protocol::{
    tool_output_from_result, Decoded, DisplayMode, Envelope, HostContext, InitializeResult,
    JsonRpcMessage, LogLevel, RequestId, Theme, ToolCallResult, WidgetBound, PROTOCOL_VERSION,
};

use crate::config::DEFAULT_MAX_HEIGHT;
use crate::correlation::PendingRequests;
use crate::transport::{post_logged, MessageEvent, MessageSource, MessageTarget, ANY_ORIGIN};

/// Host-provided values as last seen by the widget.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetGlobals {
    pub theme: Theme,
    pub display_mode: DisplayMode,
    pub available_display_modes: Vec<DisplayMode>,
    pub max_height: u32,
    pub tool_input: Option<Value>,
    pub tool_output: Option<Value>,
    pub widget_state: Option<Value>,
    pub initialized: bool,
}

impl Default for WidgetGlobals {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            display_mode: DisplayMode::default(),
            available_display_modes: DisplayMode::ALL.to_vec(),
            max_height: DEFAULT_MAX_HEIGHT,
            tool_input: None,
            tool_output: None,
            widget_state: None,
            initialized: false,
        }
    }
}

impl WidgetGlobals {
    fn apply_context(&mut self, context: HostContext) {
        self.theme = context.theme;
        self.display_mode = context.display_mode;
        self.available_display_modes = context.available_display_modes;
        self.max_height = context.container_dimensions.max_height;
        if context.widget_state.is_some() {
            self.widget_state = context.widget_state;
        }
    }
}

struct SessionInner {
    parent: Arc<dyn MessageTarget>,
    pending: PendingRequests,
    globals: watch::Sender<Arc<WidgetGlobals>>,
}

#[derive(Clone)]
pub struct WidgetSession {
    inner: Arc<SessionInner>,
}

impl WidgetSession {
    pub fn new(parent: Arc<dyn MessageTarget>, request_timeout: Duration) -> Self {
        Self::with_globals(parent, request_timeout, WidgetGlobals::default())
    }

    /// Starts from values already known to the widget, such as the snapshot
    /// embedded by the legacy bridge.
    pub fn with_globals(
        parent: Arc<dyn MessageTarget>,
        request_timeout: Duration,
        globals: WidgetGlobals,
    ) -> Self {
        let (globals, _) = watch::channel(Arc::new(globals));
        Self {
            inner: Arc::new(SessionInner {
                parent,
                pending: PendingRequests::new(request_timeout),
                globals,
            }),
        }
    }

    pub fn globals(&self) -> Arc<WidgetGlobals> {
        self.inner.globals.borrow().clone()
    }

    pub fn theme(&self) -> Theme {
        self.inner.globals.borrow().theme
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.inner.globals.borrow().display_mode
    }

    pub fn max_height(&self) -> u32 {
        self.inner.globals.borrow().max_height
    }

    pub fn tool_input(&self) -> Option<Value> {
        self.inner.globals.borrow().tool_input.clone()
    }

    pub fn tool_output(&self) -> Option<Value> {
        self.inner.globals.borrow().tool_output.clone()
    }

    pub fn widget_state(&self) -> Option<Value> {
        self.inner.globals.borrow().widget_state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WidgetGlobals>> {
        self.inner.globals.subscribe()
    }

    pub fn updates(&self) -> WatchStream<Arc<WidgetGlobals>> {
        WatchStream::new(self.subscribe())
    }

    /// Performs the handshake: `initialize` request, then the `initialized`
    /// notification once the host context has been applied.
    pub async fn initialize(&self, app_name: &str, app_version: &str) -> Result<InitializeResult, BridgeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "appInfo": { "name": app_name, "version": app_version },
            "appCapabilities": {},
        });
        let result: InitializeResult = self.request(INITIALIZE, params).await?;
        tracing::info!(
            host = %result.host_info.name,
            protocol_version = %result.protocol_version,
            "connected to host"
        );

        let context = result.host_context.clone();
        self.publish(|globals| {
            globals.apply_context(context);
            globals.initialized = true;
        });
        self.notify(INITIALIZED, json!({}));
        Ok(result)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, BridgeError> {
        self.request(TOOLS_CALL, json!({ "name": name, "arguments": arguments }))
            .await
    }

    pub async fn open_external(&self, url: &str) -> Result<(), BridgeError> {
        self.send(OPEN_LINK, json!({ "url": url })).await.map(|_| ())
    }

    /// Asks for a display mode and returns the mode the host echoed back.
    pub async fn request_display_mode(&self, mode: DisplayMode) -> Result<DisplayMode, BridgeError> {
        let result = self
            .send(REQUEST_DISPLAY_MODE, json!({ "mode": mode.as_str() }))
            .await?;
        Ok(result
            .get("mode")
            .and_then(Value::as_str)
            .and_then(DisplayMode::parse)
            .unwrap_or(mode))
    }

    pub async fn send_follow_up_message(&self, prompt: &str) -> Result<(), BridgeError> {
        self.send(SEND_MESSAGE, json!({ "prompt": prompt })).await.map(|_| ())
    }

    /// Publishes the new state locally before the host acknowledges it, so
    /// reads right after the call observe the write.
    pub async fn set_widget_state(&self, state: Value) -> Result<(), BridgeError> {
        let local = state.clone();
        self.publish(|globals| globals.widget_state = Some(local));
        self.send(SET_WIDGET_STATE, json!({ "state": state }))
            .await
            .map(|_| ())
    }

    pub fn log(&self, level: LogLevel, data: Value) {
        self.notify(LOG_MESSAGE, json!({ "level": level.as_str(), "data": data }));
    }

    pub fn notify_size_changed(&self, width: f64, height: f64) {
        self.notify(SIZE_CHANGED, json!({ "width": width, "height": height }));
    }

    /// Entry point for `message` events delivered to the widget window. Only
    /// the parent is listened to.
    pub async fn handle_message(&self, event: MessageEvent) {
        if event.source != MessageSource::Parent {
            tracing::debug!(source = ?event.source, "widget ignoring message from non-parent window");
            return;
        }
        let envelope = match Envelope::parse(&event.data) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(error = %err, "widget ignoring malformed message");
                return;
            }
        };

        match envelope {
            Envelope::Response { id, outcome } => {
                self.inner.pending.complete(&id, outcome).await;
            }
            Envelope::Notification { method, params } => match WidgetBound::decode(&method, params) {
                Ok(decoded) => self.apply(decoded),
                Err(err) => tracing::debug!(method = %method, error = %err, "widget dropping notification"),
            },
            Envelope::Request { id, method, .. } => {
                tracing::debug!(method = %method, "widget does not serve host requests");
                self.respond(id, Err(RpcError::method_not_found()));
            }
        }
    }

    fn apply(&self, decoded: Decoded<WidgetBound>) {
        match decoded.message {
            WidgetBound::SandboxResourceReady(_) => {
                tracing::debug!("sandbox resource notification reached the widget; ignoring");
            }
            WidgetBound::ToolInput(params) => {
                self.publish(|globals| globals.tool_input = Some(params.arguments));
            }
            WidgetBound::ToolResult(params) => {
                let output = tool_output_from_result(&params);
                self.publish(|globals| globals.tool_output = Some(output));
            }
            WidgetBound::HostContextChanged(context) => {
                self.publish(|globals| globals.apply_context(context));
            }
        }
    }

    fn publish(&self, update: impl FnOnce(&mut WidgetGlobals)) {
        self.inner.globals.send_modify(|current| {
            let mut next = WidgetGlobals::clone(current);
            update(&mut next);
            *current = Arc::new(next);
        });
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        let pending = self.inner.pending.register().await;
        let id = pending.id().clone();
        post_logged(
            self.inner.parent.as_ref(),
            &JsonRpcMessage::request(id, method, params),
            ANY_ORIGIN,
        );
        Ok(self.inner.pending.wait(pending).await?)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, BridgeError> {
        let result = self.send(method, params).await?;
        serde_json::from_value(result).map_err(|err| BridgeError::InvalidParams {
            method: method.to_string(),
            message: err.to_string(),
        })
    }

    fn notify(&self, method: &str, params: Value) {
        post_logged(
            self.inner.parent.as_ref(),
            &JsonRpcMessage::notification(method, params),
            ANY_ORIGIN,
        );
    }

    fn respond(&self, id: RequestId, outcome: Result<Value, RpcError>) {
        post_logged(
            self.inner.parent.as_ref(),
            &JsonRpcMessage::response(id, outcome),
            ANY_ORIGIN,
        );
    }
}
