//! Host side of the widget protocol.
//!
//! [`HostBridge`] owns the outer relay frame of one widget and drives the
//! session through `Unready -> SandboxReady -> Initializing -> Steady`. It
//! never touches the widget document; everything goes through the relay via
//! `post_message`.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use widget_bridge_error::{BridgeError, RpcError};
use widget_bridge_protocol::methods::{
    HOST_CONTEXT_CHANGED, SANDBOX_RESOURCE_READY, TOOL_INPUT, TOOL_RESULT,
};
use widget_bridge_protocol::{
    ContainerDimensions, Decoded, DisplayMode, Envelope, HostBound, HostCapabilities, HostContext,
    InitializeResult, JsonRpcMessage, LogLevel, LogParams, RequestId, SandboxResourceParams,
    Spelling, Theme, ToolCallParams, ToolCallResult, ToolInputParams, PROTOCOL_VERSION,
};

use crate::callbacks::{BridgeCallbacks, UiEvent, OPEN_LINK_FEATURES, OPEN_LINK_TARGET};
use crate::config::{BridgeConfig, DEFAULT_WIDGET_SANDBOX_FLAGS, OUTER_SANDBOX_FLAGS};
use crate::correlation::PendingRequests;
use crate::frame::{FrameDocument, FrameError, FrameHandle, FrameSpec};
use crate::legacy::{inject_legacy_bridge, LegacySnapshot};
use crate::origin::OriginPolicy;
use crate::transport::{post_logged, FrameId, MessageEvent, MessageSource, MessageTarget};
use crate::widget_state::WidgetStateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    Unready,
    SandboxReady,
    Initializing,
    Steady,
}

/// The widget payload handed to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetDocument {
    pub html: String,
    /// Inner frame sandbox flags; the relay default applies when absent.
    pub sandbox: Option<String>,
    pub permissions: Option<String>,
    /// Key under which the widget's state blob is persisted.
    pub state_key: Option<String>,
}

impl WidgetDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            sandbox: None,
            permissions: None,
            state_key: None,
        }
    }

    pub fn with_sandbox(mut self, flags: impl Into<String>) -> Self {
        self.sandbox = Some(flags.into());
        self
    }

    pub fn with_permissions(mut self, allow: impl Into<String>) -> Self {
        self.permissions = Some(allow.into());
        self
    }

    pub fn with_state_key(mut self, key: impl Into<String>) -> Self {
        self.state_key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: BridgePhase,
    pub sandbox_ready: bool,
    pub app_initialized: bool,
    pub theme: Theme,
    pub display_mode: DisplayMode,
    pub tool_input: Option<Value>,
    pub tool_output: Option<Value>,
}

struct Session {
    phase: BridgePhase,
    document: Option<WidgetDocument>,
    outer: Option<Box<dyn FrameHandle>>,
    theme: Theme,
    display_mode: DisplayMode,
    tool_input: Option<Value>,
    tool_output: Option<Value>,
    /// Last state written by a widget without a state key.
    widget_state: Option<Value>,
}

impl Session {
    fn app_initialized(&self) -> bool {
        self.phase == BridgePhase::Steady
    }

    fn sandbox_ready(&self) -> bool {
        self.phase != BridgePhase::Unready
    }
}

struct HostBridgeInner {
    config: BridgeConfig,
    callbacks: BridgeCallbacks,
    frames: Arc<dyn FrameDocument>,
    widget_state: WidgetStateStore,
    origins: OriginPolicy,
    pending: PendingRequests,
    session: Mutex<Session>,
}

/// Host-side protocol bridge for one widget instance.
#[derive(Clone)]
pub struct HostBridge {
    inner: Arc<HostBridgeInner>,
}

/// Target and origin to post to, copied out of the session lock.
struct Route {
    window: Arc<dyn MessageTarget>,
    origin: String,
}

impl HostBridge {
    pub fn new(
        config: BridgeConfig,
        frames: Arc<dyn FrameDocument>,
        callbacks: BridgeCallbacks,
        widget_state: WidgetStateStore,
    ) -> Self {
        let origins = OriginPolicy::new(config.sandbox_origin())
            .with_localhost(config.allow_localhost_origins);
        let pending = PendingRequests::new(config.request_timeout);
        Self {
            inner: Arc::new(HostBridgeInner {
                config,
                callbacks,
                frames,
                widget_state,
                origins,
                pending,
                session: Mutex::new(Session {
                    phase: BridgePhase::Unready,
                    document: None,
                    outer: None,
                    theme: Theme::default(),
                    display_mode: DisplayMode::default(),
                    tool_input: None,
                    tool_output: None,
                    widget_state: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Creates the outer relay frame for `document`. Mounting the same HTML
    /// again is a no-op; different HTML tears the old frame down and starts a
    /// fresh session.
    pub fn mount(&self, document: WidgetDocument) -> Result<FrameId, FrameError> {
        let Ok(mut session) = self.inner.session.lock() else {
            return Err(FrameError::Create("session lock poisoned".to_string()));
        };

        if let (Some(current), Some(outer)) = (&session.document, &session.outer) {
            if current.html == document.html {
                tracing::debug!(frame = %outer.id(), "widget html unchanged; keeping mounted frame");
                return Ok(outer.id());
            }
        }

        if let Some(previous) = session.outer.take() {
            tracing::info!(frame = %previous.id(), "widget html changed; remounting");
            previous.remove();
        }

        let spec = FrameSpec {
            src: Some(self.inner.config.sandbox_url.clone()),
            sandbox: OUTER_SANDBOX_FLAGS.to_string(),
            allow: document.permissions.clone(),
        };
        let outer = self.inner.frames.create_frame(&spec)?;
        let id = outer.id();
        tracing::info!(
            frame = %id,
            sandbox_url = %self.inner.config.sandbox_url,
            html_bytes = document.html.len(),
            "mounted sandbox relay frame"
        );

        session.outer = Some(outer);
        session.document = Some(document);
        session.widget_state = None;
        session.phase = BridgePhase::Unready;
        Ok(id)
    }

    pub fn unmount(&self) {
        let Ok(mut session) = self.inner.session.lock() else {
            return;
        };
        if let Some(outer) = session.outer.take() {
            tracing::info!(frame = %outer.id(), "unmounting widget");
            outer.remove();
        }
        session.document = None;
        session.widget_state = None;
        session.phase = BridgePhase::Unready;
    }

    pub fn phase(&self) -> BridgePhase {
        self.inner
            .session
            .lock()
            .map(|session| session.phase)
            .unwrap_or(BridgePhase::Unready)
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let session = self.inner.session.lock().ok()?;
        Some(SessionSnapshot {
            phase: session.phase,
            sandbox_ready: session.sandbox_ready(),
            app_initialized: session.app_initialized(),
            theme: session.theme,
            display_mode: session.display_mode,
            tool_input: session.tool_input.clone(),
            tool_output: session.tool_output.clone(),
        })
    }

    /// Current host context as it would be sent to the widget.
    pub fn host_context(&self) -> HostContext {
        match self.inner.session.lock() {
            Ok(session) => self.build_context(&session),
            Err(_) => HostContext {
                theme: Theme::default(),
                display_mode: DisplayMode::default(),
                available_display_modes: self.inner.config.available_display_modes.clone(),
                container_dimensions: ContainerDimensions {
                    max_height: self.inner.config.max_height,
                },
                widget_state: None,
            },
        }
    }

    pub fn set_theme(&self, theme: Theme) {
        self.update_context(|session| {
            let changed = session.theme != theme;
            session.theme = theme;
            changed
        });
    }

    pub fn set_display_mode(&self, mode: DisplayMode) {
        self.update_context(|session| {
            let changed = session.display_mode != mode;
            session.display_mode = mode;
            changed
        });
    }

    pub fn set_tool_input(&self, arguments: Value) {
        if let Ok(mut session) = self.inner.session.lock() {
            session.tool_input = Some(arguments);
        }
    }

    /// Records the tool output. A widget that already finished its handshake
    /// receives it right away as a `tool-result` notification.
    pub fn set_tool_output(&self, output: Value) {
        let route = {
            let Ok(mut session) = self.inner.session.lock() else {
                return;
            };
            session.tool_output = Some(output.clone());
            if !session.app_initialized() {
                return;
            }
            self.route(&session)
        };
        if let Some(route) = route {
            let params = serde_json::to_value(ToolCallResult::structured(output)).unwrap_or_default();
            self.post(&route, &JsonRpcMessage::notification(TOOL_RESULT, params));
        }
    }

    /// Sends a request to the widget and waits for its response or the
    /// configured timeout.
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let pending = self.inner.pending.register().await;
        let id = pending.id().clone();
        match self.current_route() {
            Some(route) => {
                tracing::debug!(method = method, id = %id, "sending request to widget");
                self.post(&route, &JsonRpcMessage::request(id, method, params));
            }
            None => {
                tracing::warn!(method = method, id = %id, "no mounted widget; request will time out");
            }
        }
        self.inner.pending.wait(pending).await
    }

    pub fn send_notification(&self, method: &str, params: Value) {
        match self.current_route() {
            Some(route) => self.post(&route, &JsonRpcMessage::notification(method, params)),
            None => tracing::debug!(method = method, "no mounted widget; notification dropped"),
        }
    }

    pub async fn pending_requests(&self) -> usize {
        self.inner.pending.len().await
    }

    /// Entry point for every `message` event delivered to the host window.
    pub async fn handle_message(&self, event: MessageEvent) {
        if !self.inner.origins.accepts(&event.origin) {
            tracing::debug!(origin = %event.origin, "dropping message from unexpected origin");
            return;
        }

        let Some(outer) = self.outer_frame_id() else {
            tracing::debug!("no mounted widget; dropping message");
            return;
        };
        if event.source != MessageSource::Frame(outer) {
            tracing::debug!(source = ?event.source, "dropping message from foreign window");
            return;
        }

        let envelope = match Envelope::parse(&event.data) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(error = %err, "dropping malformed message");
                return;
            }
        };

        match envelope {
            Envelope::Response { id, outcome } => {
                self.inner.pending.complete(&id, outcome).await;
            }
            Envelope::Request { id, method, params } => {
                match HostBound::decode(&method, params) {
                    Ok(decoded) => self.dispatch(Some(id), &method, decoded).await,
                    Err(err) => {
                        let err = BridgeError::from(err);
                        tracing::debug!(method = %method, error = %err, "rejecting request");
                        self.respond(id, Err(err.to_rpc_error()));
                    }
                }
            }
            Envelope::Notification { method, params } => {
                match HostBound::decode(&method, params) {
                    Ok(decoded) => self.dispatch(None, &method, decoded).await,
                    Err(err) => {
                        tracing::debug!(method = %method, error = %err, "dropping notification");
                    }
                }
            }
        }
    }

    async fn dispatch(&self, id: Option<RequestId>, method: &str, decoded: Decoded<HostBound>) {
        let Decoded { message, spelling } = decoded;
        let ack = ack_for(spelling);
        let outcome: Result<Value, BridgeError> = match message {
            HostBound::SandboxProxyReady => {
                self.on_sandbox_ready();
                Ok(ack)
            }
            HostBound::Initialize(params) => {
                tracing::info!(
                    protocol_version = ?params.protocol_version,
                    app_info = ?params.app_info,
                    "widget initializing"
                );
                self.on_initialize()
            }
            HostBound::Initialized => {
                self.on_initialized();
                Ok(ack)
            }
            HostBound::ToolsCall(params) => {
                // Tool calls may take long; answer from a task so the message
                // loop keeps running.
                match id {
                    Some(id) => self.spawn_tool_call(id, params),
                    None => tracing::debug!(tool = %params.name, "ignoring tools/call sent as notification"),
                }
                return;
            }
            HostBound::OpenLink(params) => {
                match &self.inner.callbacks.window_opener {
                    Some(opener) => {
                        tracing::info!(url = %params.url, "opening external link");
                        opener.open(&params.url, OPEN_LINK_TARGET, OPEN_LINK_FEATURES);
                    }
                    None => tracing::warn!(url = %params.url, "no window opener configured"),
                }
                Ok(ack)
            }
            HostBound::RequestDisplayMode(params) => {
                self.inner.callbacks.emit(UiEvent::RequestDisplayMode {
                    mode: params.mode.clone(),
                });
                Ok(json!({ "mode": params.mode }))
            }
            HostBound::UpdateModelContext(context) => {
                self.inner
                    .callbacks
                    .emit(UiEvent::UpdateModelContext { context });
                Ok(ack)
            }
            HostBound::SendMessage { text } => {
                self.inner.callbacks.emit(UiEvent::FollowUpMessage { text });
                Ok(ack)
            }
            HostBound::SetWidgetState(params) => {
                self.store_widget_state(params.state.clone());
                self.inner
                    .callbacks
                    .emit(UiEvent::WidgetStateChanged { state: params.state });
                Ok(ack)
            }
            HostBound::Log(params) => {
                log_widget_message(&params);
                Ok(ack)
            }
            HostBound::SizeChanged(size) => {
                tracing::trace!(width = ?size.width, height = ?size.height, "widget size changed");
                Ok(ack)
            }
        };

        match (id, outcome) {
            (Some(id), outcome) => self.respond(id, outcome.map_err(|err| err.to_rpc_error())),
            (None, Err(err)) => {
                tracing::debug!(method = method, error = %err, "notification handler failed");
            }
            (None, Ok(_)) => {}
        }
    }

    fn on_sandbox_ready(&self) {
        let (route, params) = {
            let Ok(mut session) = self.inner.session.lock() else {
                return;
            };
            let Some(document) = session.document.clone() else {
                tracing::debug!("sandbox ready without a widget document");
                return;
            };
            if session.phase != BridgePhase::Unready {
                tracing::debug!(phase = ?session.phase, "relay announced readiness again; resending resource");
            }
            session.phase = BridgePhase::SandboxReady;

            let widget_state = self.current_widget_state(&session);
            let snapshot = LegacySnapshot::new(
                session.theme,
                session.display_mode,
                self.inner.config.max_height,
            )
            .with_tool_output(session.tool_output.clone())
            .with_tool_input(session.tool_input.clone())
            .with_widget_state(widget_state);
            let html = inject_legacy_bridge(
                &document.html,
                &snapshot,
                self.inner.config.request_timeout,
            );
            let params = SandboxResourceParams {
                html,
                sandbox: Some(
                    document
                        .sandbox
                        .clone()
                        .unwrap_or_else(|| DEFAULT_WIDGET_SANDBOX_FLAGS.to_string()),
                ),
                permissions: document.permissions.clone(),
            };
            (self.route(&session), params)
        };

        let Some(route) = route else {
            return;
        };
        tracing::info!("sandbox relay ready; pushing widget resource");
        let params = serde_json::to_value(params).unwrap_or_default();
        self.post(
            &route,
            &JsonRpcMessage::notification(SANDBOX_RESOURCE_READY, params),
        );
    }

    fn on_initialize(&self) -> Result<Value, BridgeError> {
        let host_context = {
            let Ok(mut session) = self.inner.session.lock() else {
                return Err(BridgeError::Transport {
                    message: "session lock poisoned".to_string(),
                });
            };
            if session.phase == BridgePhase::Unready {
                tracing::debug!("initialize arrived before the relay announced readiness");
            }
            session.phase = BridgePhase::Initializing;
            self.build_context(&session)
        };
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            host_info: self.inner.config.host_info.clone(),
            host_capabilities: HostCapabilities::full(),
            host_context,
        };
        serde_json::to_value(result).map_err(|err| BridgeError::Transport {
            message: err.to_string(),
        })
    }

    fn on_initialized(&self) {
        let (route, tool_input, tool_output) = {
            let Ok(mut session) = self.inner.session.lock() else {
                return;
            };
            if session.phase != BridgePhase::Initializing {
                tracing::debug!(phase = ?session.phase, "ignoring initialized outside of handshake");
                return;
            }
            session.phase = BridgePhase::Steady;
            (
                self.route(&session),
                session.tool_input.clone(),
                session.tool_output.clone(),
            )
        };
        tracing::info!("widget initialized");

        let Some(route) = route else {
            return;
        };
        let input = ToolInputParams {
            arguments: tool_input.unwrap_or_else(|| json!({})),
        };
        let result = ToolCallResult::structured(tool_output.unwrap_or(Value::Null));
        self.post(
            &route,
            &JsonRpcMessage::notification(TOOL_INPUT, serde_json::to_value(input).unwrap_or_default()),
        );
        self.post(
            &route,
            &JsonRpcMessage::notification(TOOL_RESULT, serde_json::to_value(result).unwrap_or_default()),
        );
    }

    fn spawn_tool_call(&self, id: RequestId, params: ToolCallParams) {
        let Some(frame) = self.outer_frame_id() else {
            return;
        };
        let bridge = self.clone();
        tokio::spawn(async move {
            let outcome = bridge.call_tool(params).await;
            bridge.respond_to_frame(frame, id, outcome.map_err(|err| err.to_rpc_error()));
        });
    }

    /// Responds only if `frame` is still the mounted relay. Ids are scoped to
    /// one widget session, so a remounted widget must never see them.
    fn respond_to_frame(&self, frame: FrameId, id: RequestId, outcome: Result<Value, RpcError>) {
        let route = {
            let Ok(session) = self.inner.session.lock() else {
                return;
            };
            match &session.outer {
                Some(outer) if outer.id() == frame => self.route(&session),
                _ => None,
            }
        };
        match route {
            Some(route) => self.post(&route, &JsonRpcMessage::response(id, outcome)),
            None => tracing::debug!(
                frame = %frame,
                id = %id,
                "widget remounted before response was sent; dropping it"
            ),
        }
    }

    async fn call_tool(&self, params: ToolCallParams) -> Result<Value, BridgeError> {
        let Some(executor) = self.inner.callbacks.tool_executor.clone() else {
            tracing::warn!(tool = %params.name, "tool call requested but no executor configured");
            return Err(BridgeError::NotSupported {
                capability: "Tool calls".to_string(),
            });
        };

        tracing::info!(tool = %params.name, "widget tool call");
        match executor.call_tool(&params.name, params.arguments).await {
            Ok(result) => serde_json::to_value(ToolCallResult::text(&result)).map_err(|err| {
                BridgeError::ToolCallFailed {
                    name: params.name.clone(),
                    message: err.to_string(),
                }
            }),
            Err(message) => {
                tracing::warn!(tool = %params.name, error = %message, "tool call failed");
                Err(BridgeError::ToolCallFailed {
                    name: params.name,
                    message,
                })
            }
        }
    }

    fn update_context(&self, apply: impl FnOnce(&mut Session) -> bool) {
        let (route, context) = {
            let Ok(mut session) = self.inner.session.lock() else {
                return;
            };
            if !apply(&mut *session) || !session.app_initialized() {
                return;
            }
            (self.route(&session), self.build_context(&session))
        };
        let Some(route) = route else {
            return;
        };
        tracing::debug!(theme = ?context.theme, display_mode = ?context.display_mode, "host context changed");
        let params = serde_json::to_value(context).unwrap_or_default();
        self.post(&route, &JsonRpcMessage::notification(HOST_CONTEXT_CHANGED, params));
    }

    fn build_context(&self, session: &Session) -> HostContext {
        let widget_state = self.current_widget_state(session);
        HostContext {
            theme: session.theme,
            display_mode: session.display_mode,
            available_display_modes: self.inner.config.available_display_modes.clone(),
            container_dimensions: ContainerDimensions {
                max_height: self.inner.config.max_height,
            },
            widget_state,
        }
    }

    /// Persists under the document's state key, else keeps the value for the
    /// lifetime of the mounted session.
    fn store_widget_state(&self, state: Value) {
        let Ok(mut session) = self.inner.session.lock() else {
            return;
        };
        let key = session
            .document
            .as_ref()
            .and_then(|document| document.state_key.clone());
        match key {
            Some(key) => self.inner.widget_state.set(&key, state),
            None => {
                tracing::debug!("widget has no state key; state scoped to this mount");
                session.widget_state = Some(state);
            }
        }
    }

    fn current_widget_state(&self, session: &Session) -> Option<Value> {
        match session
            .document
            .as_ref()
            .and_then(|document| document.state_key.as_deref())
        {
            Some(key) => self.inner.widget_state.get(key),
            None => session.widget_state.clone(),
        }
    }

    fn outer_frame_id(&self) -> Option<FrameId> {
        let session = self.inner.session.lock().ok()?;
        session.outer.as_ref().map(|outer| outer.id())
    }

    fn route(&self, session: &Session) -> Option<Route> {
        session.outer.as_ref().map(|outer| Route {
            window: outer.window(),
            origin: self.inner.config.sandbox_origin(),
        })
    }

    fn current_route(&self) -> Option<Route> {
        let session = self.inner.session.lock().ok()?;
        self.route(&session)
    }

    fn respond(&self, id: RequestId, outcome: Result<Value, RpcError>) {
        match self.current_route() {
            Some(route) => self.post(&route, &JsonRpcMessage::response(id, outcome)),
            None => tracing::debug!(id = %id, "widget unmounted before response was sent"),
        }
    }

    fn post(&self, route: &Route, message: &JsonRpcMessage) {
        post_logged(route.window.as_ref(), message, &route.origin);
    }
}

fn ack_for(spelling: Spelling) -> Value {
    match spelling {
        Spelling::Current => json!({}),
        Spelling::Legacy => json!({ "success": true }),
    }
}

fn log_widget_message(params: &LogParams) {
    let logger = params.logger.as_deref().unwrap_or("widget");
    let data = &params.data;
    match params.level {
        LogLevel::Debug => tracing::debug!(target: "widget", logger = logger, data = %data, "widget log"),
        LogLevel::Info | LogLevel::Notice => {
            tracing::info!(target: "widget", logger = logger, data = %data, "widget log")
        }
        LogLevel::Warning => {
            tracing::warn!(target: "widget", logger = logger, data = %data, "widget log")
        }
        LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
            tracing::error!(target: "widget", logger = logger, data = %data, "widget log")
        }
    }
}
