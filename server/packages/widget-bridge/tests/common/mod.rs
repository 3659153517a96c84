#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use widget_bridge::testing::{ChannelTarget, FnTarget, MemoryDocument, RecordingTarget, RecordingUi};
use widget_bridge::{
    BridgeCallbacks, BridgeConfig, FrameId, HostBridge, MessageEvent, MessageSource,
    MessageTarget, RelayConfig, SandboxRelay, TransportError, WidgetDocument, WidgetSession,
    WidgetStateStore,
};

pub const HOST_ORIGIN: &str = "https://chat.example.com";
pub const SANDBOX_ORIGIN: &str = "https://sandbox.example.com";
pub const SANDBOX_URL: &str = "https://sandbox.example.com/relay.html";
pub const WIDGET_HTML: &str = "<html><head></head><body>X</body></html>";

pub fn bridge_config() -> BridgeConfig {
    let mut config = BridgeConfig::new(Url::parse(SANDBOX_URL).expect("sandbox url"))
        .with_host_info("test-host", "1.0.0");
    config.allow_localhost_origins = true;
    config
}

/// Lets every pump task run until the channels are drained.
pub async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}

/// Host, relay and widget wired together over in-memory channels.
pub struct Harness {
    pub host: HostBridge,
    pub widget: WidgetSession,
    pub ui: Arc<RecordingUi>,
    pub state: WidgetStateStore,
    pub host_document: MemoryDocument,
    pub relay_document: MemoryDocument,
    /// Everything the host posted to the relay frame.
    pub host_outbox: Arc<RecordingTarget>,
    /// Everything the relay delivered to the widget frame.
    pub widget_inbox: Arc<RecordingTarget>,
    relay: Arc<Mutex<Option<SandboxRelay>>>,
    host_tx: mpsc::UnboundedSender<MessageEvent>,
    relay_tx: mpsc::UnboundedSender<MessageEvent>,
}

impl Harness {
    pub fn new(configure: impl FnOnce(BridgeCallbacks) -> BridgeCallbacks) -> Self {
        Self::with_state(WidgetStateStore::new(), configure)
    }

    pub fn with_state(
        state: WidgetStateStore,
        configure: impl FnOnce(BridgeCallbacks) -> BridgeCallbacks,
    ) -> Self {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (relay_tx, mut relay_rx) = mpsc::unbounded_channel();
        let (widget_tx, mut widget_rx) = mpsc::unbounded_channel();

        let host_outbox = RecordingTarget::new();
        let host_document = {
            let relay_tx = relay_tx.clone();
            let outbox = host_outbox.clone();
            MemoryDocument::with_windows(move |_frame| {
                let channel =
                    ChannelTarget::new(relay_tx.clone(), SANDBOX_ORIGIN, HOST_ORIGIN, MessageSource::Parent);
                let outbox = outbox.clone();
                Arc::new(FnTarget(move |message: &Value, target_origin: &str| {
                    outbox.post_message(message, target_origin)?;
                    channel.post_message(message, target_origin)
                })) as Arc<dyn MessageTarget>
            })
        };

        let widget_inbox = RecordingTarget::new();
        let relay_document = {
            let widget_tx = widget_tx.clone();
            let inbox = widget_inbox.clone();
            MemoryDocument::with_windows(move |_frame| {
                let channel =
                    ChannelTarget::new(widget_tx.clone(), "null", SANDBOX_ORIGIN, MessageSource::Parent);
                let inbox = inbox.clone();
                Arc::new(FnTarget(move |message: &Value, target_origin: &str| {
                    inbox.post_message(message, target_origin)?;
                    channel.post_message(message, target_origin)
                })) as Arc<dyn MessageTarget>
            })
        };

        let ui = RecordingUi::new();
        let callbacks = configure(
            BridgeCallbacks::default()
                .with_ui_events(ui.clone())
                .with_window_opener(ui.clone()),
        );
        let host = HostBridge::new(
            bridge_config(),
            Arc::new(host_document.clone()),
            callbacks,
            state.clone(),
        );

        let relay: Arc<Mutex<Option<SandboxRelay>>> = Arc::new(Mutex::new(None));
        let widget_parent = {
            let relay = relay.clone();
            let relay_tx = relay_tx.clone();
            FnTarget(move |message: &Value, target_origin: &str| {
                let inner = relay
                    .lock()
                    .ok()
                    .and_then(|slot| slot.as_ref().and_then(SandboxRelay::inner_frame_id));
                let Some(inner) = inner else {
                    return Err(TransportError::Closed);
                };
                ChannelTarget::new(relay_tx.clone(), SANDBOX_ORIGIN, "null", MessageSource::Frame(inner))
                    .post_message(message, target_origin)
            })
        };
        let widget = WidgetSession::new(Arc::new(widget_parent), Duration::from_secs(30));

        {
            let host = host.clone();
            tokio::spawn(async move {
                while let Some(event) = host_rx.recv().await {
                    host.handle_message(event).await;
                }
            });
        }
        {
            let relay = relay.clone();
            tokio::spawn(async move {
                while let Some(event) = relay_rx.recv().await {
                    let current = relay.lock().ok().and_then(|slot| slot.clone());
                    if let Some(current) = current {
                        current.handle_message(event);
                    }
                }
            });
        }
        {
            let widget = widget.clone();
            tokio::spawn(async move {
                while let Some(event) = widget_rx.recv().await {
                    widget.handle_message(event).await;
                }
            });
        }

        Self {
            host,
            widget,
            ui,
            state,
            host_document,
            relay_document,
            host_outbox,
            widget_inbox,
            relay,
            host_tx,
            relay_tx,
        }
    }

    /// Mounts `document` on the host and loads a relay into the new outer
    /// frame, the way a browser would once the frame's `src` loads.
    pub async fn mount(&self, document: WidgetDocument) -> FrameId {
        let outer = self.host.mount(document).expect("mount widget");
        let parent = ChannelTarget::new(
            self.host_tx.clone(),
            HOST_ORIGIN,
            SANDBOX_ORIGIN,
            MessageSource::Frame(outer),
        );
        let config = RelayConfig::new(Url::parse(SANDBOX_URL).expect("sandbox url"))
            .with_referrer(format!("{HOST_ORIGIN}/chat/1"));
        let relay = SandboxRelay::start(config, parent, Arc::new(self.relay_document.clone()));
        if let Ok(mut slot) = self.relay.lock() {
            *slot = Some(relay);
        }
        settle().await;
        outer
    }

    /// Mounts and completes the widget handshake.
    pub async fn connect(&self, document: WidgetDocument) -> FrameId {
        let outer = self.mount(document).await;
        self.widget
            .initialize("test-widget", "0.1.0")
            .await
            .expect("initialize");
        settle().await;
        outer
    }

    pub fn relay(&self) -> SandboxRelay {
        self.relay
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .expect("relay started")
    }

    /// Posts raw data to the host as if the inner widget had sent it.
    pub fn send_from_widget(&self, data: Value) {
        let inner = self.relay().inner_frame_id().expect("inner frame");
        self.relay_tx
            .send(MessageEvent::new("null", MessageSource::Frame(inner), data))
            .expect("relay channel open");
    }

    /// Messages the relay forwarded to the widget that answer `id`.
    pub fn responses_to(&self, id: Value) -> Vec<Value> {
        self.widget_inbox
            .messages()
            .into_iter()
            .map(|posted| posted.message)
            .filter(|message| message.get("method").is_none() && message.get("id") == Some(&id))
            .collect()
    }

    /// Method names the host posted, in order.
    pub fn host_methods(&self) -> Vec<String> {
        self.host_outbox
            .methods()
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Host mounted on a recording document, with no relay attached.
pub fn recording_host(callbacks: BridgeCallbacks) -> (HostBridge, MemoryDocument, FrameId) {
    let document = MemoryDocument::recording();
    let host = HostBridge::new(
        bridge_config(),
        Arc::new(document.clone()),
        callbacks,
        WidgetStateStore::new(),
    );
    let outer = host
        .mount(WidgetDocument::new(WIDGET_HTML))
        .expect("mount widget");
    (host, document, outer)
}

pub fn from_relay(outer: FrameId, data: Value) -> MessageEvent {
    MessageEvent::new(SANDBOX_ORIGIN, MessageSource::Frame(outer), data)
}
