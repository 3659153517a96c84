//! In-memory windows and frames for driving the bridge without a browser.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::callbacks::{UiEvent, UiEventSink, WindowOpener};
use crate::frame::{FrameDocument, FrameError, FrameHandle, FrameSpec};
use crate::transport::{FrameId, MessageEvent, MessageSource, MessageTarget, TransportError, ANY_ORIGIN};

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub message: Value,
    pub target_origin: String,
}

impl PostedMessage {
    pub fn method(&self) -> Option<&str> {
        self.message.get("method").and_then(Value::as_str)
    }
}

/// Window that keeps everything posted to it.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    posted: Mutex<Vec<PostedMessage>>,
    closed: AtomicBool,
}

impl RecordingTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<PostedMessage> {
        self.posted.lock().map(|posted| posted.clone()).unwrap_or_default()
    }

    /// Method names in posting order; responses show up as `None`.
    pub fn methods(&self) -> Vec<Option<String>> {
        self.messages()
            .iter()
            .map(|posted| posted.method().map(str::to_string))
            .collect()
    }

    pub fn take(&self) -> Vec<PostedMessage> {
        self.posted
            .lock()
            .map(|mut posted| std::mem::take(&mut *posted))
            .unwrap_or_default()
    }

    /// Makes further posts fail as if the window had gone away.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl MessageTarget for RecordingTarget {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let Ok(mut posted) = self.posted.lock() else {
            return Err(TransportError::Delivery("recorder lock poisoned".to_string()));
        };
        posted.push(PostedMessage {
            message: message.clone(),
            target_origin: target_origin.to_string(),
        });
        Ok(())
    }
}

/// Window whose posts are delivered as [`MessageEvent`]s on a channel, the
/// way a browser queues `message` events for the receiving window.
#[derive(Debug, Clone)]
pub struct ChannelTarget {
    tx: mpsc::UnboundedSender<MessageEvent>,
    receiver_origin: String,
    sender_origin: String,
    source: MessageSource,
}

impl ChannelTarget {
    /// `receiver_origin` is the origin of the window being posted to; posts
    /// naming another target origin are discarded. `sender_origin` and
    /// `source` describe the posting window as the receiver sees it.
    pub fn new(
        tx: mpsc::UnboundedSender<MessageEvent>,
        receiver_origin: impl Into<String>,
        sender_origin: impl Into<String>,
        source: MessageSource,
    ) -> Arc<Self> {
        Arc::new(Self {
            tx,
            receiver_origin: receiver_origin.into(),
            sender_origin: sender_origin.into(),
            source,
        })
    }
}

impl MessageTarget for ChannelTarget {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), TransportError> {
        if target_origin != ANY_ORIGIN && target_origin != self.receiver_origin {
            tracing::debug!(
                target_origin = target_origin,
                receiver_origin = %self.receiver_origin,
                "target origin mismatch; message not delivered"
            );
            return Ok(());
        }
        self.tx
            .send(MessageEvent::new(self.sender_origin.clone(), self.source, message.clone()))
            .map_err(|_| TransportError::Closed)
    }
}

pub struct FnTarget<F>(pub F);

impl<F> MessageTarget for FnTarget<F>
where
    F: Fn(&Value, &str) -> Result<(), TransportError> + Send + Sync + 'static,
{
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), TransportError> {
        (self.0)(message, target_origin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub id: FrameId,
    pub src: Option<Url>,
    pub sandbox: String,
    pub allow: Option<String>,
    pub html: Option<String>,
    pub mount: Option<&'static str>,
    pub removed: bool,
}

type WindowFactory = dyn Fn(FrameId) -> Arc<dyn MessageTarget> + Send + Sync;

struct DocumentState {
    next_id: u64,
    frames: Vec<FrameSnapshot>,
    recorders: Vec<(FrameId, Arc<RecordingTarget>)>,
}

/// Document that creates frames in memory.
#[derive(Clone)]
pub struct MemoryDocument {
    state: Arc<Mutex<DocumentState>>,
    windows: Option<Arc<WindowFactory>>,
    document_write: bool,
}

impl MemoryDocument {
    /// Every frame window is a [`RecordingTarget`], reachable via `recorder`.
    pub fn recording() -> Self {
        Self {
            state: Arc::new(Mutex::new(DocumentState {
                next_id: 1,
                frames: Vec::new(),
                recorders: Vec::new(),
            })),
            windows: None,
            document_write: true,
        }
    }

    /// Frame windows come from `factory`, typically [`ChannelTarget`]s wired
    /// to another side of the bridge.
    pub fn with_windows(
        factory: impl Fn(FrameId) -> Arc<dyn MessageTarget> + Send + Sync + 'static,
    ) -> Self {
        let mut document = Self::recording();
        document.windows = Some(Arc::new(factory));
        document
    }

    /// Frames created from now on only accept `srcdoc`.
    pub fn without_document_write(mut self) -> Self {
        self.document_write = false;
        self
    }

    pub fn frames(&self) -> Vec<FrameSnapshot> {
        self.state
            .lock()
            .map(|state| state.frames.clone())
            .unwrap_or_default()
    }

    pub fn live_frames(&self) -> Vec<FrameSnapshot> {
        self.frames().into_iter().filter(|frame| !frame.removed).collect()
    }

    pub fn recorder(&self, id: FrameId) -> Option<Arc<RecordingTarget>> {
        let state = self.state.lock().ok()?;
        state
            .recorders
            .iter()
            .find(|(frame, _)| *frame == id)
            .map(|(_, recorder)| recorder.clone())
    }

    fn update(&self, id: FrameId, apply: impl FnOnce(&mut FrameSnapshot) -> Result<(), FrameError>) -> Result<(), FrameError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(FrameError::Create("document lock poisoned".to_string()));
        };
        let frame = state
            .frames
            .iter_mut()
            .find(|frame| frame.id == id)
            .ok_or(FrameError::Removed(id))?;
        if frame.removed {
            return Err(FrameError::Removed(id));
        }
        apply(frame)
    }
}

impl FrameDocument for MemoryDocument {
    fn create_frame(&self, spec: &FrameSpec) -> Result<Box<dyn FrameHandle>, FrameError> {
        let id = {
            let Ok(mut state) = self.state.lock() else {
                return Err(FrameError::Create("document lock poisoned".to_string()));
            };
            let id = FrameId(state.next_id);
            state.next_id += 1;
            state.frames.push(FrameSnapshot {
                id,
                src: spec.src.clone(),
                sandbox: spec.sandbox.clone(),
                allow: spec.allow.clone(),
                html: None,
                mount: None,
                removed: false,
            });
            id
        };

        let window: Arc<dyn MessageTarget> = match &self.windows {
            Some(factory) => factory(id),
            None => {
                let recorder = RecordingTarget::new();
                if let Ok(mut state) = self.state.lock() {
                    state.recorders.push((id, recorder.clone()));
                }
                recorder
            }
        };

        Ok(Box::new(MemoryFrame {
            id,
            window,
            document: self.clone(),
            document_write: self.document_write,
        }))
    }
}

struct MemoryFrame {
    id: FrameId,
    window: Arc<dyn MessageTarget>,
    document: MemoryDocument,
    document_write: bool,
}

impl FrameHandle for MemoryFrame {
    fn id(&self) -> FrameId {
        self.id
    }

    fn window(&self) -> Arc<dyn MessageTarget> {
        self.window.clone()
    }

    fn supports_document_write(&self) -> bool {
        self.document_write
    }

    fn write_document(&self, html: &str) -> Result<(), FrameError> {
        if !self.document_write {
            return Err(FrameError::NotWritable(self.id));
        }
        self.document.update(self.id, |frame| {
            frame.html = Some(html.to_string());
            frame.mount = Some("document-write");
            Ok(())
        })
    }

    fn set_srcdoc(&self, html: &str) -> Result<(), FrameError> {
        self.document.update(self.id, |frame| {
            frame.html = Some(html.to_string());
            frame.mount = Some("srcdoc");
            Ok(())
        })
    }

    fn remove(&self) {
        let _ = self.document.update(self.id, |frame| {
            frame.removed = true;
            Ok(())
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedWindow {
    pub url: String,
    pub target: String,
    pub features: String,
}

/// Records UI events and opened windows.
#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
    opened: Mutex<Vec<OpenedWindow>>,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn opened(&self) -> Vec<OpenedWindow> {
        self.opened.lock().map(|opened| opened.clone()).unwrap_or_default()
    }
}

impl UiEventSink for RecordingUi {
    fn on_message(&self, event: UiEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl WindowOpener for RecordingUi {
    fn open(&self, url: &str, target: &str, features: &str) {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(OpenedWindow {
                url: url.to_string(),
                target: target.to_string(),
                features: features.to_string(),
            });
        }
    }
}
