//! Sandbox relay.
//!
//! Runs in the outer frame on the sandbox origin. It mounts the widget into
//! an inner frame and shuttles messages between that frame and the host
//! without interpreting them. The only message it acts on is
//! `sandbox-resource-ready`.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use widget_bridge_protocol::methods::SANDBOX_PROXY_READY;
use widget_bridge_protocol::{Envelope, JsonRpcMessage, Method, SandboxResourceParams};

use crate::config::{RelayConfig, DEFAULT_WIDGET_SANDBOX_FLAGS};
use crate::frame::{select_mount, FrameDocument, FrameError, FrameHandle, FrameSpec, HtmlMount, SrcdocMount};
use crate::origin::{resolve_host_origin, OriginPolicy};
use crate::transport::{post_logged, FrameId, MessageEvent, MessageSource, MessageTarget, ANY_ORIGIN};

struct RelayInner {
    parent: Arc<dyn MessageTarget>,
    document: Arc<dyn FrameDocument>,
    host_origin: String,
    origins: OriginPolicy,
    inner_frame: Mutex<Option<Box<dyn FrameHandle>>>,
}

#[derive(Clone)]
pub struct SandboxRelay {
    inner: Arc<RelayInner>,
}

impl SandboxRelay {
    /// Resolves the host origin and announces readiness to it.
    pub fn start(
        config: RelayConfig,
        parent: Arc<dyn MessageTarget>,
        document: Arc<dyn FrameDocument>,
    ) -> Self {
        let host_origin = resolve_host_origin(
            config.referrer.as_deref(),
            &config.location,
            config.fallback_host_port,
        );
        let origins =
            OriginPolicy::new(host_origin.clone()).with_localhost(config.allow_localhost_origins);
        tracing::info!(host_origin = %host_origin, location = %config.location, "sandbox relay starting");

        let relay = Self {
            inner: Arc::new(RelayInner {
                parent,
                document,
                host_origin,
                origins,
                inner_frame: Mutex::new(None),
            }),
        };
        post_logged(
            relay.inner.parent.as_ref(),
            &JsonRpcMessage::notification(SANDBOX_PROXY_READY, json!({})),
            &relay.inner.host_origin,
        );
        relay
    }

    pub fn host_origin(&self) -> &str {
        &self.inner.host_origin
    }

    pub fn inner_frame_id(&self) -> Option<FrameId> {
        let Ok(guard) = self.inner.inner_frame.lock() else {
            return None;
        };
        guard.as_ref().map(|frame| frame.id())
    }

    pub fn handle_message(&self, event: MessageEvent) {
        if !self.inner.origins.accepts(&event.origin) {
            tracing::debug!(origin = %event.origin, "relay dropping message from unexpected origin");
            return;
        }

        let envelope = match Envelope::parse(&event.data) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(error = %err, "relay ignoring non json-rpc message");
                return;
            }
        };

        match event.source {
            MessageSource::Parent => self.from_host(envelope, event.data),
            MessageSource::Frame(id) if Some(id) == self.inner_frame_id() => {
                post_logged_raw(self.inner.parent.as_ref(), &event.data, &self.inner.host_origin);
            }
            other => {
                tracing::debug!(source = ?other, "relay dropping message from unknown window");
            }
        }
    }

    fn from_host(&self, envelope: Envelope, raw: Value) {
        if let Envelope::Notification { method, params } = &envelope {
            if matches!(Method::parse(method), Some((Method::SandboxResourceReady, _))) {
                let params = params.clone().unwrap_or_else(|| json!({}));
                match serde_json::from_value::<SandboxResourceParams>(params) {
                    Ok(resource) => {
                        if let Err(err) = self.mount(resource) {
                            tracing::warn!(error = %err, "failed to mount widget frame");
                        }
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "relay ignoring malformed sandbox resource");
                    }
                }
                return;
            }
        }

        let Some(window) = self.inner_window() else {
            tracing::debug!(method = ?envelope.method(), "no widget frame yet; dropping host message");
            return;
        };
        post_logged_raw(window.as_ref(), &raw, ANY_ORIGIN);
    }

    fn mount(&self, resource: SandboxResourceParams) -> Result<FrameId, FrameError> {
        let Ok(mut slot) = self.inner.inner_frame.lock() else {
            return Err(FrameError::Create("relay frame lock poisoned".to_string()));
        };
        if let Some(previous) = slot.take() {
            tracing::debug!(frame = %previous.id(), "removing previous widget frame");
            previous.remove();
        }

        let spec = FrameSpec {
            src: None,
            sandbox: resource
                .sandbox
                .unwrap_or_else(|| DEFAULT_WIDGET_SANDBOX_FLAGS.to_string()),
            allow: resource.permissions,
        };
        let frame = self.inner.document.create_frame(&spec)?;
        let strategy = select_mount(frame.as_ref());
        let mounted = strategy.mount(frame.as_ref(), &resource.html).or_else(|err| {
            tracing::debug!(strategy = strategy.name(), error = %err, "falling back to srcdoc");
            SrcdocMount.mount(frame.as_ref(), &resource.html)
        });
        if let Err(err) = mounted {
            frame.remove();
            return Err(err);
        }

        let id = frame.id();
        tracing::info!(frame = %id, strategy = strategy.name(), sandbox = %spec.sandbox, "widget frame mounted");
        *slot = Some(frame);
        Ok(id)
    }

    fn inner_window(&self) -> Option<Arc<dyn MessageTarget>> {
        let guard = self.inner.inner_frame.lock().ok()?;
        guard.as_ref().map(|frame| frame.window())
    }
}

fn post_logged_raw(target: &dyn MessageTarget, message: &Value, target_origin: &str) {
    if let Err(err) = target.post_message(message, target_origin) {
        tracing::warn!(target_origin = target_origin, error = %err, "relay forward failed");
    }
}
