//! Host-side bridge for sandboxed widgets.
//!
//! A widget runs two frames deep. The host page creates an outer frame on a
//! separate sandbox origin running the [`SandboxRelay`]; the relay creates
//! the inner widget frame and forwards messages both ways. The
//! [`HostBridge`] drives the JSON-RPC session with the widget, and
//! [`WidgetSession`] is the widget's end of it.
//!
//! Browser primitives are behind the [`MessageTarget`] and [`FrameDocument`]
//! traits. [`testing`] provides in-memory implementations.

pub mod callbacks;
pub mod config;
pub mod correlation;
pub mod frame;
pub mod hooks;
pub mod host;
pub mod legacy;
pub mod origin;
pub mod relay;
pub mod testing;
pub mod transport;
pub mod widget_state;

pub use callbacks::{BridgeCallbacks, ToolCallFuture, ToolExecutor, UiEvent, UiEventSink, WindowOpener};
pub use config::{BridgeConfig, RelayConfig};
pub use correlation::{PendingRequests, PendingResponse};
pub use frame::{FrameDocument, FrameError, FrameHandle, FrameSpec, HtmlMount};
pub use hooks::{WidgetGlobals, WidgetSession};
pub use host::{BridgePhase, HostBridge, SessionSnapshot, WidgetDocument};
pub use legacy::{inject_legacy_bridge, LegacySnapshot};
pub use origin::OriginPolicy;
pub use relay::SandboxRelay;
pub use transport::{FrameId, MessageEvent, MessageSource, MessageTarget, TransportError};
pub use widget_bridge_protocol as protocol;
pub use widget_state::WidgetStateStore;
