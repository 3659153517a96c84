//! Frame creation and the "mount HTML into a frame" capability.

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::transport::{FrameId, MessageTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    pub src: Option<Url>,
    /// Applied verbatim as the `sandbox` attribute.
    pub sandbox: String,
    /// Permissions policy applied as the `allow` attribute.
    pub allow: Option<String>,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to create frame: {0}")]
    Create(String),
    #[error("frame document of {0} is not writable")]
    NotWritable(FrameId),
    #[error("{0} was removed")]
    Removed(FrameId),
}

/// An attached iframe element.
pub trait FrameHandle: Send + Sync {
    fn id(&self) -> FrameId;
    fn window(&self) -> Arc<dyn MessageTarget>;
    /// Whether the frame's document can be opened and written directly.
    fn supports_document_write(&self) -> bool;
    fn write_document(&self, html: &str) -> Result<(), FrameError>;
    fn set_srcdoc(&self, html: &str) -> Result<(), FrameError>;
    fn remove(&self);
}

/// The document frames are created in and attached to.
pub trait FrameDocument: Send + Sync + 'static {
    fn create_frame(&self, spec: &FrameSpec) -> Result<Box<dyn FrameHandle>, FrameError>;
}

pub trait HtmlMount: Send + Sync {
    fn name(&self) -> &'static str;
    fn mount(&self, frame: &dyn FrameHandle, html: &str) -> Result<(), FrameError>;
}

/// Writes the document directly, so widget scripts run before the frame's
/// load event.
pub struct DocumentWriteMount;

impl HtmlMount for DocumentWriteMount {
    fn name(&self) -> &'static str {
        "document-write"
    }

    fn mount(&self, frame: &dyn FrameHandle, html: &str) -> Result<(), FrameError> {
        frame.write_document(html)
    }
}

pub struct SrcdocMount;

impl HtmlMount for SrcdocMount {
    fn name(&self) -> &'static str {
        "srcdoc"
    }

    fn mount(&self, frame: &dyn FrameHandle, html: &str) -> Result<(), FrameError> {
        frame.set_srcdoc(html)
    }
}

/// Picks the mount strategy for a frame by probing it once.
pub fn select_mount(frame: &dyn FrameHandle) -> &'static dyn HtmlMount {
    if frame.supports_document_write() {
        &DocumentWriteMount
    } else {
        &SrcdocMount
    }
}
