//! Capability interface over the remote vision/chat service.
//!
//! The pipeline holds an `Arc<dyn VisionService>`; tests swap in scripted
//! doubles. `async_trait` keeps the session trait object-safe.

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::models::{Credential, FileReference, ImagePayload, RawResponse};
use crate::session::ExtractionSession;

/// Display name given to every uploaded image.
pub const UPLOAD_DISPLAY_NAME: &str = "image.png";

pub trait VisionService: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &str;

    /// Open a client session authenticated with `credential`.
    ///
    /// The session lives for one pipeline invocation and is released on drop.
    fn connect(&self, credential: &Credential) -> PipelineResult<Box<dyn VisionSession>>;
}

#[async_trait]
pub trait VisionSession: Send + Sync {
    /// Store the image remotely and return a reference to it.
    async fn upload(&self, payload: &ImagePayload) -> PipelineResult<FileReference>;

    /// Send the session's instruction and return the first candidate's parts.
    async fn send_instruction(&self, session: &ExtractionSession) -> PipelineResult<RawResponse>;
}
