//! Clients for the external analysis backend: the HTTP contract
//! (transcribe/summarize/generate-script/analyze-risk/health) and the two
//! WebSocket channels (real-time analysis, audio streaming).

mod channel;
mod http;
pub mod messages;

use async_trait::async_trait;
use std::path::Path;

use crate::error::BackendError;

pub use channel::{ChannelKind, ChannelState, StreamingLink};
pub use http::BackendClient;

/// External collaborator that turns an audio file into a transcript.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, path: &Path) -> Result<String, BackendError>;
}
