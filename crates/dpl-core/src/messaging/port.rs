use std::time::Duration;

use async_trait::async_trait;

use crate::{
    domain::{Destination, MessageRef},
    messaging::types::{DocumentUpload, IncomingMessage},
    Result,
};

/// Messenger port used by the log uploader.
///
/// Every call is attempted once from the caller's point of view; adapters may
/// honour server-mandated flood waits internally.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Plain-text message to a destination (thread id only when present).
    async fn send_text(&self, dest: Destination, text: &str) -> Result<MessageRef>;

    /// Upload a local file as a document with a MarkdownV2 caption.
    async fn send_document(&self, dest: Destination, doc: DocumentUpload<'_>) -> Result<MessageRef>;

    /// Long-poll for new messages with `update_id >= offset`.
    ///
    /// Passing an offset confirms every earlier update with the server.
    async fn poll_messages(&self, offset: i64, timeout: Duration) -> Result<Vec<IncomingMessage>>;
}
