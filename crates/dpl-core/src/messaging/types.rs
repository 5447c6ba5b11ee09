use std::time::Duration;

use crate::domain::{ChatId, ThreadId};

/// Incoming chat message delivered by long-polling.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Monotonic update id used as the polling offset.
    pub update_id: i64,
    pub chat_id: ChatId,
    pub thread_id: Option<ThreadId>,
    pub username: Option<String>,
    pub text: Option<String>,
}

/// Outbound document upload.
#[derive(Clone, Debug)]
pub struct DocumentUpload<'a> {
    pub path: &'a std::path::Path,
    pub file_name: &'a str,
    /// MarkdownV2 caption (already escaped).
    pub caption: &'a str,
}

#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
    /// Server-side long-poll timeout per request.
    pub long_poll: Duration,
    /// Pause after a failed poll before trying again.
    pub error_backoff: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            long_poll: Duration::from_secs(10),
            error_backoff: Duration::from_secs(3),
        }
    }
}
