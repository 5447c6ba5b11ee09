//! Destination auto-detection: wait for the first `/logs` command in any chat.

use std::{sync::OnceLock, time::Duration};

use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::Destination,
    errors::Error,
    formatting::truncate_text,
    messaging::{
        port::MessagingPort,
        types::{IncomingMessage, PollSettings},
    },
    Result,
};

/// Command that makes the uploader pick a chat/topic as its destination.
pub fn logs_command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/logs").expect("valid regex"))
}

/// A message that resolved the destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedCommand {
    pub destination: Destination,
    pub username: Option<String>,
}

/// Long-poll until a message matching `pattern` arrives, then stop.
///
/// Non-matching messages are printed for operator visibility. Exactly one
/// matching message is consumed; its update is confirmed with the server
/// before returning. `timeout = None` waits indefinitely.
pub async fn wait_for_command(
    messenger: &dyn MessagingPort,
    pattern: &Regex,
    timeout: Option<Duration>,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<DetectedCommand> {
    let receive = receive_loop(messenger, pattern, settings);

    let result = match timeout {
        Some(limit) => tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            r = tokio::time::timeout(limit, receive) => r.unwrap_or(Err(Error::ListenTimeout(limit))),
        },
        None => tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            r = receive => r,
        },
    };

    let (detected, next_offset) = result?;

    // Confirm the consumed update so the next run does not see it again.
    if let Err(e) = messenger.poll_messages(next_offset, Duration::ZERO).await {
        tracing::debug!(error = %e, "failed to confirm consumed update");
    }

    Ok(detected)
}

async fn receive_loop(
    messenger: &dyn MessagingPort,
    pattern: &Regex,
    settings: PollSettings,
) -> Result<(DetectedCommand, i64)> {
    let mut offset = 0i64;
    loop {
        let batch = match messenger.poll_messages(offset, settings.long_poll).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "polling error");
                tokio::time::sleep(settings.error_backoff).await;
                continue;
            }
        };

        for msg in batch {
            offset = offset.max(msg.update_id + 1);
            if let Some(detected) = match_command(&msg, pattern) {
                println!(
                    "📨 /logs command received from {} in {}",
                    detected.username.as_deref().unwrap_or("unknown user"),
                    detected.destination
                );
                return Ok((detected, msg.update_id + 1));
            }
            print_ignored(&msg);
        }
    }
}

/// Destination carried by `msg` if its text matches `pattern`.
pub fn match_command(msg: &IncomingMessage, pattern: &Regex) -> Option<DetectedCommand> {
    let text = msg.text.as_deref()?;
    if !pattern.is_match(text) {
        return None;
    }
    Some(DetectedCommand {
        destination: Destination::new(msg.chat_id, msg.thread_id),
        username: msg.username.clone(),
    })
}

fn print_ignored(msg: &IncomingMessage) {
    let who = msg.username.as_deref().unwrap_or("unknown");
    let text = msg
        .text
        .as_deref()
        .map(|t| truncate_text(t, 200))
        .unwrap_or_else(|| "<non-text message>".to_string());
    match msg.thread_id {
        Some(t) => println!("💬 chat {} topic {} from {who}: {text}", msg.chat_id.0, t.0),
        None => println!("💬 chat {} from {who}: {text}", msg.chat_id.0),
    }
}
