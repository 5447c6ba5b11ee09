//! Formatting utilities (Telegram MarkdownV2 escaping, document captions).

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::ServiceName;

/// Characters reserved by Telegram MarkdownV2.
pub const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape text for Telegram MarkdownV2 parse mode.
///
/// Every reserved character gets exactly one backslash in front of it; all
/// other characters pass through untouched.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Caption attached to an uploaded log document (MarkdownV2).
pub fn logs_caption(
    service: ServiceName,
    downloaded_at: DateTime<Utc>,
    host: &str,
    file_name: &str,
) -> String {
    let title = format!("{} LOGS", service.as_str().to_uppercase());
    let ts = downloaded_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!(
        "🔧 *{}*\n📅 Downloaded: {}\n🖥️ Server: {}\n📦 File: {}",
        escape_markdown_v2(&title),
        escape_markdown_v2(&ts),
        escape_markdown_v2(host),
        escape_markdown_v2(file_name),
    )
}

/// Cut `s` down to `max_len` characters, marking the cut with `...`.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
