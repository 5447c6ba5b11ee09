use std::fmt;

use crate::{errors::Error, Result};

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram forum topic / message thread id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThreadId(pub i32);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Where an uploaded document is delivered.
///
/// Produced once by destination resolution and passed by value afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Destination {
    pub chat_id: ChatId,
    pub thread_id: Option<ThreadId>,
}

impl Destination {
    pub fn new(chat_id: ChatId, thread_id: Option<ThreadId>) -> Self {
        Self { chat_id, thread_id }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.thread_id {
            Some(t) => write!(f, "chat {} / topic {}", self.chat_id.0, t.0),
            None => write!(f, "chat {}", self.chat_id.0),
        }
    }
}

/// Which remote server a log file is fetched from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceName {
    ApiGateway,
    TelegramBot,
}

impl ServiceName {
    pub const SUPPORTED: &'static str = "api-gateway, telegram-bot";

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "api-gateway" => Ok(ServiceName::ApiGateway),
            "telegram-bot" => Ok(ServiceName::TelegramBot),
            other => Err(Error::Config(format!(
                "Unknown service: {other}. Supported services: {}",
                Self::SUPPORTED
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::ApiGateway => "api-gateway",
            ServiceName::TelegramBot => "telegram-bot",
        }
    }

    /// Environment prefix of this service's server quartet.
    pub fn env_prefix(self) -> &'static str {
        match self {
            ServiceName::ApiGateway => "API_GATEWAY_SERVER",
            ServiceName::TelegramBot => "TELEGRAM_BOT_SERVER",
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw (possibly incomplete) server quartet as read from configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerParts {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
}

/// SSH connection parameters of one remote server.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
}

// Keep the password out of logs and panics.
impl fmt::Debug for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerDescriptor")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl ServerDescriptor {
    /// Validate that all four fields are present, naming every missing one.
    pub fn from_parts(service: ServiceName, parts: &ServerParts) -> Result<Self> {
        let fields = [
            ("user", &parts.user),
            ("password", &parts.password),
            ("host", &parts.host),
            ("port", &parts.port),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.as_deref().map_or(true, |s| s.is_empty()))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing server configuration for {service}: {}",
                missing.join(", ")
            )));
        }

        let take = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(Self {
            user: take(&parts.user),
            password: take(&parts.password),
            host: take(&parts.host),
            port: take(&parts.port),
        })
    }
}

/// Convert a string to a number the way a JavaScript `Number(value)` call does.
///
/// Whitespace is trimmed, the empty string is `0`, `0x`/`0o`/`0b` prefixes are
/// honoured and anything unparsable is `NaN`.
pub fn js_number(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }

    let radix = match s.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&s[2..], radix)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust also accepts "inf"/"nan" spellings that JS rejects.
    if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// A configured identifier is valid iff it is present and converts to a finite,
/// non-zero number.
pub fn numeric_id(raw: Option<&str>) -> Option<f64> {
    let n = js_number(raw?);
    (n.is_finite() && n != 0.0).then_some(n)
}

/// True when both the chat and topic identifiers are usable as-is.
pub fn has_valid_ids(chat_id: Option<&str>, topic_id: Option<&str>) -> bool {
    numeric_id(chat_id).is_some() && numeric_id(topic_id).is_some()
}

/// Destination taken straight from configuration, when both ids are valid.
///
/// Fractional ids are truncated toward zero. An id that truncates to `0` or
/// does not fit the Telegram id width is treated as not configured.
pub fn configured_destination(chat_id: Option<&str>, topic_id: Option<&str>) -> Option<Destination> {
    if !has_valid_ids(chat_id, topic_id) {
        return None;
    }
    let (chat_raw, topic_raw) = (chat_id?, topic_id?);
    let chat = whole_id(chat_raw, js_number(chat_raw))?;
    let topic = whole_id(topic_raw, js_number(topic_raw))?;
    let Ok(topic) = i32::try_from(topic) else {
        tracing::warn!(topic_id = topic_raw, "topic id out of range, ignoring configured destination");
        return None;
    };
    Some(Destination::new(ChatId(chat), Some(ThreadId(topic))))
}

fn whole_id(raw: &str, n: f64) -> Option<i64> {
    let t = n.trunc();
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if t == 0.0 || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        tracing::warn!(id = raw, "id is not a usable whole number, ignoring configured destination");
        return None;
    }
    Some(t as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_validity_table() {
        let cases = [
            (Some("123"), Some("0"), false),
            (Some(""), Some("5"), false),
            (Some("abc"), Some("5"), false),
            (Some("-7"), Some("5"), true),
            (None, Some("5"), false),
            (Some("5"), None, false),
        ];
        for (chat, topic, valid) in cases {
            assert_eq!(has_valid_ids(chat, topic), valid, "{chat:?}/{topic:?}");
            assert_eq!(
                configured_destination(chat, topic).is_some(),
                valid,
                "{chat:?}/{topic:?}"
            );
        }
    }

    #[test]
    fn ids_that_do_not_truncate_to_usable_values_fall_back() {
        assert!(configured_destination(Some("0.5"), Some("7")).is_none());
        assert!(configured_destination(Some("100"), Some("3000000000")).is_none());
        assert!(configured_destination(Some("1e300"), Some("7")).is_none());

        let d = configured_destination(Some("-1001234.9"), Some("7.2")).unwrap();
        assert_eq!(d.chat_id, ChatId(-1001234));
        assert_eq!(d.thread_id, Some(ThreadId(7)));
    }

    #[test]
    fn js_number_edge_cases() {
        assert_eq!(js_number("  42 "), 42.0);
        assert_eq!(js_number(""), 0.0);
        assert_eq!(js_number("0x10"), 16.0);
        assert_eq!(js_number("1e3"), 1000.0);
        assert!(js_number("Infinity").is_infinite());
        assert!(js_number("inf").is_nan());
        assert!(js_number("12abc").is_nan());
        assert!(numeric_id(Some("Infinity")).is_none());
        assert!(numeric_id(Some("-0")).is_none());
    }

    #[test]
    fn configured_destination_uses_both_ids() {
        let d = configured_destination(Some("-1001234"), Some("7")).unwrap();
        assert_eq!(d.chat_id, ChatId(-1001234));
        assert_eq!(d.thread_id, Some(ThreadId(7)));
        assert!(configured_destination(Some("100"), Some("")).is_none());
    }

    #[test]
    fn service_name_parsing() {
        assert_eq!(ServiceName::parse("api-gateway").unwrap(), ServiceName::ApiGateway);
        assert_eq!(ServiceName::parse("telegram-bot").unwrap().env_prefix(), "TELEGRAM_BOT_SERVER");
        let err = ServiceName::parse("db").unwrap_err().to_string();
        assert!(err.contains("Unknown service: db"));
    }

    #[test]
    fn server_descriptor_names_all_missing_fields() {
        let parts = ServerParts {
            user: Some("deploy".to_string()),
            password: Some(String::new()),
            host: Some("10.0.0.1".to_string()),
            port: None,
        };
        let err = ServerDescriptor::from_parts(ServiceName::ApiGateway, &parts)
            .unwrap_err()
            .to_string();
        assert!(err.contains("Missing server configuration for api-gateway: password, port"));
    }

    #[test]
    fn server_descriptor_debug_redacts_password() {
        let parts = ServerParts {
            user: Some("u".to_string()),
            password: Some("hunter2".to_string()),
            host: Some("h".to_string()),
            port: Some("22".to_string()),
        };
        let s = ServerDescriptor::from_parts(ServiceName::TelegramBot, &parts).unwrap();
        assert!(!format!("{s:?}").contains("hunter2"));
    }
}
