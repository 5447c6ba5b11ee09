use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{configured_destination, Destination, ServerParts, ServiceName},
    errors::Error,
    Result,
};

/// Keys pushed as GitHub Actions secrets, in the order they are set.
pub const REQUIRED_SECRETS: [&str; 12] = [
    "API_GATEWAY_SERVER_USER",
    "API_GATEWAY_SERVER_PASSWORD",
    "API_GATEWAY_SERVER_HOST",
    "API_GATEWAY_SERVER_PORT",
    "API_GATEWAY_SERVER_ROOT_PATH",
    "API_GATEWAY_SERVER_DOCKER_COMPOSE_PATH",
    "TELEGRAM_BOT_SERVER_USER",
    "TELEGRAM_BOT_SERVER_PASSWORD",
    "TELEGRAM_BOT_SERVER_HOST",
    "TELEGRAM_BOT_SERVER_PORT",
    "TELEGRAM_BOT_SERVER_ROOT_PATH",
    "TELEGRAM_BOT_SERVER_DOCKER_COMPOSE_PATH",
];

pub const BOT_TOKEN_KEY: &str = "SYSTEM_TELEGRAM_BOT_TOKEN";
pub const SERVICE_NAME_KEY: &str = "LOGS_SERVICE_NAME";
pub const FILE_PATH_KEY: &str = "LOGS_FILE_PATH";
pub const CHAT_ID_KEY: &str = "DEEP_ASSISTANT_HEADQUATERS_TELEGRAM_CHAT_ID";
pub const TOPIC_ID_KEY: &str = "DEEP_ASSISTANT_HEADQUATERS_TELEGRAM_LOGS_TOPIC_ID";

/// Keys the log uploader cannot start without.
pub const UPLOADER_REQUIRED: [&str; 3] = [BOT_TOKEN_KEY, SERVICE_NAME_KEY, FILE_PATH_KEY];

const DEFAULT_LISTEN_TIMEOUT_SECS: u64 = 600;

/// Load `.env` from the working directory if there is one.
///
/// Already-set environment variables win over file values. Returns whether a
/// file was loaded.
pub fn load_dotenv_if_present(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    dotenvy::from_path(path)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(true)
}

/// Process-environment lookup.
pub fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Fetch every key in order, or fail naming all keys that are absent or empty.
pub fn collect_required<F>(keys: &[&str], lookup: F) -> Result<Vec<(String, String)>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut values = Vec::with_capacity(keys.len());
    let mut missing = Vec::new();
    for key in keys {
        match lookup(key).and_then(non_empty) {
            Some(v) => values.push((key.to_string(), v)),
            None => missing.push(key.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(Error::MissingConfig(missing));
    }
    Ok(values)
}

/// Typed configuration of the secrets configurator.
#[derive(Clone)]
pub struct SecretsConfig {
    /// `(name, value)` pairs in `REQUIRED_SECRETS` order.
    pub secrets: Vec<(String, String)>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.secrets.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("SecretsConfig").field("secrets", &names).finish()
    }
}

impl SecretsConfig {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            secrets: collect_required(&REQUIRED_SECRETS, lookup)?,
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.secrets.iter().map(|(k, _)| k.clone()).collect()
    }
}

/// Typed configuration of the log uploader.
#[derive(Clone)]
pub struct UploaderConfig {
    pub bot_token: String,
    pub service: ServiceName,
    pub log_file_path: String,

    // Raw ids; validity is decided by `configured_destination`.
    pub chat_id: Option<String>,
    pub topic_id: Option<String>,

    pub server: ServerParts,

    /// `None` waits for the `/logs` command indefinitely.
    pub listen_timeout: Option<Duration>,
    pub delete_remote: bool,
    pub temp_dir: PathBuf,
    pub strict_host_key_checking: bool,
}

impl std::fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("service", &self.service)
            .field("log_file_path", &self.log_file_path)
            .field("chat_id", &self.chat_id)
            .field("topic_id", &self.topic_id)
            .field("host", &self.server.host)
            .field("listen_timeout", &self.listen_timeout)
            .field("delete_remote", &self.delete_remote)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl UploaderConfig {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = collect_required(&UPLOADER_REQUIRED, &lookup)?;
        let value = |key: &str| {
            required
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };

        let bot_token = value(BOT_TOKEN_KEY);
        let service = ServiceName::parse(&value(SERVICE_NAME_KEY))?;
        let log_file_path = value(FILE_PATH_KEY);

        let prefix = service.env_prefix();
        let part = |field: &str| lookup(&format!("{prefix}_{field}")).and_then(non_empty);
        let server = ServerParts {
            user: part("USER"),
            password: part("PASSWORD"),
            host: part("HOST"),
            port: part("PORT"),
        };

        let listen_timeout = match lookup("LOGS_LISTEN_TIMEOUT_SECS").and_then(non_empty) {
            None => Some(Duration::from_secs(DEFAULT_LISTEN_TIMEOUT_SECS)),
            Some(raw) => {
                let secs = parse_u64(&raw).ok_or_else(|| {
                    Error::Config(format!(
                        "LOGS_LISTEN_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
        };

        let delete_remote = lookup("LOGS_DELETE_REMOTE")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);
        let strict_host_key_checking = lookup("SSH_STRICT_HOST_KEY_CHECKING")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);
        let temp_dir = lookup("LOGS_TEMP_DIR")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        Ok(Self {
            bot_token,
            service,
            log_file_path,
            chat_id: lookup(CHAT_ID_KEY),
            topic_id: lookup(TOPIC_ID_KEY),
            server,
            listen_timeout,
            delete_remote,
            temp_dir,
            strict_host_key_checking,
        })
    }

    /// Destination from configuration, when both ids are valid.
    pub fn configured_destination(&self) -> Option<Destination> {
        configured_destination(self.chat_id.as_deref(), self.topic_id.as_deref())
    }

    /// Base name of the remote log file.
    pub fn log_file_name(&self) -> String {
        Path::new(&self.log_file_path)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.log_file_path.clone())
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_u64(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
