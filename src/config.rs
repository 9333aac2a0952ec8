//! Build context and Telegram API credentials
//!
//! Build metadata is read from environment variables set by the CI job.
//! API credentials come from `TELEGRAM_API_ID`/`TELEGRAM_API_HASH`, an
//! optional config.yml, or the built-in application pair.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Optional config file with API credentials
pub const CONFIG_FILE: &str = "config.yml";

/// Application credentials used when nothing else is configured
pub const DEFAULT_API_ID: i32 = 611335;
pub const DEFAULT_API_HASH: &str = "d524b414d21f4d37f08684c1df41ac9c";

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "CHAT_ID";
pub const ENV_MESSAGE_THREAD_ID: &str = "MESSAGE_THREAD_ID";
pub const ENV_COMMIT_URL: &str = "COMMIT_URL";
pub const ENV_COMMIT_MESSAGE: &str = "COMMIT_MESSAGE";
pub const ENV_RUN_URL: &str = "RUN_URL";
pub const ENV_TITLE: &str = "TITLE";
pub const ENV_VERSION: &str = "VERSION";
pub const ENV_BRANCH: &str = "BRANCH";
pub const ENV_SESSION_STRING: &str = "SESSION_STRING";
pub const ENV_API_ID: &str = "TELEGRAM_API_ID";
pub const ENV_API_HASH: &str = "TELEGRAM_API_HASH";

/// Destination chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    /// Bot API style numeric id (user, -group or -100channel)
    Id(i64),
    /// Anything that is not an integer, usually a @channel handle
    Handle(String),
}

impl ChatTarget {
    /// Numeric values become ids; everything else, including integers that
    /// overflow `i64`, is kept verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => ChatTarget::Id(id),
            Err(_) => ChatTarget::Handle(raw.to_string()),
        }
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{}", id),
            ChatTarget::Handle(handle) => f.write_str(handle),
        }
    }
}

/// Everything the CI job tells us about the build. Constructed once.
#[derive(Clone)]
pub struct BuildContext {
    pub bot_token: String,
    pub chat: ChatTarget,
    pub message_thread_id: Option<i32>,
    pub commit_url: Option<String>,
    pub commit_message: Option<String>,
    pub run_url: String,
    pub title: String,
    pub version: String,
    pub branch: String,
    pub session_string: Option<String>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("bot_token", &"<redacted>")
            .field("chat", &self.chat)
            .field("message_thread_id", &self.message_thread_id)
            .field("commit_url", &self.commit_url)
            .field("commit_message", &self.commit_message)
            .field("run_url", &self.run_url)
            .field("title", &self.title)
            .field("version", &self.version)
            .field("branch", &self.branch)
            .field(
                "session_string",
                &self.session_string.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl BuildContext {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup. Variables are checked in a
    /// fixed order and the first bad one is reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = required(&lookup, ENV_BOT_TOKEN)?;
        let chat = ChatTarget::parse(&required(&lookup, ENV_CHAT_ID)?);
        let run_url = required(&lookup, ENV_RUN_URL)?;
        let title = required(&lookup, ENV_TITLE)?;
        let version = required(&lookup, ENV_VERSION)?;
        let branch = required(&lookup, ENV_BRANCH)?;

        let message_thread_id = match optional(&lookup, ENV_MESSAGE_THREAD_ID) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i32>()
                    .map_err(|_| Error::InvalidVariable(ENV_MESSAGE_THREAD_ID.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            bot_token,
            chat,
            message_thread_id,
            commit_url: optional(&lookup, ENV_COMMIT_URL),
            commit_message: optional(&lookup, ENV_COMMIT_MESSAGE),
            run_url,
            title,
            version,
            branch,
            session_string: optional(&lookup, ENV_SESSION_STRING),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| Error::InvalidVariable(key.to_string()))
}

/// Blank values count as unset.
fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramConfig {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    api_id: Option<String>,
    api_hash: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// MTProto application credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl Default for ApiCredentials {
    fn default() -> Self {
        Self {
            api_id: DEFAULT_API_ID,
            api_hash: DEFAULT_API_HASH.to_string(),
        }
    }
}

impl ApiCredentials {
    /// Load from config.yml in the working directory and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE, |key| std::env::var(key).ok())
    }

    /// Environment beats the config file, the config file beats the defaults.
    /// A missing config file is not an error.
    pub fn load_from<P, F>(path: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let yaml = match fs::read_to_string(path.as_ref()) {
            Ok(content) => {
                serde_yaml::from_str::<Option<YamlConfig>>(&content)?.unwrap_or_default()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => YamlConfig::default(),
            Err(e) => return Err(Error::ConfigFile(e.to_string())),
        };
        let telegram = yaml.telegram.unwrap_or_default();

        let defaults = Self::default();

        let api_id = match resolve_env_string(telegram.api_id, ENV_API_ID, &lookup) {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .map_err(|_| Error::InvalidVariable(ENV_API_ID.to_string()))?,
            None => defaults.api_id,
        };
        let api_hash = resolve_env_string(telegram.api_hash, ENV_API_HASH, &lookup)
            .unwrap_or(defaults.api_hash);

        Ok(Self { api_id, api_hash })
    }
}

/// Resolve a value: explicit env var first, then the file value with
/// `${VAR}` placeholders expanded. Unresolved placeholders count as unset.
fn resolve_env_string<F>(value: Option<String>, env_key: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(env_val) = optional(lookup, env_key) {
        return Some(env_val);
    }
    let value = value.filter(|v| !v.trim().is_empty())?;
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        return optional(lookup, var_name);
    }
    Some(value)
}
