use crate::core::composer::TextFormat;
use crate::core::schedule::parse_utc_offset;
use crate::domain::model::RecipientId;
use crate::utils::error::{NotifierError, Result};
use crate::utils::validation::{self, Validate};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub recipients: RecipientsConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub greetings: GreetingsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Telegram parse mode; an empty string sends plain text.
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientsConfig {
    #[serde(default)]
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default = "default_roster_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time, `HH:MM`.
    #[serde(default = "default_notify_time")]
    pub time: String,
    /// Offset of the local zone from UTC, `+HH:MM` or `-HH:MM`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetingsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub personal: Option<Vec<String>>,
    pub collective: Option<Vec<String>>,
    pub closing: Option<Vec<String>>,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_parse_mode() -> String {
    "HTML".to_string()
}

fn default_send_timeout() -> u64 {
    10
}

fn default_roster_path() -> String {
    "data/birthdays.json".to_string()
}

fn default_notify_time() -> String {
    "09:00".to_string()
}

fn default_utc_offset() -> String {
    "+03:00".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_api_base(),
            parse_mode: default_parse_mode(),
            send_timeout_seconds: default_send_timeout(),
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            path: default_roster_path(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: default_notify_time(),
            utc_offset: default_utc_offset(),
        }
    }
}

impl Default for GreetingsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            personal: None,
            collective: None,
            closing: None,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(NotifierError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| NotifierError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left in place.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| NotifierError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Builds the configuration from `BOT_TOKEN`, `AUTHORIZED_USER_IDS`,
    /// `AUTHORIZED_USER_ID`, `DATA_FILE`, `NOTIFY_TIME`, `NOTIFY_UTC_OFFSET`
    /// and `TELEGRAM_API_BASE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();

        config.bot.token = lookup("BOT_TOKEN");
        if let Some(api_base) = lookup("TELEGRAM_API_BASE") {
            config.bot.api_base = api_base;
        }

        config.recipients.ids = parse_recipient_ids(
            lookup("AUTHORIZED_USER_IDS").as_deref().unwrap_or_default(),
            lookup("AUTHORIZED_USER_ID").as_deref(),
        );

        if let Some(path) = lookup("DATA_FILE") {
            config.roster.path = path;
        }
        if let Some(time) = lookup("NOTIFY_TIME") {
            config.schedule.time = time;
        }
        if let Some(offset) = lookup("NOTIFY_UTC_OFFSET") {
            config.schedule.utc_offset = offset;
        }

        config
    }

    /// Reads `path` when it exists, otherwise falls back to the environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("📁 Loading configuration from {}", path.display());
            Self::from_file(path)
        } else {
            tracing::info!(
                "📁 {} not found, reading configuration from environment",
                path.display()
            );
            Ok(Self::from_env())
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("bot.api_base", &self.bot.api_base)?;
        validation::validate_range("bot.send_timeout_seconds", self.bot.send_timeout_seconds, 1, 120)?;
        validation::validate_path("roster.path", &self.roster.path)?;
        validation::validate_non_empty_string("schedule.time", &self.schedule.time)?;
        self.text_format()?;
        self.utc_offset()?;
        Ok(())
    }

    pub fn recipients(&self) -> Vec<RecipientId> {
        self.recipients.ids.iter().copied().map(RecipientId).collect()
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.schedule.utc_offset)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.bot.send_timeout_seconds)
    }

    /// Only HTML and plain text are supported; message escaping depends on it.
    pub fn text_format(&self) -> Result<TextFormat> {
        match self.bot.parse_mode.trim() {
            "" => Ok(TextFormat::Plain),
            mode if mode.eq_ignore_ascii_case("html") => Ok(TextFormat::Html),
            other => Err(NotifierError::InvalidConfigValueError {
                field: "bot.parse_mode".to_string(),
                value: other.to_string(),
                reason: "expected \"HTML\" or an empty string for plain text".to_string(),
            }),
        }
    }

    /// Value sent as the Bot API `parse_mode`, `None` for plain text.
    pub fn parse_mode(&self) -> Result<Option<String>> {
        Ok(match self.text_format()? {
            TextFormat::Html => Some("HTML".to_string()),
            TextFormat::Plain => None,
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// Comma-separated chat ids plus the legacy single-id variable, appended
/// when not already listed. Invalid entries are skipped with a warning.
pub fn parse_recipient_ids(list: &str, legacy: Option<&str>) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::new();

    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => tracing::warn!("⚠️ Invalid user ID '{}' in AUTHORIZED_USER_IDS", entry),
        }
    }

    if let Some(single) = legacy.map(str::trim).filter(|s| !s.is_empty()) {
        match single.parse::<i64>() {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(_) => tracing::warn!("⚠️ Invalid user ID '{}' in AUTHORIZED_USER_ID", single),
        }
    }

    ids
}
