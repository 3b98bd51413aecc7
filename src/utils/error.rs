use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Roster data error: {message}")]
    DataError { message: String },

    #[error("Scheduler error: {message}")]
    SchedulerError { message: String },
}

pub type Result<T> = std::result::Result<T, NotifierError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Data,
    Delivery,
    Scheduling,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl NotifierError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::DataError {
            message: message.into(),
        }
    }

    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::SchedulerError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::DataError { .. } | Self::CsvError(_) | Self::SerializationError(_) => {
                ErrorCategory::Data
            }
            Self::HttpError(_) => ErrorCategory::Delivery,
            Self::SchedulerError { .. } => ErrorCategory::Scheduling,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Delivery => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Scheduling | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ConfigError { .. } | Self::MissingConfigError { .. } => {
                "Set BOT_TOKEN and AUTHORIZED_USER_IDS in .env or fill in notifier.toml"
            }
            Self::InvalidConfigValueError { .. } | Self::ConfigValidationError { .. } => {
                "Fix the reported field in the configuration file and restart"
            }
            Self::DataError { .. } | Self::SerializationError(_) => {
                "Check that the roster file is a JSON array of {name, birthday} objects"
            }
            Self::CsvError(_) => "Check the CSV header row and column names passed to import",
            Self::HttpError(_) => "Check network connectivity and the bot token",
            Self::SchedulerError { .. } => "Use HH:MM for schedule.time and ±HH:MM for schedule.utc_offset",
            Self::IoError(_) => "Check file permissions and that the paths exist",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Data => format!("Could not read birthday data: {}", self),
            ErrorCategory::Delivery => format!("Could not reach the messaging service: {}", self),
            ErrorCategory::Scheduling => format!("Daily notifications are disabled: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}
