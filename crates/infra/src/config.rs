//! Process configuration resolved from environment variables.
//!
//! | variable               | default       |
//! |------------------------|---------------|
//! | `APP_ENV`              | `development` |
//! | `LOG_LEVEL`            | `debug`       |
//! | `REMINDER_DAYS_BEFORE` | `3`           |
//! | `SEND_WINDOW_START`    | `08:00`       |
//! | `SEND_WINDOW_END`      | `18:00`       |

use std::env;
use std::path::Path;

use thiserror::Error;

use payremind_core::ValidationError;
use payremind_observability::{LogFormat, LogSettings};
use payremind_reminders::{
    DEFAULT_DAYS_BEFORE_REMINDER, ReminderSettings, SendWindow, validate_reminder_days,
};

const DEFAULT_LOG_LEVEL: &str = "debug";
const DEFAULT_WINDOW_START: &str = "08:00";
const DEFAULT_WINDOW_END: &str = "18:00";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Canonical name used for logging labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub environment: Environment,
    pub log_level: String,
    /// Lead time applied to configurations created from this process.
    pub days_before_reminder: u32,
    pub send_window: SendWindow,
}

impl AppConfig {
    /// Load a `.env` file at `path` if it exists, then read the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            dotenvy::from_path(path)?;
        }
        Self::from_env()
    }

    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match var("APP_ENV") {
            Some(value) => Environment::parse(value.trim())?,
            None => Environment::Development,
        };
        let log_level = var("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let days_before_reminder = match var("REMINDER_DAYS_BEFORE") {
            Some(raw) => {
                let days: i64 = raw.trim().parse().map_err(|_| ConfigError::NotANumber {
                    key: "REMINDER_DAYS_BEFORE",
                    value: raw.clone(),
                })?;
                validate_reminder_days(days)?
            }
            None => DEFAULT_DAYS_BEFORE_REMINDER,
        };

        let start = var("SEND_WINDOW_START").unwrap_or_else(|| DEFAULT_WINDOW_START.to_string());
        let end = var("SEND_WINDOW_END").unwrap_or_else(|| DEFAULT_WINDOW_END.to_string());
        let send_window = SendWindow::parse(start.trim(), end.trim())?;

        Ok(Self {
            environment,
            log_level,
            days_before_reminder,
            send_window,
        })
    }

    /// JSON logs in production, pretty text elsewhere.
    pub fn log_settings(&self) -> LogSettings {
        let format = if self.environment.is_production() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };
        LogSettings::new(self.log_level.clone(), format)
    }

    /// Settings for a newly created owner configuration.
    pub fn reminder_settings(&self) -> ReminderSettings {
        ReminderSettings {
            days_before_reminder: self.days_before_reminder,
            send_window: self.send_window,
            ..ReminderSettings::default()
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_ENV must be one of 'development', 'production', or 'test' (got {0})")]
    InvalidEnvironment(String),

    #[error("{key} must be a whole number (got {value:?})")]
    NotANumber { key: &'static str, value: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("failed to read .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}
