use crate::error::ConfigError;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    /// `tracing` has no level above error, so CRITICAL shares it.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    /// 0 means commands are synced globally
    pub guild_id: u64,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub modules_dir: Option<PathBuf>,
    pub owner_name: String,
    pub status_message: Option<String>,
    /// Settings that were present but unusable, as (variable, value). Logged once logging is up.
    pub rejected: Vec<(&'static str, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> Result<Self, ConfigError> {
        let discord_token = env::var("DISCORD_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let mut rejected = Vec::new();

        let guild_id = match env::var("GUILD_ID") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                rejected.push(("GUILD_ID", raw));
                0
            }),
            Err(_) => 0,
        };

        let log_level = match env::var("LOG_LEVEL") {
            Ok(raw) => LogLevel::parse(raw.trim()).unwrap_or_else(|| {
                rejected.push(("LOG_LEVEL", raw));
                LogLevel::Info
            }),
            Err(_) => LogLevel::Info,
        };

        let log_file = match env::var("LOG_FILE") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => Some(PathBuf::from("discord.log")),
        };

        Ok(Config {
            discord_token,
            guild_id,
            log_level,
            log_file,
            modules_dir: env::var("MODULES_DIR").ok().map(PathBuf::from),
            owner_name: env::var("OWNER_NAME").unwrap_or_else(|_| "unknown".to_string()),
            status_message: env::var("STATUS_MESSAGE").ok().filter(|s| !s.is_empty()),
            rejected,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("guild_id", &self.guild_id)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .field("modules_dir", &self.modules_dir)
            .field("owner_name", &self.owner_name)
            .field("status_message", &self.status_message)
            .finish()
    }
}
