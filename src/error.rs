use serenity::all::Permissions;
use std::time::Duration;
use thiserror::Error;

/// Fatal configuration problems, raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set in the environment or .env file")]
    Missing(&'static str),
}

/// Failures that stop the session from starting or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid token, check DISCORD_TOKEN")]
    Auth,
    #[error("could not enumerate modules in {path}: {source}")]
    Modules {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("gateway error: {0}")]
    Gateway(#[from] serenity::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command `{0}` is already registered")]
    DuplicateCommand(String),
    #[error("command `{0}` is not registered")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ModuleLoadError {
    #[error("no compiled-in module named `{0}`")]
    UnknownModule(String),
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest: {0}")]
    Manifest(#[from] toml::de::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Setup(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote catalog rejected the command set: {0}")]
    Remote(String),
}

/// Every way an invocation can end without the handler completing normally.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("command `{0}` not found")]
    CommandNotFound(String),
    #[error("cooldown active, retry after {retry_after:?}")]
    CooldownActive { retry_after: Duration },
    #[error("command used outside of a server")]
    GuildOnly,
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("caller is missing permissions: {0:?}")]
    MissingCallerPermission(Permissions),
    #[error("bot is missing permissions: {0:?}")]
    MissingServicePermission(Permissions),
    #[error("handler failed: {0}")]
    HandlerFailure(String),
}

impl DispatchError {
    /// Short message shown to the invoking user. Never carries internal detail.
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::CommandNotFound(_) => "❌ That command is not available.".to_string(),
            DispatchError::CooldownActive { retry_after } => {
                // Round up so "0s" is never shown while still blocked.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                format!(
                    "⏳ This command is on cooldown. Try again in {}.",
                    humantime::format_duration(Duration::from_secs(secs.max(1)))
                )
            }
            DispatchError::GuildOnly => "❌ This command can only be used in a server.".to_string(),
            DispatchError::InvalidArguments(detail) => format!("❌ {}", detail),
            DispatchError::MissingCallerPermission(perms) => format!(
                "❌ You need the following permission(s) to use this command: {}",
                perms.get_permission_names().join(", ")
            ),
            DispatchError::MissingServicePermission(perms) => format!(
                "❌ I need the following permission(s) to run this command: {}",
                perms.get_permission_names().join(", ")
            ),
            DispatchError::HandlerFailure(_) => {
                "❌ Something went wrong while running this command. Please try again later."
                    .to_string()
            }
        }
    }
}
