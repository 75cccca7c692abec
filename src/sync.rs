//! Pushes the local command registry to Discord's application command catalog.
//!
//! Scoped sync publishes the whole registry to one guild and leaves the
//! global catalog untouched. Both modes are a single bulk overwrite, so
//! repeating a sync with the same registry converges on the same state.

use crate::command::CommandDescriptor;
use crate::error::SyncError;
use crate::registry::CommandRegistry;
use async_trait::async_trait;
use serenity::all::{Command, CreateCommand, CreateCommandOption, GuildId, Http};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Global,
    Scoped(GuildId),
}

impl SyncMode {
    /// Zero means global.
    pub fn from_guild_id(id: u64) -> Self {
        if id == 0 {
            SyncMode::Global
        } else {
            SyncMode::Scoped(GuildId::new(id))
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Global => write!(f, "globally"),
            SyncMode::Scoped(guild) => write!(f, "to guild: {}", guild),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncResult {
    pub mode: SyncMode,
    pub count: usize,
}

/// Remote command catalog
#[async_trait]
pub trait CommandCatalog: Send + Sync {
    /// Replaces every command in `mode`'s scope. Returns how many the remote accepted.
    async fn replace_all(&self, commands: Vec<CreateCommand>, mode: SyncMode) -> Result<usize, SyncError>;
}

pub struct SerenityCatalog {
    http: Arc<Http>,
}

impl SerenityCatalog {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CommandCatalog for SerenityCatalog {
    async fn replace_all(&self, commands: Vec<CreateCommand>, mode: SyncMode) -> Result<usize, SyncError> {
        let accepted = match mode {
            SyncMode::Global => Command::set_global_commands(&self.http, commands).await,
            SyncMode::Scoped(guild) => guild.set_commands(&self.http, commands).await,
        }
        .map_err(|e| SyncError::Remote(e.to_string()))?;
        Ok(accepted.len())
    }
}

pub fn to_create_command(descriptor: &CommandDescriptor) -> CreateCommand {
    let mut command = CreateCommand::new(&descriptor.name)
        .description(&descriptor.description)
        .dm_permission(!descriptor.guild_only);
    if let Some(permissions) = descriptor.required_permissions {
        command = command.default_member_permissions(permissions);
    }
    for parameter in &descriptor.parameters {
        command = command.add_option(
            CreateCommandOption::new(
                parameter.kind.option_type(),
                &parameter.name,
                &parameter.description,
            )
            .required(parameter.required),
        );
    }
    command
}

pub async fn synchronize(
    registry: &CommandRegistry,
    catalog: &dyn CommandCatalog,
    mode: SyncMode,
) -> Result<SyncResult, SyncError> {
    let commands = registry.list().iter().map(|d| to_create_command(d)).collect();
    match catalog.replace_all(commands, mode).await {
        Ok(count) => {
            info!("Synced {} command(s) {}.", count, mode);
            Ok(SyncResult { mode, count })
        }
        Err(e) => {
            error!("Command sync failed: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandHandler, InvocationContext, Parameter, ParameterKind};
    use crate::Error;
    use serenity::all::Permissions;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn run(&self, _ctx: &InvocationContext) -> Result<(), Error> {
            Ok(())
        }
    }

    /// Stands in for Discord: keeps one command list per scope.
    #[derive(Default)]
    struct FakeCatalog {
        scopes: Mutex<HashMap<Option<GuildId>, Vec<String>>>,
        reject: bool,
    }

    impl FakeCatalog {
        fn names(&self, scope: Option<GuildId>) -> Vec<String> {
            self.scopes
                .lock()
                .unwrap()
                .get(&scope)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CommandCatalog for FakeCatalog {
        async fn replace_all(&self, commands: Vec<CreateCommand>, mode: SyncMode) -> Result<usize, SyncError> {
            if self.reject {
                return Err(SyncError::Remote("Invalid Form Body".to_string()));
            }
            let names: Vec<String> = commands
                .iter()
                .map(|c| serde_json::to_value(c).unwrap()["name"].as_str().unwrap().to_string())
                .collect();
            let scope = match mode {
                SyncMode::Global => None,
                SyncMode::Scoped(guild) => Some(guild),
            };
            let count = names.len();
            self.scopes.lock().unwrap().insert(scope, names);
            Ok(count)
        }
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry
            .register(CommandDescriptor::new("ping", "Checks the bot's latency", Noop))
            .unwrap();
        registry
            .register(CommandDescriptor::new("info", "Displays information about the bot", Noop))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_zero_guild_syncs_globally() {
        let catalog = FakeCatalog::default();
        let result = synchronize(&registry(), &catalog, SyncMode::from_guild_id(0))
            .await
            .unwrap();
        assert_eq!(result.mode, SyncMode::Global);
        assert_eq!(result.count, 2);
        assert_eq!(catalog.names(None), vec!["ping", "info"]);
    }

    #[tokio::test]
    async fn test_guild_sync_is_scoped() {
        let catalog = FakeCatalog::default();
        let result = synchronize(&registry(), &catalog, SyncMode::from_guild_id(12345))
            .await
            .unwrap();
        let guild = GuildId::new(12345);
        assert_eq!(result.mode, SyncMode::Scoped(guild));
        assert_eq!(catalog.names(Some(guild)), vec!["ping", "info"]);
        assert!(catalog.names(None).is_empty());
    }

    #[tokio::test]
    async fn test_repeated_sync_converges() {
        let catalog = FakeCatalog::default();
        let registry = registry();
        let mode = SyncMode::from_guild_id(12345);
        synchronize(&registry, &catalog, mode).await.unwrap();
        let second = synchronize(&registry, &catalog, mode).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(catalog.names(Some(GuildId::new(12345))), vec!["ping", "info"]);
    }

    #[tokio::test]
    async fn test_rejection_surfaces_sync_error() {
        let catalog = FakeCatalog {
            reject: true,
            ..Default::default()
        };
        let err = synchronize(&registry(), &catalog, SyncMode::Global)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid Form Body"));
    }

    #[test]
    fn test_descriptor_conversion() {
        let descriptor = CommandDescriptor::new("setactivity", "Sets the bot's activity", Noop)
            .parameter(Parameter::new("activity", "Activity text", ParameterKind::String).required())
            .required_permissions(Permissions::ADMINISTRATOR)
            .guild_only();
        let json = serde_json::to_value(to_create_command(&descriptor)).unwrap();

        assert_eq!(json["name"], "setactivity");
        assert_eq!(json["dm_permission"], false);
        assert_eq!(json["options"][0]["name"], "activity");
        assert_eq!(json["options"][0]["required"], true);
        assert_eq!(
            json["default_member_permissions"],
            Permissions::ADMINISTRATOR.bits().to_string()
        );
    }
}
