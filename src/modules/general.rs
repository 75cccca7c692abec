//! General purpose commands: latency, bot/server/channel info, presence.

use super::{COLOR_BLUE, COLOR_GOLD, COLOR_PURPLE, EMBED_FIELD_LIMIT};
use crate::command::{
    CommandDescriptor, CommandHandler, CooldownPolicy, InvocationContext, Parameter, ParameterKind,
};
use crate::error::ModuleLoadError;
use crate::loader::{CommandModule, LoadState};
use crate::registry::CommandRegistry;
use crate::response::Reply;
use crate::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::all::{ActivityData, ChannelId, CreateEmbed, CreateEmbedFooter, Permissions};
use std::time::Duration;
use tracing::info;

pub struct GeneralModule;

impl CommandModule for GeneralModule {
    fn name(&self) -> &'static str {
        "general"
    }

    fn register(&self, registry: &mut CommandRegistry) -> Result<(), ModuleLoadError> {
        registry.register(
            CommandDescriptor::new("ping", "Checks the bot's latency", Ping)
                .cooldown(CooldownPolicy::per_user(5, Duration::from_secs(60))),
        )?;
        registry.register(CommandDescriptor::new(
            "info",
            "Displays information about the bot",
            Info,
        ))?;
        registry.register(
            CommandDescriptor::new(
                "serverinfo",
                "Displays information about the server",
                ServerInfo,
            )
            .guild_only(),
        )?;
        registry.register(
            CommandDescriptor::new(
                "channelinfo",
                "Displays information about a specific channel.",
                ChannelInfo,
            )
            .parameter(Parameter::new(
                "channel",
                "Channel to inspect (defaults to this one)",
                ParameterKind::Channel,
            )),
        )?;
        registry.register(
            CommandDescriptor::new(
                "setactivity",
                "Sets the bot's activity (displayed as 'Playing ...').",
                SetActivity,
            )
            .parameter(
                Parameter::new("activity", "What the bot is playing", ParameterKind::String)
                    .required(),
            )
            .required_permissions(Permissions::ADMINISTRATOR)
            .guild_only(),
        )?;
        registry.register(CommandDescriptor::new(
            "modules",
            "List all command modules found at startup.",
            Modules,
        ))?;
        Ok(())
    }
}

pub struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn run(&self, ctx: &InvocationContext) -> Result<(), Error> {
        let latency = match (&ctx.data().shard_manager, ctx.discord()) {
            (Some(manager), Ok(discord)) => {
                let runners = manager.runners.lock().await;
                runners.get(&discord.shard_id).and_then(|r| r.latency)
            }
            _ => None,
        };

        let text = match latency {
            Some(latency) => format!("Pong! Latency: {}ms", latency.as_millis()),
            None => "Pong! Latency: unknown (no heartbeat yet)".to_string(),
        };
        ctx.say(text).await?;
        info!("Ping command used by {}. Latency: {:?}", ctx.invoker.name, latency);
        Ok(())
    }
}

/// Uptime truncated to whole seconds, e.g. "1day 2h 3m 4s"
fn format_uptime(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - started_at).num_seconds().max(0) as u64;
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

pub struct Info;

#[async_trait]
impl CommandHandler for Info {
    async fn run(&self, ctx: &InvocationContext) -> Result<(), Error> {
        let data = ctx.data();
        let embed = CreateEmbed::new()
            .title("Bot Information")
            .color(COLOR_BLUE)
            .field("Uptime", format_uptime(data.started_at, Utc::now()), true)
            .field("Version", env!("CARGO_PKG_VERSION"), true)
            .field("Owner", &data.owner_name, true)
            .footer(CreateEmbedFooter::new(format!(
                "Bot developed by {}",
                data.owner_name
            )));

        ctx.response.send(Reply::embed(embed).ephemeral()).await?;
        info!("Info command used by {}.", ctx.invoker.name);
        Ok(())
    }
}

pub struct ServerInfo;

#[async_trait]
impl CommandHandler for ServerInfo {
    async fn run(&self, ctx: &InvocationContext) -> Result<(), Error> {
        let discord = ctx.discord()?;
        let guild_id = ctx.guild_id.ok_or("Must be run in a guild")?;

        // Cache guards are not Send; build the embed before awaiting anything.
        let (name, embed) = {
            let guild = discord
                .cache
                .guild(guild_id)
                .ok_or("Guild is not in the cache")?;
            let mut embed = CreateEmbed::new()
                .title(&guild.name)
                .color(COLOR_PURPLE)
                .field("Server ID", guild.id.to_string(), false)
                .field(
                    "Owner",
                    format!("<@{}> (ID: {})", guild.owner_id, guild.owner_id),
                    false,
                )
                .field("Members", guild.member_count.to_string(), true)
                .field("Channels", guild.channels.len().to_string(), true)
                .field("Roles", guild.roles.len().to_string(), true)
                .footer(CreateEmbedFooter::new("Server Info"));
            if let Some(icon) = guild.icon_url() {
                embed = embed.thumbnail(icon);
            }
            (guild.name.clone(), embed)
        };

        ctx.response.send(Reply::embed(embed).ephemeral()).await?;
        info!(
            "Server info requested by {} in guild {}.",
            ctx.invoker.name, name
        );
        Ok(())
    }
}

pub struct ChannelInfo;

#[async_trait]
impl CommandHandler for ChannelInfo {
    async fn run(&self, ctx: &InvocationContext) -> Result<(), Error> {
        let discord = ctx.discord()?;
        let channel_id = ctx
            .arguments
            .id("channel")
            .filter(|&id| id != 0)
            .map(ChannelId::new)
            .unwrap_or(ctx.channel_id);

        let Some(channel) = channel_id.to_channel(discord).await?.guild() else {
            ctx.response
                .send(Reply::text("❌ Channel info is only available for server channels.").ephemeral())
                .await?;
            return Ok(());
        };

        let category = match channel.parent_id {
            Some(parent) => parent
                .name(discord)
                .await
                .unwrap_or_else(|_| "Unknown".to_string()),
            None => "No Category".to_string(),
        };
        let created_at = DateTime::from_timestamp(channel.id.created_at().unix_timestamp(), 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        let mut embed = CreateEmbed::new()
            .title(&channel.name)
            .color(COLOR_GOLD)
            .field("Channel ID", channel.id.to_string(), true)
            .field("Channel Type", channel.kind.name(), false)
            .field("Created At", created_at, true)
            .field("Category", category, true)
            .footer(CreateEmbedFooter::new("Channel Info"));
        if let Some(topic) = channel.topic.as_deref().filter(|t| !t.is_empty()) {
            embed = embed.field("Topic", topic, true);
        }

        ctx.response.send(Reply::embed(embed).ephemeral()).await?;
        info!(
            "Channel info requested by {} for channel {}.",
            ctx.invoker.name, channel.name
        );
        Ok(())
    }
}

pub struct SetActivity;

#[async_trait]
impl CommandHandler for SetActivity {
    async fn run(&self, ctx: &InvocationContext) -> Result<(), Error> {
        let activity = ctx
            .arguments
            .str("activity")
            .ok_or("activity is required")?
            .to_string();
        let discord = ctx.discord()?;

        // Only the activity changes, the online status is left alone.
        discord.set_activity(Some(ActivityData::playing(&activity)));

        ctx.response
            .send(Reply::text(format!("Activity updated to: '{}'", activity)).ephemeral())
            .await?;
        info!("Activity updated to '{}' by {}.", activity, ctx.invoker.name);
        Ok(())
    }
}

fn describe_state(state: &LoadState) -> String {
    match state {
        LoadState::Loaded { commands } => format!("🟢 Loaded ({} command(s))", commands),
        LoadState::Skipped => "⚪ Disabled".to_string(),
        LoadState::Failed(_) => "🔴 Failed to load".to_string(),
        LoadState::Unloaded => "⚪ Not loaded".to_string(),
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct Modules;

#[async_trait]
impl CommandHandler for Modules {
    async fn run(&self, ctx: &InvocationContext) -> Result<(), Error> {
        let mut embed = CreateEmbed::new()
            .title("Available Modules")
            .description("Here are the modules found at startup:")
            .color(COLOR_BLUE);
        for module in ctx.data().modules.iter().take(EMBED_FIELD_LIMIT) {
            embed = embed.field(capitalize(&module.name), describe_state(&module.state), false);
        }

        ctx.response.send(Reply::embed(embed).ephemeral()).await?;
        info!("Listed modules to user {}.", ctx.invoker.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::error::DispatchError;
    use crate::loader::ModuleRecord;
    use crate::testing::{mock_data, mock_event, Sent};

    fn dispatcher(modules: Vec<ModuleRecord>) -> Dispatcher {
        let mut registry = CommandRegistry::new();
        GeneralModule.register(&mut registry).unwrap();
        Dispatcher::new(mock_data(registry, modules))
    }

    #[test]
    fn test_registers_expected_commands() {
        let mut registry = CommandRegistry::new();
        GeneralModule.register(&mut registry).unwrap();
        assert_eq!(
            registry.names(),
            vec!["ping", "info", "serverinfo", "channelinfo", "setactivity", "modules"]
        );
        let setactivity = registry.resolve("setactivity").unwrap();
        assert_eq!(setactivity.required_permissions, Some(Permissions::ADMINISTRATOR));
        assert!(registry.resolve("ping").unwrap().cooldown.is_some());
        assert!(registry.resolve("serverinfo").unwrap().guild_only);
        assert!(!registry.resolve("channelinfo").unwrap().guild_only);
    }

    #[tokio::test]
    async fn test_channelinfo_is_allowed_in_direct_messages() {
        let dispatcher = dispatcher(Vec::new());
        let (mut event, _) = mock_event("channelinfo", 1);
        event.guild_id = None;

        // Gets past the gates and reaches the handler, which needs a live gateway here.
        let result = dispatcher.dispatch(event).await;
        assert!(matches!(result, Err(DispatchError::HandlerFailure(_))));
    }

    #[test]
    fn test_format_uptime() {
        let start = Utc::now();
        let later = start + chrono::Duration::seconds(93_784) + chrono::Duration::milliseconds(500);
        assert_eq!(format_uptime(start, later), "1day 2h 3m 4s");
        assert_eq!(format_uptime(later, start), "0s");
    }

    #[tokio::test]
    async fn test_ping_without_gateway() {
        let dispatcher = dispatcher(Vec::new());
        let (event, log) = mock_event("ping", 1);
        dispatcher.dispatch(event).await.unwrap();
        assert_eq!(
            log.sent(),
            vec![Sent::Initial("Pong! Latency: unknown (no heartbeat yet)".to_string())]
        );
    }

    #[tokio::test]
    async fn test_info_embed() {
        let dispatcher = dispatcher(Vec::new());
        let (event, log) = mock_event("info", 1);
        dispatcher.dispatch(event).await.unwrap();

        let embed = &log.embeds()[0];
        assert_eq!(embed["title"], "Bot Information");
        assert_eq!(embed["fields"][1]["value"], env!("CARGO_PKG_VERSION"));
        assert_eq!(embed["fields"][2]["value"], "tester");
    }

    #[tokio::test]
    async fn test_modules_lists_states() {
        let dispatcher = dispatcher(vec![
            ModuleRecord {
                name: "general".to_string(),
                state: LoadState::Loaded { commands: 6 },
            },
            ModuleRecord {
                name: "docker".to_string(),
                state: LoadState::Failed("socket missing".to_string()),
            },
        ]);
        let (event, log) = mock_event("modules", 1);
        dispatcher.dispatch(event).await.unwrap();

        let embed = &log.embeds()[0];
        assert_eq!(embed["fields"][0]["name"], "General");
        assert_eq!(embed["fields"][1]["value"], "🔴 Failed to load");
        assert!(!embed.to_string().contains("socket missing"));
    }

    #[tokio::test]
    async fn test_gateway_commands_fail_cleanly_when_disconnected() {
        let dispatcher = dispatcher(Vec::new());
        let (mut event, log) = mock_event("setactivity", 1);
        event.invoker.permissions = Some(Permissions::ADMINISTRATOR);
        event.arguments = crate::command::Arguments::new(std::collections::HashMap::from([(
            "activity".to_string(),
            serde_json::json!("chess"),
        )]));

        let result = dispatcher.dispatch(event).await;
        assert!(matches!(result, Err(DispatchError::HandlerFailure(_))));
        assert!(matches!(&log.sent()[0], Sent::Initial(msg) if msg.contains("Something went wrong")));
    }
}
