use super::{COLOR_BLUE, EMBED_FIELD_LIMIT};
use crate::command::{CommandDescriptor, CommandHandler, InvocationContext};
use crate::error::ModuleLoadError;
use crate::loader::CommandModule;
use crate::registry::CommandRegistry;
use crate::response::Reply;
use crate::Error;
use async_trait::async_trait;
use serenity::all::{CreateEmbed, CreateEmbedFooter};
use tracing::info;

pub struct HelpModule;

impl CommandModule for HelpModule {
    fn name(&self) -> &'static str {
        "help"
    }

    fn register(&self, registry: &mut CommandRegistry) -> Result<(), ModuleLoadError> {
        registry.register(CommandDescriptor::new(
            "help",
            "Displays a list of all available slash commands.",
            Help,
        ))?;
        Ok(())
    }
}

/// Lists every registered command in registration order
pub struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn run(&self, ctx: &InvocationContext) -> Result<(), Error> {
        let commands = ctx.data().registry.list();

        let mut embed = CreateEmbed::new()
            .title("Bot Commands")
            .description("Here are the slash commands you can use:")
            .color(COLOR_BLUE);
        for command in commands.iter().take(EMBED_FIELD_LIMIT) {
            let description = if command.description.is_empty() {
                "No description provided."
            } else {
                command.description.as_str()
            };
            embed = embed.field(format!("/{}", command.name), description, false);
        }
        if commands.len() > EMBED_FIELD_LIMIT {
            embed = embed.footer(CreateEmbedFooter::new(format!(
                "…and {} more",
                commands.len() - EMBED_FIELD_LIMIT
            )));
        }

        ctx.response.send(Reply::embed(embed).ephemeral()).await?;
        info!("Displayed help to {}.", ctx.invoker.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::modules::general::GeneralModule;
    use crate::testing::{mock_data, mock_event, Sent};

    #[tokio::test]
    async fn test_help_lists_commands_in_order() {
        let mut registry = CommandRegistry::new();
        GeneralModule.register(&mut registry).unwrap();
        HelpModule.register(&mut registry).unwrap();
        let expected: Vec<String> = registry.names().iter().map(|n| format!("/{}", n)).collect();
        let dispatcher = Dispatcher::new(mock_data(registry, Vec::new()));

        let (event, log) = mock_event("help", 1);
        dispatcher.dispatch(event).await.unwrap();

        assert_eq!(log.sent(), vec![Sent::Initial("<embed>".to_string())]);
        let embed = &log.embeds()[0];
        assert_eq!(embed["title"], "Bot Commands");
        let names: Vec<String> = embed["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, expected);
        assert_eq!(embed["fields"][0]["value"], "Checks the bot's latency");
    }
}
