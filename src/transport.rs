//! Serenity glue: gateway events in, interaction responses out.

use crate::command::{Arguments, InvocationEvent, Invoker};
use crate::lifecycle::Lifecycle;
use crate::response::{Reply, Responder, ResponseChannel};
use crate::Error;
use async_trait::async_trait;
use serde_json::{json, Value};
use serenity::all::{
    CommandDataOptionValue, CommandInteraction, Context, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EventHandler,
    GatewayError, Http, HttpError, Interaction, Ready,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct InteractionResponder {
    http: Arc<Http>,
    interaction: CommandInteraction,
}

impl InteractionResponder {
    pub fn new(http: Arc<Http>, interaction: CommandInteraction) -> Self {
        Self { http, interaction }
    }
}

#[async_trait]
impl Responder for InteractionResponder {
    async fn initial(&self, reply: Reply) -> Result<(), Error> {
        let mut message = CreateInteractionResponseMessage::new().ephemeral(reply.ephemeral);
        if let Some(content) = reply.content {
            message = message.content(content);
        }
        if let Some(embed) = reply.embed {
            message = message.embed(embed);
        }
        self.interaction
            .create_response(&*self.http, CreateInteractionResponse::Message(message))
            .await?;
        Ok(())
    }

    async fn defer(&self, ephemeral: bool) -> Result<(), Error> {
        let message = CreateInteractionResponseMessage::new().ephemeral(ephemeral);
        self.interaction
            .create_response(&*self.http, CreateInteractionResponse::Defer(message))
            .await?;
        Ok(())
    }

    async fn followup(&self, reply: Reply) -> Result<(), Error> {
        let mut followup = CreateInteractionResponseFollowup::new().ephemeral(reply.ephemeral);
        if let Some(content) = reply.content {
            followup = followup.content(content);
        }
        if let Some(embed) = reply.embed {
            followup = followup.embed(embed);
        }
        self.interaction
            .create_followup(&*self.http, followup)
            .await?;
        Ok(())
    }
}

/// Ids travel as integers; subcommands and attachments are not supported.
fn option_value(value: &CommandDataOptionValue) -> Option<Value> {
    match value {
        CommandDataOptionValue::String(s) => Some(json!(s)),
        CommandDataOptionValue::Integer(i) => Some(json!(i)),
        CommandDataOptionValue::Number(n) => Some(json!(n)),
        CommandDataOptionValue::Boolean(b) => Some(json!(b)),
        CommandDataOptionValue::User(id) => Some(json!(id.get())),
        CommandDataOptionValue::Channel(id) => Some(json!(id.get())),
        CommandDataOptionValue::Role(id) => Some(json!(id.get())),
        _ => None,
    }
}

pub fn invocation_event(ctx: &Context, interaction: CommandInteraction) -> InvocationEvent {
    let arguments: HashMap<String, Value> = interaction
        .data
        .options
        .iter()
        .filter_map(|o| option_value(&o.value).map(|v| (o.name.clone(), v)))
        .collect();

    InvocationEvent {
        command_name: interaction.data.name.clone(),
        invoker: Invoker {
            id: interaction.user.id,
            name: interaction.user.name.clone(),
            permissions: interaction.member.as_ref().and_then(|m| m.permissions),
        },
        guild_id: interaction.guild_id,
        channel_id: interaction.channel_id,
        bot_permissions: interaction.app_permissions,
        arguments: Arguments::new(arguments),
        discord: Some(ctx.clone()),
        response: ResponseChannel::new(InteractionResponder::new(ctx.http.clone(), interaction)),
    }
}

/// True when Discord rejected the bot token.
pub fn is_auth_failure(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Gateway(GatewayError::InvalidAuthentication) => true,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            response.status_code.as_u16() == 401
        }
        _ => false,
    }
}

pub struct Handler {
    lifecycle: Arc<Lifecycle>,
}

impl Handler {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.lifecycle.on_ready(&ctx, &ready).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        debug!("Received /{} from {}", command.data.name, command.user.name);
        let event = invocation_event(&ctx, command);

        let dispatcher = match self.lifecycle.dispatcher() {
            Some(dispatcher) if self.lifecycle.accepting() => dispatcher,
            _ => {
                warn!("Refusing /{}: not serving commands right now", event.command_name);
                let reply = Reply::text("🔌 The bot is restarting, please try again shortly.").ephemeral();
                if let Err(e) = event.response.send(reply).await {
                    warn!("Failed to send refusal for /{}: {}", event.command_name, e);
                }
                return;
            }
        };

        self.lifecycle.spawn_invocation(async move {
            // Outcome is already logged and answered by the dispatcher.
            let _ = dispatcher.dispatch(event).await;
        });
    }
}
