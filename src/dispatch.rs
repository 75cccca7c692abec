//! Invocation dispatch.
//!
//! Every invocation ends with exactly one terminal response: the handler's
//! own reply on success, or a short error message sent through the same
//! response channel (as a follow-up if the handler already replied).

use crate::command::{CommandDescriptor, InvocationContext, InvocationEvent};
use crate::cooldown::{CooldownTracker, ScopeKey};
use crate::error::DispatchError;
use crate::response::{Reply, ResponseState};
use crate::Data;
use serenity::all::Permissions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct Dispatcher {
    data: Arc<Data>,
    cooldowns: CooldownTracker,
}

/// Admins implicitly hold every permission.
fn satisfies(held: Option<Permissions>, required: Permissions) -> bool {
    match held {
        Some(held) => held.administrator() || held.contains(required),
        None => required.is_empty(),
    }
}

impl Dispatcher {
    pub fn new(data: Arc<Data>) -> Self {
        Self {
            data,
            cooldowns: CooldownTracker::new(),
        }
    }

    pub fn data(&self) -> &Arc<Data> {
        &self.data
    }

    /// Runs one invocation to its terminal response.
    pub async fn dispatch(&self, event: InvocationEvent) -> Result<(), DispatchError> {
        let mut ctx = InvocationContext::new(event, self.data.clone());
        let outcome = self.run(&mut ctx).await;
        match &outcome {
            Ok(()) => self.settle(&ctx).await,
            Err(err) => self.recover(&ctx, err).await,
        }
        outcome
    }

    /// A handler that returns without answering (or only deferred) still owes the user a reply.
    async fn settle(&self, ctx: &InvocationContext) {
        let command = ctx.command_name.as_str();
        let state = ctx.response.state().await;
        if state == ResponseState::Responded {
            debug!(command, user = %ctx.invoker.id, "Command completed");
            return;
        }

        warn!(command, ?state, "/{} finished without a response", command);
        let reply = Reply::text(DispatchError::HandlerFailure(String::new()).user_message()).ephemeral();
        if let Err(e) = ctx.response.send(reply).await {
            error!(command, "Failed to deliver fallback response for /{}: {}", command, e);
        }
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<(), DispatchError> {
        let descriptor = self
            .data
            .registry
            .resolve(&ctx.command_name)
            .map_err(|_| DispatchError::CommandNotFound(ctx.command_name.clone()))?
            .clone();

        if descriptor.guild_only && ctx.guild_id.is_none() {
            return Err(DispatchError::GuildOnly);
        }

        self.check_cooldown(&descriptor, ctx)?;
        self.check_permissions(&descriptor, ctx)?;

        ctx.arguments
            .apply_parameters(&descriptor.parameters)
            .map_err(DispatchError::InvalidArguments)?;

        descriptor
            .handler
            .run(ctx)
            .await
            .map_err(|e| DispatchError::HandlerFailure(e.to_string()))
    }

    fn check_cooldown(
        &self,
        descriptor: &CommandDescriptor,
        ctx: &InvocationContext,
    ) -> Result<(), DispatchError> {
        let Some(policy) = &descriptor.cooldown else {
            return Ok(());
        };
        let key = ScopeKey::for_scope(policy.scope, ctx.invoker.id, ctx.guild_id);
        self.cooldowns
            .hit(&descriptor.name, key, policy)
            .map_err(|retry_after| DispatchError::CooldownActive { retry_after })
    }

    fn check_permissions(
        &self,
        descriptor: &CommandDescriptor,
        ctx: &InvocationContext,
    ) -> Result<(), DispatchError> {
        if let Some(required) = descriptor.required_permissions {
            if !satisfies(ctx.invoker.permissions, required) {
                return Err(DispatchError::MissingCallerPermission(required));
            }
        }
        if let Some(required) = descriptor.required_bot_permissions {
            if !satisfies(ctx.bot_permissions, required) {
                return Err(DispatchError::MissingServicePermission(required));
            }
        }
        Ok(())
    }

    /// Logs the failure once and delivers the user-facing message.
    async fn recover(&self, ctx: &InvocationContext, err: &DispatchError) {
        let command = ctx.command_name.as_str();
        let user = &ctx.invoker.name;
        match err {
            DispatchError::HandlerFailure(detail) => {
                error!(command, user = %user, "Error in /{} command: {}", command, detail)
            }
            DispatchError::CooldownActive { retry_after } => {
                info!(command, user = %user, "/{} on cooldown, retry in {:?}", command, retry_after)
            }
            _ => warn!(command, user = %user, "Rejected /{}: {}", command, err),
        }

        let reply = Reply::text(err.user_message()).ephemeral();
        if let Err(e) = ctx.response.send(reply).await {
            error!(command, "Failed to deliver error response for /{}: {}", command, e);
        }
    }

    /// Drops cooldown windows older than the longest window any command uses.
    pub fn prune_cooldowns(&self) {
        let longest = self
            .data
            .registry
            .list()
            .iter()
            .filter_map(|d| d.cooldown.map(|c| c.window))
            .max()
            .unwrap_or(Duration::ZERO);
        self.cooldowns.prune(longest);
    }
}
