//! Structured command definitions and the context handed to command handlers.

use crate::response::ResponseChannel;
use crate::{Data, Error};
use async_trait::async_trait;
use serde_json::Value;
use serenity::all::{ChannelId, CommandOptionType, GuildId, Permissions, UserId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, ctx: &InvocationContext) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
}

impl ParameterKind {
    pub fn option_type(self) -> CommandOptionType {
        match self {
            ParameterKind::String => CommandOptionType::String,
            ParameterKind::Integer => CommandOptionType::Integer,
            ParameterKind::Number => CommandOptionType::Number,
            ParameterKind::Boolean => CommandOptionType::Boolean,
            ParameterKind::User => CommandOptionType::User,
            ParameterKind::Channel => CommandOptionType::Channel,
            ParameterKind::Role => CommandOptionType::Role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl Parameter {
    pub fn new(name: &str, description: &str, kind: ParameterKind) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Key granularity a cooldown counter is tracked over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownScope {
    User,
    Guild,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub max_uses: u32,
    pub window: Duration,
    pub scope: CooldownScope,
}

impl CooldownPolicy {
    pub fn per_user(max_uses: u32, window: Duration) -> Self {
        Self {
            max_uses,
            window,
            scope: CooldownScope::User,
        }
    }

    pub fn per_guild(max_uses: u32, window: Duration) -> Self {
        Self {
            max_uses,
            window,
            scope: CooldownScope::Guild,
        }
    }

    pub fn global(max_uses: u32, window: Duration) -> Self {
        Self {
            max_uses,
            window,
            scope: CooldownScope::Global,
        }
    }
}

/// A single slash command. Immutable once registered.
pub struct CommandDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
    /// Permissions the invoking member must hold
    pub required_permissions: Option<Permissions>,
    /// Permissions the bot itself must hold in the invoking channel
    pub required_bot_permissions: Option<Permissions>,
    pub cooldown: Option<CooldownPolicy>,
    pub guild_only: bool,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    pub fn new(name: &str, description: &str, handler: impl CommandHandler + 'static) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            required_permissions: None,
            required_bot_permissions: None,
            cooldown: None,
            guild_only: false,
            handler: Arc::new(handler),
        }
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn required_permissions(mut self, permissions: Permissions) -> Self {
        self.required_permissions = Some(permissions);
        self
    }

    pub fn required_bot_permissions(mut self, permissions: Permissions) -> Self {
        self.required_bot_permissions = Some(permissions);
        self
    }

    pub fn cooldown(mut self, policy: CooldownPolicy) -> Self {
        self.cooldown = Some(policy);
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("required_permissions", &self.required_permissions)
            .field("required_bot_permissions", &self.required_bot_permissions)
            .field("cooldown", &self.cooldown)
            .field("guild_only", &self.guild_only)
            .finish()
    }
}

/// Parameter values supplied with an invocation, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(HashMap<String, Value>);

impl Arguments {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Snowflake ids (users, channels, roles) are carried as unsigned integers.
    pub fn id(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Fills in declared defaults and rejects missing required parameters.
    pub fn apply_parameters(&mut self, parameters: &[Parameter]) -> Result<(), String> {
        for parameter in parameters {
            if self.contains(&parameter.name) {
                continue;
            }
            if let Some(default) = &parameter.default {
                self.0.insert(parameter.name.clone(), default.clone());
            } else if parameter.required {
                return Err(format!("Missing required option `{}`.", parameter.name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Invoker {
    pub id: UserId,
    pub name: String,
    /// Resolved channel permissions of the member. None outside of guilds.
    pub permissions: Option<Permissions>,
}

/// An inbound command invocation as delivered by the transport
pub struct InvocationEvent {
    pub command_name: String,
    pub invoker: Invoker,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub bot_permissions: Option<Permissions>,
    pub arguments: Arguments,
    pub response: ResponseChannel,
    pub discord: Option<serenity::all::Context>,
}

/// Everything a handler can see while running
pub struct InvocationContext {
    pub command_name: String,
    pub invoker: Invoker,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub bot_permissions: Option<Permissions>,
    pub arguments: Arguments,
    pub response: ResponseChannel,
    discord: Option<serenity::all::Context>,
    data: Arc<Data>,
}

impl InvocationContext {
    pub fn new(event: InvocationEvent, data: Arc<Data>) -> Self {
        Self {
            command_name: event.command_name,
            invoker: event.invoker,
            guild_id: event.guild_id,
            channel_id: event.channel_id,
            bot_permissions: event.bot_permissions,
            arguments: event.arguments,
            response: event.response,
            discord: event.discord,
            data,
        }
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    /// The live gateway context. Missing when invoked outside a connected session.
    pub fn discord(&self) -> Result<&serenity::all::Context, Error> {
        self.discord
            .as_ref()
            .ok_or_else(|| "not connected to Discord".into())
    }

    pub async fn say(&self, content: impl Into<String>) -> Result<(), Error> {
        self.response
            .send(crate::response::Reply::text(content))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_parameters_defaults_and_required() {
        let params = vec![
            Parameter::new("activity", "Activity text", ParameterKind::String).required(),
            Parameter::new("count", "How many", ParameterKind::Integer).default_value(3),
        ];

        let mut args = Arguments::new(HashMap::from([(
            "activity".to_string(),
            json!("chess"),
        )]));
        args.apply_parameters(&params).unwrap();
        assert_eq!(args.str("activity"), Some("chess"));
        assert_eq!(args.int("count"), Some(3));

        let mut empty = Arguments::default();
        let err = empty.apply_parameters(&params).unwrap_err();
        assert!(err.contains("activity"));
    }

    #[test]
    fn test_supplied_value_wins_over_default() {
        let params =
            vec![Parameter::new("count", "How many", ParameterKind::Integer).default_value(3)];
        let mut args = Arguments::new(HashMap::from([("count".to_string(), json!(7))]));
        args.apply_parameters(&params).unwrap();
        assert_eq!(args.int("count"), Some(7));
    }
}
