//! Shared fakes for unit tests.

use crate::command::{Arguments, InvocationEvent, Invoker};
use crate::loader::ModuleRecord;
use crate::registry::CommandRegistry;
use crate::response::{Reply, Responder, ResponseChannel};
use crate::{Data, Error};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use serenity::all::{ChannelId, GuildId, Permissions, UserId};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Initial(String),
    Deferred,
    Followup(String),
}

#[derive(Clone, Default)]
pub struct SentLog {
    sent: Arc<Mutex<Vec<Sent>>>,
    embeds: Arc<Mutex<Vec<Value>>>,
}

impl SentLog {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn embeds(&self) -> Vec<Value> {
        self.embeds.lock().unwrap().clone()
    }

    fn record(&self, entry: Sent, reply: Option<&Reply>) {
        if let Some(embed) = reply.and_then(|r| r.embed.as_ref()) {
            self.embeds
                .lock()
                .unwrap()
                .push(serde_json::to_value(embed).unwrap());
        }
        self.sent.lock().unwrap().push(entry);
    }
}

fn describe(reply: &Reply) -> String {
    match (&reply.content, &reply.embed) {
        (Some(content), _) => content.clone(),
        (None, Some(_)) => "<embed>".to_string(),
        (None, None) => String::new(),
    }
}

pub struct RecordingResponder {
    log: SentLog,
    fail_initial: bool,
}

impl RecordingResponder {
    pub fn new() -> (Self, SentLog) {
        let log = SentLog::default();
        (
            Self {
                log: log.clone(),
                fail_initial: false,
            },
            log,
        )
    }

    pub fn failing_initial() -> (Self, SentLog) {
        let (mut responder, log) = Self::new();
        responder.fail_initial = true;
        (responder, log)
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn initial(&self, reply: Reply) -> Result<(), Error> {
        if self.fail_initial {
            return Err("interaction token expired".into());
        }
        self.log.record(Sent::Initial(describe(&reply)), Some(&reply));
        Ok(())
    }

    async fn defer(&self, _ephemeral: bool) -> Result<(), Error> {
        self.log.record(Sent::Deferred, None);
        Ok(())
    }

    async fn followup(&self, reply: Reply) -> Result<(), Error> {
        self.log.record(Sent::Followup(describe(&reply)), Some(&reply));
        Ok(())
    }
}

pub fn mock_data(registry: CommandRegistry, modules: Vec<ModuleRecord>) -> Arc<Data> {
    Arc::new(Data {
        started_at: Utc::now(),
        owner_name: "tester".to_string(),
        registry: Arc::new(registry),
        modules,
        shard_manager: None,
    })
}

/// A guild invocation with no permission information and no arguments.
pub fn mock_event(command: &str, user_id: u64) -> (InvocationEvent, SentLog) {
    let (responder, log) = RecordingResponder::new();
    let event = InvocationEvent {
        command_name: command.to_string(),
        invoker: Invoker {
            id: UserId::new(user_id),
            name: format!("user{}", user_id),
            permissions: Some(Permissions::empty()),
        },
        guild_id: Some(GuildId::new(4242)),
        channel_id: ChannelId::new(77),
        bot_permissions: Some(Permissions::all()),
        arguments: Arguments::default(),
        response: ResponseChannel::new(responder),
        discord: None,
    };
    (event, log)
}
