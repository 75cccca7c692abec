//! Per-invocation response channel.
//!
//! Discord accepts exactly one initial interaction response; everything after
//! that must be a follow-up. The channel tracks which of the two is next so
//! callers (handlers and the dispatcher's error path) never have to.

use crate::Error;
use async_trait::async_trait;
use serenity::all::CreateEmbed;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub content: Option<String>,
    pub embed: Option<CreateEmbed>,
    pub ephemeral: bool,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: CreateEmbed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// Transport half of a response channel
#[async_trait]
pub trait Responder: Send + Sync {
    async fn initial(&self, reply: Reply) -> Result<(), Error>;
    async fn defer(&self, ephemeral: bool) -> Result<(), Error>;
    async fn followup(&self, reply: Reply) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Pending,
    Deferred,
    Responded,
}

pub struct ResponseChannel {
    responder: Box<dyn Responder>,
    state: Mutex<ResponseState>,
}

impl ResponseChannel {
    pub fn new(responder: impl Responder + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            state: Mutex::new(ResponseState::Pending),
        }
    }

    pub async fn state(&self) -> ResponseState {
        *self.state.lock().await
    }

    /// True once an initial response (or a deferral) has been delivered.
    pub async fn is_done(&self) -> bool {
        self.state().await != ResponseState::Pending
    }

    /// Sends the initial response if none was sent yet, otherwise a follow-up.
    pub async fn send(&self, reply: Reply) -> Result<(), Error> {
        // Held across the send so two concurrent callers cannot both claim the initial slot.
        let mut state = self.state.lock().await;
        match *state {
            ResponseState::Pending => {
                self.responder.initial(reply).await?;
                *state = ResponseState::Responded;
            }
            ResponseState::Deferred | ResponseState::Responded => {
                self.responder.followup(reply).await?;
                *state = ResponseState::Responded;
            }
        }
        Ok(())
    }

    /// Acknowledges the invocation without content. No-op if already acknowledged.
    pub async fn defer(&self, ephemeral: bool) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if *state == ResponseState::Pending {
            self.responder.defer(ephemeral).await?;
            *state = ResponseState::Deferred;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingResponder, Sent};

    #[tokio::test]
    async fn test_first_send_is_initial_then_followups() {
        let (responder, log) = RecordingResponder::new();
        let channel = ResponseChannel::new(responder);

        assert!(!channel.is_done().await);
        channel.send(Reply::text("one")).await.unwrap();
        channel.send(Reply::text("two")).await.unwrap();
        assert!(channel.is_done().await);

        let sent = log.sent();
        assert_eq!(
            sent,
            vec![
                Sent::Initial("one".to_string()),
                Sent::Followup("two".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_defer_makes_next_send_a_followup() {
        let (responder, log) = RecordingResponder::new();
        let channel = ResponseChannel::new(responder);

        channel.defer(false).await.unwrap();
        channel.defer(false).await.unwrap();
        assert_eq!(channel.state().await, ResponseState::Deferred);
        channel.send(Reply::text("done")).await.unwrap();

        assert_eq!(
            log.sent(),
            vec![Sent::Deferred, Sent::Followup("done".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_initial_leaves_channel_pending() {
        let (responder, log) = RecordingResponder::failing_initial();
        let channel = ResponseChannel::new(responder);

        assert!(channel.send(Reply::text("lost")).await.is_err());
        assert_eq!(channel.state().await, ResponseState::Pending);
        assert!(log.sent().is_empty());
    }
}
