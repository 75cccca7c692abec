pub mod command;
pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod logging;
pub mod modules;
pub mod registry;
pub mod response;
pub mod sync;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};
use serenity::all::ShardManager;
use std::sync::Arc;

/// Session-wide data shared with every command
pub struct Data {
    pub started_at: DateTime<Utc>,
    pub owner_name: String,
    /// Frozen once startup finishes
    pub registry: Arc<registry::CommandRegistry>,
    pub modules: Vec<loader::ModuleRecord>,
    /// Used for heartbeat latency. None in tests.
    pub shard_manager: Option<Arc<ShardManager>>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
