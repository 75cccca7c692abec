//! Fixed-window invocation counters.

use crate::command::{CooldownPolicy, CooldownScope};
use serenity::all::{GuildId, UserId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    User(UserId),
    Guild(GuildId),
    Global,
}

impl ScopeKey {
    /// Guild-scoped cooldowns fall back to the user outside of guilds.
    pub fn for_scope(scope: CooldownScope, user: UserId, guild: Option<GuildId>) -> Self {
        match (scope, guild) {
            (CooldownScope::User, _) => ScopeKey::User(user),
            (CooldownScope::Guild, Some(guild)) => ScopeKey::Guild(guild),
            (CooldownScope::Guild, None) => ScopeKey::User(user),
            (CooldownScope::Global, _) => ScopeKey::Global,
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    uses: u32,
}

#[derive(Default)]
pub struct CooldownTracker {
    windows: Mutex<HashMap<(String, ScopeKey), Window>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one use, or returns the remaining wait if the window is exhausted.
    pub fn hit(&self, command: &str, key: ScopeKey, policy: &CooldownPolicy) -> Result<(), Duration> {
        self.hit_at(command, key, policy, Instant::now())
    }

    /// Check and increment happen under one lock with no await in between.
    pub fn hit_at(
        &self,
        command: &str,
        key: ScopeKey,
        policy: &CooldownPolicy,
        now: Instant,
    ) -> Result<(), Duration> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows
            .entry((command.to_string(), key))
            .or_insert(Window {
                started: now,
                uses: 0,
            });

        if now.saturating_duration_since(window.started) >= policy.window {
            window.started = now;
            window.uses = 0;
        }

        if window.uses >= policy.max_uses {
            let window_end = window.started + policy.window;
            return Err(window_end.saturating_duration_since(now));
        }

        window.uses += 1;
        Ok(())
    }

    /// Forgets windows that have fully elapsed.
    pub fn prune(&self, max_window: Duration) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, w| now.saturating_duration_since(w.started) < max_window);
    }

    pub fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
