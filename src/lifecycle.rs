//! Startup and shutdown ordering for a session.
//!
//! connect → load modules → sync commands → announce ready → serve → drain → close.

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::StartupError;
use crate::loader::ModuleLoader;
use crate::registry::CommandRegistry;
use crate::sync::{synchronize, CommandCatalog, SerenityCatalog, SyncMode};
use crate::Data;
use chrono::{DateTime, Utc};
use serenity::all::{ActivityData, Context, Ready, ShardManager};
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// How long in-flight invocations get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
const COOLDOWN_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

pub struct Lifecycle {
    config: Config,
    loader: ModuleLoader,
    started_at: DateTime<Utc>,
    dispatcher: OnceCell<Arc<Dispatcher>>,
    shard_manager: OnceLock<Arc<ShardManager>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    failure: Mutex<Option<StartupError>>,
}

impl Lifecycle {
    pub fn new(config: Config, loader: ModuleLoader) -> Arc<Self> {
        Arc::new(Self {
            config,
            loader,
            started_at: Utc::now(),
            dispatcher: OnceCell::new(),
            shard_manager: OnceLock::new(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            failure: Mutex::new(None),
        })
    }

    pub fn attach_shard_manager(&self, manager: Arc<ShardManager>) {
        let _ = self.shard_manager.set(manager);
    }

    pub fn dispatcher(&self) -> Option<Arc<Dispatcher>> {
        self.dispatcher.get().cloned()
    }

    pub fn accepting(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Called on every gateway `ready`. Only the first one initializes.
    pub async fn on_ready(&self, ctx: &Context, ready: &Ready) {
        if self.dispatcher.initialized() {
            info!("Reconnected as {} (ID: {})", ready.user.name, ready.user.id);
            return;
        }

        let catalog = SerenityCatalog::new(ctx.http.clone());
        let result = self
            .dispatcher
            .get_or_try_init(|| self.bootstrap(&catalog))
            .await;
        let dispatcher = match result {
            Ok(dispatcher) => dispatcher.clone(),
            Err(e) => {
                self.fail(e);
                return;
            }
        };

        if let Some(status) = &self.config.status_message {
            ctx.set_activity(Some(ActivityData::custom(status)));
        }
        self.spawn_cooldown_pruning(dispatcher);

        info!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
        info!("Bot is online and ready to receive commands!");
    }

    /// Loads modules, syncs the registry and builds the dispatcher.
    ///
    /// A sync failure is logged and tolerated; the commands stay usable wherever
    /// Discord already knows them.
    pub async fn bootstrap(&self, catalog: &dyn CommandCatalog) -> Result<Arc<Dispatcher>, StartupError> {
        let modules_dir = self.config.modules_dir.as_deref();
        let candidates = self
            .loader
            .candidates(modules_dir)
            .map_err(|source| StartupError::Modules {
                path: modules_dir
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                source,
            })?;

        let mut registry = CommandRegistry::new();
        let report = self.loader.load(&candidates, &mut registry);
        info!(
            "Loaded {} module(s), {} failed, {} command(s) registered",
            report.loaded(),
            report.failed(),
            registry.len()
        );

        let mode = SyncMode::from_guild_id(self.config.guild_id);
        // Failure already logged by the synchronizer.
        let _ = synchronize(&registry, catalog, mode).await;

        let data = Data {
            started_at: self.started_at,
            owner_name: self.config.owner_name.clone(),
            registry: Arc::new(registry),
            modules: report.modules,
            shard_manager: self.shard_manager.get().cloned(),
        };
        Ok(Arc::new(Dispatcher::new(Arc::new(data))))
    }

    /// Records a fatal startup error and begins shutdown.
    pub fn fail(&self, err: StartupError) {
        error!("Startup failed: {}", err);
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(err);
        self.shutdown.cancel();
    }

    pub fn take_failure(&self) -> Option<StartupError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn request_shutdown(&self) {
        if self.accepting() {
            info!("Shutdown requested, draining in-flight commands...");
        }
        self.shutdown.cancel();
    }

    pub fn spawn_invocation<F>(&self, invocation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(invocation);
    }

    /// Resolves once shutdown was requested and in-flight invocations finished
    /// (or the grace period ran out).
    pub async fn drained(&self) {
        self.shutdown.cancelled().await;
        self.tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "Abandoning {} in-flight command(s) after {:?}",
                self.tracker.len(),
                SHUTDOWN_GRACE
            );
        }
    }

    fn spawn_cooldown_pruning(&self, dispatcher: Arc<Dispatcher>) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(COOLDOWN_PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => dispatcher.prune_cooldowns(),
                    _ = shutdown.cancelled() => break,
                }
            }
        });
    }
}

/// Requests shutdown on Ctrl-C or SIGTERM.
pub async fn watch_signals(lifecycle: Arc<Lifecycle>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = lifecycle.shutdown.cancelled() => return,
    }
    lifecycle.request_shutdown();
}
