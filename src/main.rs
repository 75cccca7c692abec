use cogbot::config::Config;
use cogbot::error::StartupError;
use cogbot::lifecycle::{self, Lifecycle};
use cogbot::loader::ModuleLoader;
use cogbot::transport::{self, Handler};
use cogbot::{logging, modules};
use serenity::all::{Client, GatewayIntents};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing token aborts here, before logging or any network activity.
    let config = Config::from_env()?;
    logging::init(&config)?;
    info!("Starting with {:?}", config);

    let token = config.discord_token.clone();
    let lifecycle = Lifecycle::new(config, ModuleLoader::new(modules::builtin()));

    let intents = GatewayIntents::non_privileged();
    let mut client = Client::builder(&token, intents)
        .event_handler(Handler::new(lifecycle.clone()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;
    lifecycle.attach_shard_manager(client.shard_manager.clone());

    tokio::spawn(lifecycle::watch_signals(lifecycle.clone()));
    let shard_manager = client.shard_manager.clone();
    let closer = lifecycle.clone();
    tokio::spawn(async move {
        closer.drained().await;
        shard_manager.shutdown_all().await;
    });

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        if transport::is_auth_failure(&why) {
            error!("Invalid token. Check your DISCORD_TOKEN in .env.");
            return Err(StartupError::Auth.into());
        }
        error!("Unexpected error: {}", why);
        return Err(StartupError::Gateway(why).into());
    }

    if let Some(failure) = lifecycle.take_failure() {
        return Err(failure.into());
    }
    info!("Shut down cleanly.");
    Ok(())
}
