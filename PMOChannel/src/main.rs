use anyhow::{Context, Result};
use pmochannel::{ChannelConfigExt, ChannelPlayer, HeadlessHost, ManifestEngineCapability};
use pmoconfig::{get_config, Config};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Time given to the poll loop to exit after Ctrl+C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn init_logging(config: &Config) {
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| pmoconfig::DEFAULT_LOG_MIN_LEVEL.to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = get_config();
    init_logging(&config);

    // Usage: PMOChannel [?channel=<name>&pollMs=<ms>]
    let query = std::env::args().nth(1).unwrap_or_default();
    let options = config.player_options()?.with_query(&query);

    let (command, args) = config.native_player()?;
    let container_id = config.get_player_container_id()?;
    let client = reqwest::Client::builder()
        .user_agent(pmochannel::constants::DEFAULT_USER_AGENT)
        .build()
        .context("failed to build HTTP client")?;

    let host = HeadlessHost::with_client(&container_id, command, args, client.clone());

    let mut player = ChannelPlayer::new(options)
        .base_url(config.descriptor_base_url()?)
        .timeout(config.descriptor_timeout()?)
        .client(client.clone())
        .engine_config(config.engine_config()?)
        .container_id(container_id);
    if config.engine_enabled()? {
        player = player.engine(Arc::new(ManifestEngineCapability::new(client, true)));
    } else {
        info!("Streaming engine disabled, relying on native playback");
    }

    let Some(handle) = player.mount(&host)? else {
        warn!("Nothing to play, exiting");
        return Ok(());
    };

    info!(channel = %handle.channel(), "✅ PMOChannel is ready");
    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;

    info!("Stopping player...");
    handle.shutdown(SHUTDOWN_GRACE).await;
    Ok(())
}
