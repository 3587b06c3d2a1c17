//! Player assembly: mounting a poller and a reconciler into a host.
//!
//! ```no_run
//! use pmochannel::{ChannelPlayer, HeadlessHost, PlayerOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> pmochannel::Result<()> {
//!     let host = HeadlessHost::new("player", "ffplay", Vec::new());
//!     let options = PlayerOptions::from_query("?channel=news");
//!
//!     if let Some(handle) = ChannelPlayer::new(options)
//!         .base_url("https://tv.example.org/")
//!         .mount(&host)?
//!     {
//!         tokio::signal::ctrl_c().await?;
//!         handle.shutdown(Duration::from_secs(2)).await;
//!     }
//!     Ok(())
//! }
//! ```

use crate::channel::{ChannelId, PlayerOptions};
use crate::clock::{Clock, Jitter, RandomJitter, TokioClock};
use crate::constants::DEFAULT_CONTAINER_ID;
use crate::descriptor::{DescriptorClient, DEFAULT_BASE_URL};
use crate::engine::{EngineCapability, EngineConfig};
use crate::error::{Error, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::media::{Host, MediaElement};
use crate::poller::{Poller, StopHandle};
use crate::reconciler::SourceReconciler;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Builder of a channel player
pub struct ChannelPlayer {
    options: PlayerOptions,
    base_url: String,
    timeout: Option<Duration>,
    client: Option<Client>,
    engine: Option<Arc<dyn EngineCapability>>,
    engine_config: EngineConfig,
    container_id: String,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
    events: EventBus,
}

impl ChannelPlayer {
    pub fn new(options: PlayerOptions) -> Self {
        Self {
            options,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            client: None,
            engine: None,
            engine_config: EngineConfig::default(),
            container_id: DEFAULT_CONTAINER_ID.to_string(),
            clock: Arc::new(TokioClock),
            jitter: Arc::new(RandomJitter),
            events: EventBus::default(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Per-request descriptor timeout; none by default
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// HTTP client used for descriptor requests
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Offer a streaming engine; without one only native playback is tried
    pub fn engine(mut self, capability: Arc<dyn EngineCapability>) -> Self {
        self.engine = Some(capability);
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn container_id(mut self, id: impl Into<String>) -> Self {
        self.container_id = id.into();
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    /// Mount the player into `host` and start polling
    ///
    /// Returns `Ok(None)` when the host has no container with the configured
    /// identifier; this is logged as an error and nothing else happens.
    /// Must be called from within a tokio runtime.
    pub fn mount(self, host: &dyn Host) -> Result<Option<PlayerHandle>> {
        let Some(container) = host.container(&self.container_id) else {
            error!(
                container = %self.container_id,
                "Player container not found, player not started"
            );
            return Ok(None);
        };

        let runtime = Handle::try_current()
            .map_err(|e| Error::other(format!("no tokio runtime: {e}")))?;

        let channel = self.options.channel.clone();
        let element = container.video_or_inject();

        let mut descriptor = DescriptorClient::builder(channel.clone())
            .base_url(self.base_url)
            .timeout(self.timeout);
        if let Some(client) = self.client {
            descriptor = descriptor.client(client);
        }
        let descriptor = descriptor.build()?;

        let mut reconciler =
            SourceReconciler::new(channel.clone(), element.clone(), self.events.clone())
                .with_engine_config(self.engine_config);
        if let Some(engine) = self.engine {
            reconciler = reconciler.with_engine(engine);
        }

        let stop = StopHandle::new();
        let mut poller = Poller::new(self.options, descriptor, reconciler)
            .with_clock(self.clock)
            .with_jitter(self.jitter)
            .with_events(self.events.clone())
            .with_stop_handle(stop.clone());

        info!(channel = %channel, container = %self.container_id, "Mounting channel player");
        let task = runtime.spawn(async move {
            poller.run().await;
        });

        Ok(Some(PlayerHandle {
            channel,
            element,
            stop,
            events: self.events,
            task,
        }))
    }
}

/// Control handle of a mounted player
pub struct PlayerHandle {
    channel: ChannelId,
    element: Arc<dyn MediaElement>,
    stop: StopHandle,
    events: EventBus,
    task: JoinHandle<()>,
}

impl PlayerHandle {
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// The playback element the player owns
    pub fn element(&self) -> &Arc<dyn MediaElement> {
        &self.element
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Ask the loop to stop after its current cycle or wait
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::other(format!("player task failed: {e}")))
    }

    /// Stop the loop, waiting at most `grace` before aborting it
    ///
    /// A loop suspended in a long wait only observes the stop flag when the
    /// wait ends, hence the abort.
    pub async fn shutdown(mut self, grace: Duration) {
        self.stop.stop();
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            tracing::debug!(channel = %self.channel, "Player still waiting, aborting");
            self.task.abort();
        }
    }
}
