//! Channel video player control loop
//!
//! This crate polls a per-channel JSON descriptor for the current live stream
//! URL and switches a playback element to it whenever it changes, retrying
//! with a bounded backoff when anything goes wrong.
//!
//! # Features
//!
//! - **Descriptor Poller**: cache-bypassing fetch of `data/<channel>.json`,
//!   jittered poll interval, multiplicative retry backoff (3 s to 20 s)
//! - **Source Reconciler**: detach/load/attach through a streaming engine, or
//!   native HLS playback, or a clean `UnsupportedPlayback` failure
//! - **Capability traits**: host, container, media element and streaming
//!   engine are all traits, so the loop runs against real backends or doubles
//! - **Headless runtime**: an HTTP manifest engine and an element driving an
//!   external player process (`ffplay` by default)
//! - **Events**: every applied source, cycle and absorbed failure is published
//!   on a broadcast bus
//!
//! # Example
//!
//! ```no_run
//! use pmochannel::{ChannelPlayer, HeadlessHost, ManifestEngineCapability, PlayerOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = HeadlessHost::new("player", "ffplay", Vec::new());
//!     let engine = ManifestEngineCapability::new(reqwest::Client::new(), true);
//!
//!     let handle = ChannelPlayer::new(PlayerOptions::from_query("?channel=News&pollMs=5000"))
//!         .base_url("https://tv.example.org/")
//!         .engine(Arc::new(engine))
//!         .mount(&host)?;
//!
//!     if let Some(handle) = handle {
//!         let mut events = handle.subscribe();
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration Extension
//!
//! With the `pmoconfig` feature (default), [`ChannelConfigExt`] reads player,
//! descriptor and engine settings from the global configuration.

pub mod backoff;
pub mod channel;
pub mod clock;
pub mod constants;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod events;
pub mod hls;
pub mod media;
pub mod native;
pub mod player;
pub mod poller;
pub mod reconciler;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

// Re-exports
pub use backoff::Backoff;
pub use channel::{ChannelId, PlayerOptions};
pub use clock::{Clock, FixedJitter, Jitter, ManualClock, RandomJitter, TokioClock};
pub use descriptor::{Descriptor, DescriptorClient, DescriptorClientBuilder, DescriptorSource};
pub use engine::{
    EngineCapability, EngineConfig, EngineEvent, EngineEventKind, ManifestEngine,
    ManifestEngineCapability, StreamingEngine,
};
pub use error::{Error, NonFatal, Result};
pub use events::{EventBus, PlayerEvent};
pub use media::{Container, Host, MediaElement, VideoAttributes};
pub use native::{HeadlessContainer, HeadlessHost, ProcessElement};
pub use player::{ChannelPlayer, PlayerHandle};
pub use poller::{CycleOutcome, CycleReport, Poller, SessionState, StopHandle};
pub use reconciler::{safe_play, SourceReconciler, SourceSink, SourceState, Strategy};

#[cfg(feature = "pmoconfig")]
pub use config_ext::ChannelConfigExt;
