//! Streaming engine that validates playlists over HTTP.
//!
//! `load_source` downloads the playlist in the background and reports
//! [`EngineEvent::ManifestParsed`] or [`EngineEvent::Error`]; `attach_media`
//! hands the loaded URL to the playback element, which does the decoding.

use super::{
    EngineCapability, EngineConfig, EngineEvent, EngineEventKind, EngineHandler, EngineHandlers,
    StreamingEngine,
};
use crate::error::Result;
use crate::hls::{probe_manifest, MANIFEST_LOAD_ERROR, NETWORK_ERROR};
use crate::media::MediaElement;
use reqwest::Client;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Capability producing [`ManifestEngine`] instances
#[derive(Debug, Clone)]
pub struct ManifestEngineCapability {
    client: Client,
    enabled: bool,
}

impl ManifestEngineCapability {
    pub fn new(client: Client, enabled: bool) -> Self {
        Self { client, enabled }
    }
}

impl EngineCapability for ManifestEngineCapability {
    /// Supported when enabled and running inside a tokio runtime
    fn is_supported(&self) -> bool {
        self.enabled && Handle::try_current().is_ok()
    }

    fn create(&self, config: EngineConfig) -> Result<Box<dyn StreamingEngine>> {
        Ok(Box::new(ManifestEngine::new(self.client.clone(), config)))
    }
}

pub struct ManifestEngine {
    client: Client,
    config: EngineConfig,
    handlers: EngineHandlers,
    source: Option<String>,
    element: Option<Arc<dyn MediaElement>>,
    probe: Option<JoinHandle<()>>,
}

impl ManifestEngine {
    pub fn new(client: Client, config: EngineConfig) -> Self {
        Self {
            client,
            config,
            handlers: EngineHandlers::default(),
            source: None,
            element: None,
            probe: None,
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_attached(&self) -> bool {
        self.element.is_some()
    }

    fn cancel_probe(&mut self) {
        if let Some(probe) = self.probe.take() {
            probe.abort();
        }
    }
}

impl StreamingEngine for ManifestEngine {
    fn detach_media(&mut self) -> Result<()> {
        self.cancel_probe();
        if self.element.take().is_some() {
            trace!("Engine detached from media");
        }
        Ok(())
    }

    fn load_source(&mut self, url: &str) {
        self.cancel_probe();
        self.source = Some(url.to_string());

        let handlers = self.handlers.clone();
        let url = url.to_string();

        let Ok(runtime) = Handle::try_current() else {
            handlers.emit(&EngineEvent::Error {
                kind: NETWORK_ERROR.to_string(),
                details: MANIFEST_LOAD_ERROR.to_string(),
            });
            return;
        };

        let client = self.client.clone();
        self.probe = Some(runtime.spawn(async move {
            match probe_manifest(&client, &url).await {
                Ok(info) => {
                    debug!(
                        url = %url,
                        variants = info.variants,
                        segments = info.segments,
                        "Manifest parsed"
                    );
                    handlers.emit(&EngineEvent::ManifestParsed { url });
                }
                Err(err) => {
                    debug!(url = %url, "Manifest probe failed: {}", err.message);
                    handlers.emit(&EngineEvent::Error {
                        kind: err.kind.to_string(),
                        details: err.details.to_string(),
                    });
                }
            }
        }));
    }

    fn attach_media(&mut self, element: Arc<dyn MediaElement>) {
        if let Some(source) = &self.source {
            debug!(
                url = %source,
                max_buffer_secs = self.config.max_buffer_length.as_secs(),
                "Attaching engine to media"
            );
            element.attach_engine_source(source);
        }
        self.element = Some(element);
    }

    fn on(&mut self, kind: EngineEventKind, handler: EngineHandler) {
        self.handlers.register(kind, handler);
    }
}

impl Drop for ManifestEngine {
    fn drop(&mut self) {
        self.cancel_probe();
    }
}
