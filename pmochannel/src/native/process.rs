//! Playback element backed by an external player process.
//!
//! The element declares HLS support as soon as a player command is
//! configured. Setting a source stops the running player, drops the handlers
//! registered for the previous source, then probes the playlist and fires
//! the "metadata loaded" handlers once it parses. A source handed over by a
//! streaming engine is not probed again.
//! `play` starts `<command> <args...> <url>`.

use crate::constants::HLS_MIME_TYPE;
use crate::error::{Error, Result};
use crate::hls::probe_manifest;
use crate::media::{MediaElement, MetadataHandler, VideoAttributes};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Default)]
struct ProcessState {
    source: Option<String>,
    /// Bumped on every source change; stale probes compare against it
    generation: u64,
    loaded: bool,
    pending: Vec<MetadataHandler>,
    child: Option<Child>,
    probe: Option<JoinHandle<()>>,
}

impl ProcessState {
    fn kill_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.start_kill() {
                debug!("Failed to stop player process: {err}");
            }
        }
    }
}

pub struct ProcessElement {
    command: String,
    args: Vec<String>,
    client: Client,
    attributes: VideoAttributes,
    state: Arc<Mutex<ProcessState>>,
}

impl ProcessElement {
    pub fn new(command: impl Into<String>, args: Vec<String>, client: Client) -> Self {
        Self {
            command: command.into(),
            args,
            client,
            attributes: VideoAttributes::default(),
            state: Arc::new(Mutex::new(ProcessState::default())),
        }
    }

    pub fn with_attributes(mut self, attributes: VideoAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn attributes(&self) -> &VideoAttributes {
        &self.attributes
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether a player process is currently running
    pub fn is_playing(&self) -> bool {
        let mut state = self.state.lock();
        match state.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Whether the current source's playlist has been probed successfully
    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// Switch to `url`; pending metadata handlers belong to the old source
    fn replace_source(&self, url: &str, probe: bool) {
        let mut state = self.state.lock();
        if let Some(probe) = state.probe.take() {
            probe.abort();
        }
        state.kill_child();
        state.source = Some(url.to_string());
        state.generation += 1;
        state.loaded = false;
        state.pending.clear();
        if probe {
            self.spawn_probe(&mut state, url);
        }
    }

    fn spawn_probe(&self, state: &mut ProcessState, url: &str) {
        let Ok(runtime) = Handle::try_current() else {
            debug!(url = %url, "No async runtime, skipping playlist probe");
            return;
        };

        let shared = self.state.clone();
        let client = self.client.clone();
        let generation = state.generation;
        let url = url.to_string();
        state.probe = Some(runtime.spawn(async move {
            match probe_manifest(&client, &url).await {
                Ok(info) => {
                    let handlers = {
                        let mut state = shared.lock();
                        if state.generation != generation {
                            return;
                        }
                        state.loaded = true;
                        std::mem::take(&mut state.pending)
                    };
                    trace!(url = %url, segments = info.segments, "Metadata loaded");
                    for handler in handlers {
                        handler();
                    }
                }
                Err(err) => debug!(url = %url, "Playlist probe failed: {}", err.message),
            }
        }));
    }
}

#[async_trait]
impl MediaElement for ProcessElement {
    fn can_play_type(&self, mime: &str) -> bool {
        mime.eq_ignore_ascii_case(HLS_MIME_TYPE) && !self.command.trim().is_empty()
    }

    fn set_source(&self, url: &str) {
        self.replace_source(url, true);
    }

    /// The engine probes the playlist itself
    fn attach_engine_source(&self, url: &str) {
        self.replace_source(url, false);
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    fn once_loaded_metadata(&self, handler: MetadataHandler) {
        let mut state = self.state.lock();
        if state.loaded {
            drop(state);
            handler();
        } else {
            state.pending.push(handler);
        }
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.state.lock();
        let url = state
            .source
            .clone()
            .ok_or_else(|| Error::other("no source to play"))?;

        if let Some(child) = state.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(());
            }
        }

        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        debug!(command = %self.command, url = %url, pid = child.id(), "Player process started");
        state.child = Some(child);
        Ok(())
    }
}

impl Drop for ProcessElement {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(probe) = state.probe.take() {
            probe.abort();
        }
        state.kill_child();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_can_play_type_requires_a_command() {
        let element = ProcessElement::new("ffplay", Vec::new(), Client::new());
        assert!(element.can_play_type(HLS_MIME_TYPE));
        assert!(!element.can_play_type("video/mp4"));

        let element = ProcessElement::new("  ", Vec::new(), Client::new());
        assert!(!element.can_play_type(HLS_MIME_TYPE));
    }

    #[tokio::test]
    async fn test_play_without_source_is_rejected() {
        let element = ProcessElement::new("ffplay", Vec::new(), Client::new());
        assert!(element.play().await.is_err());
    }

    #[tokio::test]
    async fn test_play_with_missing_command_fails_to_spawn() {
        let element = ProcessElement::new(
            "pmochannel-no-such-player",
            Vec::new(),
            Client::new(),
        );
        element.set_source("http://127.0.0.1:9/live.m3u8");
        assert!(matches!(element.play().await, Err(Error::Io(_))));
        assert!(!element.is_playing());
    }

    #[test]
    fn test_handlers_wait_for_metadata() {
        let element = ProcessElement::new("ffplay", Vec::new(), Client::new());
        let calls = Arc::new(AtomicUsize::new(0));

        // No runtime: no probe is spawned, the handler stays pending.
        element.set_source("http://127.0.0.1:9/live.m3u8");
        let c = calls.clone();
        element.once_loaded_metadata(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(element.source().as_deref(), Some("http://127.0.0.1:9/live.m3u8"));
        assert!(!element.is_loaded());
    }

    #[test]
    fn test_source_change_drops_stale_handlers() {
        let element = ProcessElement::new("ffplay", Vec::new(), Client::new());
        let calls = Arc::new(AtomicUsize::new(0));

        element.set_source("http://127.0.0.1:9/first.m3u8");
        for _ in 0..3 {
            let c = calls.clone();
            element.once_loaded_metadata(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(element.state.lock().pending.len(), 3);

        element.set_source("http://127.0.0.1:9/second.m3u8");
        let c = calls.clone();
        element.once_loaded_metadata(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(element.state.lock().pending.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_engine_source_is_not_fetched_again() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .mount(&server)
            .await;

        let url = format!("{}/live.m3u8", server.uri());
        let element = ProcessElement::new("ffplay", Vec::new(), Client::new());
        element.attach_engine_source(&url);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert_eq!(element.source().as_deref(), Some(url.as_str()));
        assert!(element.state.lock().probe.is_none());
        let requests = server.received_requests().await.unwrap_or_default();
        assert!(requests.is_empty());
    }
}
