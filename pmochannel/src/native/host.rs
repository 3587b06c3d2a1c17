//! Host made of a single named container, without any page.

use super::process::ProcessElement;
use crate::media::{Container, Host, MediaElement, VideoAttributes};
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// Container whose injected element is an external player process
pub struct HeadlessContainer {
    command: String,
    args: Vec<String>,
    client: Client,
    video: Mutex<Option<Arc<ProcessElement>>>,
}

impl HeadlessContainer {
    pub fn new(command: impl Into<String>, args: Vec<String>, client: Client) -> Self {
        Self {
            command: command.into(),
            args,
            client,
            video: Mutex::new(None),
        }
    }

    /// The injected element, with its concrete type
    pub fn process_element(&self) -> Option<Arc<ProcessElement>> {
        self.video.lock().clone()
    }
}

impl Container for HeadlessContainer {
    fn video(&self) -> Option<Arc<dyn MediaElement>> {
        self.video
            .lock()
            .clone()
            .map(|video| video as Arc<dyn MediaElement>)
    }

    fn inject_video(&self, attributes: &VideoAttributes) -> Arc<dyn MediaElement> {
        debug!(command = %self.command, ?attributes, "Injecting playback element");
        let element = Arc::new(
            ProcessElement::new(self.command.clone(), self.args.clone(), self.client.clone())
                .with_attributes(attributes.clone()),
        );
        *self.video.lock() = Some(element.clone());
        element
    }
}

pub struct HeadlessHost {
    container_id: String,
    container: Arc<HeadlessContainer>,
}

impl HeadlessHost {
    pub fn new(container_id: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self::with_client(container_id, command, args, Client::new())
    }

    pub fn with_client(
        container_id: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        client: Client,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            container: Arc::new(HeadlessContainer::new(command, args, client)),
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn headless_container(&self) -> &Arc<HeadlessContainer> {
        &self.container
    }
}

impl Host for HeadlessHost {
    fn container(&self, id: &str) -> Option<Arc<dyn Container>> {
        (id == self.container_id).then(|| self.container.clone() as Arc<dyn Container>)
    }
}
