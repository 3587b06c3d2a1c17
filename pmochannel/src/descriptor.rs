//! Channel descriptor model and HTTP client
//!
//! A descriptor is a small JSON document, published at
//! `<base_url>/data/<channel>.json`, naming the current stream URL of the
//! channel in its `m3u8` field. Every other field is ignored.
//!
//! # Example
//!
//! ```no_run
//! use pmochannel::{ChannelId, DescriptorClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DescriptorClient::builder(ChannelId::new("News"))
//!         .base_url("https://tv.example.org/")
//!         .build()?;
//!
//!     // GET https://tv.example.org/data/news.json, bypassing caches
//!     let descriptor = client.fetch_descriptor().await?;
//!     println!("Stream: {}", descriptor.stream_url);
//!     Ok(())
//! }
//! ```

use crate::channel::ChannelId;
use crate::constants::DEFAULT_USER_AGENT;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Name of the descriptor field carrying the stream URL
pub const STREAM_URL_FIELD: &str = "m3u8";

/// Default descriptor base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";

/// Parsed channel descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Trimmed, non-empty stream URL
    pub stream_url: String,
}

impl Descriptor {
    /// Parse a descriptor body
    ///
    /// Invalid JSON, a non-object document, or a missing, non-string or
    /// blank `m3u8` field are all reported as [`Error::MalformedDescriptor`].
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed("descriptor is not a JSON object"))?;

        let stream_url = match object.get(STREAM_URL_FIELD) {
            Some(Value::String(s)) => s.trim(),
            Some(Value::Null) | None => "",
            Some(_) => {
                return Err(Error::malformed(format!(
                    "field {STREAM_URL_FIELD} is not a string"
                )))
            }
        };

        if stream_url.is_empty() {
            return Err(Error::malformed(format!("field {STREAM_URL_FIELD} is empty")));
        }

        Ok(Self {
            stream_url: stream_url.to_string(),
        })
    }
}

/// Anything able to produce the current descriptor of a channel
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    /// Where the descriptor comes from, for logging
    fn location(&self) -> String;

    async fn fetch(&self) -> Result<Descriptor>;
}

/// HTTP descriptor client
///
/// Requests always bypass caches (`Cache-Control: no-cache, no-store`,
/// `Pragma: no-cache`). No timeout is applied unless one is configured.
#[derive(Debug, Clone)]
pub struct DescriptorClient {
    client: Client,
    url: Url,
    timeout: Option<Duration>,
}

impl DescriptorClient {
    /// Create a builder for the descriptor of `channel`
    pub fn builder(channel: ChannelId) -> DescriptorClientBuilder {
        DescriptorClientBuilder::new(channel)
    }

    /// Full descriptor URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    fn no_store_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers
    }

    /// Fetch and parse the descriptor
    pub async fn fetch_descriptor(&self) -> Result<Descriptor> {
        tracing::trace!("Fetching descriptor: {}", self.url);

        let mut request = self
            .client
            .get(self.url.clone())
            .headers(Self::no_store_headers());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Descriptor::from_json(&body)
    }
}

#[async_trait]
impl DescriptorSource for DescriptorClient {
    fn location(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<Descriptor> {
        self.fetch_descriptor().await
    }
}

/// Builder for configuring a DescriptorClient
#[derive(Debug)]
pub struct DescriptorClientBuilder {
    channel: ChannelId,
    client: Option<Client>,
    base_url: String,
    timeout: Option<Duration>,
    user_agent: String,
}

impl DescriptorClientBuilder {
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            client: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set a custom HTTP client
    ///
    /// Useful for sharing connection pools with the manifest engine.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the base URL the `data/<channel>.json` path is resolved against
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set a per-request timeout (none by default)
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<DescriptorClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().user_agent(&self.user_agent).build()?,
        };

        Ok(DescriptorClient {
            client,
            url: descriptor_url(&self.base_url, &self.channel)?,
            timeout: self.timeout,
        })
    }
}

/// Resolve the descriptor URL of `channel` against `base_url`
///
/// The base is treated as a directory even without a trailing slash.
pub fn descriptor_url(base_url: &str, channel: &ChannelId) -> Result<Url> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?.join(&channel.descriptor_path())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_trimmed_stream_url() {
        let descriptor = Descriptor::from_json(
            br#"{"m3u8": "  https://cdn.example.org/live/news.m3u8 \n", "title": "News"}"#,
        )
        .unwrap();
        assert_eq!(
            descriptor.stream_url,
            "https://cdn.example.org/live/news.m3u8"
        );
    }

    #[test]
    fn test_malformed_descriptors() {
        for body in [
            &br#"{"m3u8": ""}"#[..],
            br#"{"m3u8": "   "}"#,
            br#"{}"#,
            br#"{"m3u8": null}"#,
            br#"{"m3u8": 42}"#,
            br#"["https://cdn.example.org/a.m3u8"]"#,
            br#"null"#,
            b"<html>not json</html>",
        ] {
            let result = Descriptor::from_json(body);
            assert!(
                matches!(result, Err(Error::MalformedDescriptor(_))),
                "expected MalformedDescriptor for {:?}, got {:?}",
                String::from_utf8_lossy(body),
                result
            );
        }
    }

    #[test]
    fn test_descriptor_url() {
        let channel = ChannelId::new("News");
        assert_eq!(
            descriptor_url("https://tv.example.org/player", &channel)
                .unwrap()
                .as_str(),
            "https://tv.example.org/player/data/news.json"
        );
        assert_eq!(
            descriptor_url("http://localhost:8080/", &channel)
                .unwrap()
                .as_str(),
            "http://localhost:8080/data/news.json"
        );
        assert!(matches!(
            descriptor_url("not a url", &channel),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let client = DescriptorClient::builder(ChannelId::default())
            .build()
            .unwrap();
        assert_eq!(client.url().as_str(), "http://localhost:8080/data/latest.json");
        assert!(client.timeout.is_none());
    }
}
