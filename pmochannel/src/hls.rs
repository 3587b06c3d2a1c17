//! Minimal HLS playlist probing.
//!
//! The playlist is parsed with `m3u8_rs` only to tell whether a stream URL
//! points at something playable; segment scheduling is left to the player.

use m3u8_rs::Playlist;
use reqwest::header::{HeaderValue, CACHE_CONTROL};
use reqwest::Client;

/// Error type reported for transport failures
pub const NETWORK_ERROR: &str = "networkError";
/// Error type reported for unusable playlists
pub const MEDIA_ERROR: &str = "mediaError";
/// Details reported when the playlist could not be downloaded
pub const MANIFEST_LOAD_ERROR: &str = "manifestLoadError";
/// Details reported when the playlist could not be parsed
pub const MANIFEST_PARSING_ERROR: &str = "manifestParsingError";

/// Summary of a parsed playlist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestInfo {
    /// `#EXT-X-STREAM-INF` entries (master playlist)
    pub variants: usize,
    /// `#EXTINF` entries (media playlist)
    pub segments: usize,
    pub target_duration: Option<u64>,
    /// `#EXT-X-ENDLIST` present
    pub ended: bool,
}

impl ManifestInfo {
    /// Parse a playlist body
    ///
    /// A media playlist without segments yet (a live stream that just
    /// started) is valid; only a body that is not a playlist fails.
    pub fn parse(body: &[u8]) -> Result<Self, String> {
        match m3u8_rs::parse_playlist_res(body) {
            Ok(Playlist::MasterPlaylist(master)) => Ok(Self {
                variants: master.variants.len(),
                ..Self::default()
            }),
            Ok(Playlist::MediaPlaylist(media)) => Ok(Self {
                variants: 0,
                segments: media.segments.len(),
                target_duration: Some(media.target_duration as u64),
                ended: media.end_list,
            }),
            Err(e) => Err(format!("playlist parse error: {e:?}")),
        }
    }

    pub fn is_master(&self) -> bool {
        self.variants > 0
    }
}

/// Why a probe failed, in the vocabulary of streaming engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    pub kind: &'static str,
    pub details: &'static str,
    pub message: String,
}

impl ProbeError {
    fn network(message: impl Into<String>) -> Self {
        Self {
            kind: NETWORK_ERROR,
            details: MANIFEST_LOAD_ERROR,
            message: message.into(),
        }
    }

    fn parsing(message: impl Into<String>) -> Self {
        Self {
            kind: MEDIA_ERROR,
            details: MANIFEST_PARSING_ERROR,
            message: message.into(),
        }
    }
}

/// Download and parse the playlist at `url`
pub async fn probe_manifest(client: &Client, url: &str) -> Result<ManifestInfo, ProbeError> {
    let response = client
        .get(url)
        .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
        .send()
        .await
        .map_err(|e| ProbeError::network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::network(format!("HTTP {status} on {url}")));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ProbeError::network(e.to_string()))?;

    ManifestInfo::parse(&body).map_err(ProbeError::parsing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\n\
        720p.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=640000,RESOLUTION=640x360\n\
        360p.m3u8\n";

    const MEDIA: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:6\n\
        #EXTINF:6.0,\n\
        seg1.ts\n\
        #EXTINF:6.0,\n\
        seg2.ts\n";

    #[test]
    fn test_parse_master_playlist() {
        let info = ManifestInfo::parse(MASTER.as_bytes()).unwrap();
        assert!(info.is_master());
        assert_eq!(info.variants, 2);
        assert_eq!(info.segments, 0);
    }

    #[test]
    fn test_parse_media_playlist() {
        let info = ManifestInfo::parse(MEDIA.as_bytes()).unwrap();
        assert!(!info.is_master());
        assert_eq!(info.segments, 2);
        assert_eq!(info.target_duration, Some(6));
        assert!(!info.ended);
    }

    #[test]
    fn test_live_playlist_without_segments_yet() {
        let info = ManifestInfo::parse(
            b"#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n#EXT-X-MEDIA-SEQUENCE:0\n",
        )
        .unwrap();
        assert!(!info.is_master());
        assert_eq!(info.segments, 0);
        assert_eq!(info.target_duration, Some(6));
        assert!(!info.ended);
    }

    #[test]
    fn test_rejects_non_playlists() {
        assert!(ManifestInfo::parse(b"<html></html>").is_err());
        assert!(ManifestInfo::parse(b"").is_err());
    }
}
