//! Outbound track metadata lookup client.
//!
//! Issues one search request per call against an iTunes-style search
//! endpoint and consumes only the first result. Lookups are cooperatively
//! cancellable through a [`CancellationScope`].

use std::io::Read;
use std::time::Duration;

use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::cancellation::CancellationScope;
use crate::config::NetworkConfig;
use crate::protocol::TrackMetadata;

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://itunes.apple.com";

/// Failure modes of one lookup call.
///
/// `Cancelled` is silence to callers; everything else surfaces as one
/// generic user-visible lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("lookup cancelled")]
    Cancelled,
    #[error("lookup request failed: {0}")]
    Transport(String),
    #[error("lookup response malformed: {0}")]
    Malformed(String),
}

/// Interface implemented by concrete track lookup sources.
pub trait TrackLookup: Send + Sync {
    /// Resolves a title to its best match, or `None` when nothing was found.
    /// Blank titles short-circuit to `None` without touching the network.
    fn lookup(
        &self,
        title: &str,
        scope: &CancellationScope,
    ) -> Result<Option<TrackMetadata>, LookupError>;
}

/// Search-endpoint lookup backed by `ureq`.
pub struct SearchClient {
    base_url: String,
    http_client: ureq::Agent,
}

impl SearchClient {
    /// Creates a client against the public search endpoint.
    pub fn new(network: &NetworkConfig) -> Self {
        Self::with_base_url(DEFAULT_SEARCH_BASE_URL, network)
    }

    /// Creates a client against an explicit endpoint; tests point this at a
    /// local listener.
    pub fn with_base_url(base_url: &str, network: &NetworkConfig) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(network.connect_timeout_ms))
            .timeout(Duration::from_millis(network.request_timeout_ms))
            .build();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn search_url(&self, title: &str) -> String {
        format!(
            "{}/search?term={}&media=music&limit=1",
            self.base_url,
            urlencoding::encode(title)
        )
    }

    fn parse_search_response(body: &str) -> Result<Option<TrackMetadata>, LookupError> {
        let document: Value =
            serde_json::from_str(body).map_err(|err| LookupError::Malformed(err.to_string()))?;

        let Some(first) = document["results"]
            .as_array()
            .and_then(|results| results.first())
        else {
            return Ok(None);
        };

        let text_field =
            |key: &str| -> String { first[key].as_str().unwrap_or_default().to_string() };

        Ok(Some(TrackMetadata {
            track_name: text_field("trackName"),
            artist_name: text_field("artistName"),
            album_name: text_field("collectionName"),
            artwork_url: first["artworkUrl100"].as_str().map(|url| url.to_string()),
        }))
    }
}

impl TrackLookup for SearchClient {
    fn lookup(
        &self,
        title: &str,
        scope: &CancellationScope,
    ) -> Result<Option<TrackMetadata>, LookupError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if scope.is_cancelled() {
            return Err(LookupError::Cancelled);
        }

        let url = self.search_url(trimmed);
        debug!("Looking up track info: {}", url);
        let response = self
            .http_client
            .get(&url)
            .set("Accept", "application/json")
            .call()
            .map_err(|error| LookupError::Transport(error.to_string()))?;

        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|error| LookupError::Transport(format!("failed to read response: {error}")))?;

        // The transport cannot abort mid-request; a scope fired while the
        // request was in flight still abandons the result here.
        if scope.is_cancelled() {
            return Err(LookupError::Cancelled);
        }

        Self::parse_search_response(&body)
    }
}
