//! Release-index feed client and tolerant entry parsing.

use crate::{ReleaseFeed, ResolveError};
use async_trait::async_trait;
use chrono::NaiveDate;
use fs_err as fs;
use netup_types::{Channel, ReleaseKind, SupportPhase};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One published release line, as the resolver sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidate {
    pub channel: Channel,
    pub sdk_version: semver::Version,
    pub release_kind: ReleaseKind,
    pub support_phase: SupportPhase,
    pub eol_date: Option<NaiveDate>,
}

impl ReleaseCandidate {
    pub fn is_prerelease(&self) -> bool {
        !self.sdk_version.pre.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct IndexDocument {
    #[serde(rename = "releases-index")]
    releases_index: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    #[serde(rename = "channel-version")]
    channel_version: Channel,

    #[serde(rename = "latest-sdk")]
    latest_sdk: semver::Version,

    #[serde(rename = "release-type")]
    release_type: ReleaseKind,

    #[serde(rename = "support-phase")]
    support_phase: SupportPhase,

    #[serde(rename = "eol-date", default)]
    eol_date: Option<NaiveDate>,
}

/// Parse a release-index document. Entries missing or mangling a required
/// field are skipped with a warning; they never fail the whole feed.
pub fn parse_index(json: &str) -> Vec<ReleaseCandidate> {
    let document: IndexDocument = match serde_json::from_str(json) {
        Ok(doc) => doc,
        Err(err) => {
            warn!("release index is not valid JSON: {err}");
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for raw in document.releases_index {
        match serde_json::from_value::<IndexEntry>(raw) {
            Ok(entry) => candidates.push(ReleaseCandidate {
                channel: entry.channel_version,
                sdk_version: entry.latest_sdk,
                release_kind: entry.release_type,
                support_phase: entry.support_phase,
                eol_date: entry.eol_date,
            }),
            Err(err) => {
                warn!("skipping unreadable release-index entry: {err}");
            }
        }
    }
    candidates
}

/// HTTP-backed [`ReleaseFeed`].
pub struct HttpReleaseFeed {
    http: reqwest::Client,
    index_url: String,
    daily_base_url: String,
}

impl HttpReleaseFeed {
    pub fn new(index_url: impl Into<String>, daily_base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            index_url: index_url.into(),
            daily_base_url: daily_base_url.into(),
        }
    }
}

#[async_trait]
impl ReleaseFeed for HttpReleaseFeed {
    async fn candidates(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReleaseCandidate>, ResolveError> {
        // A non-HTTP index is a local mirror file.
        if !self.index_url.starts_with("http") {
            return Ok(match fs::read_to_string(&self.index_url) {
                Ok(text) => parse_index(&text),
                Err(err) => {
                    warn!("release index file unreadable: {err}");
                    Vec::new()
                }
            });
        }

        let request = self.http.get(&self.index_url).send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            r = request => r,
        };

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("release index fetch returned HTTP {}", r.status());
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!("release index fetch failed: {err}");
                return Ok(Vec::new());
            }
        };

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            b = response.text() => b,
        };
        match body {
            Ok(text) => Ok(parse_index(&text)),
            Err(err) => {
                warn!("release index body unreadable: {err}");
                Ok(Vec::new())
            }
        }
    }

    async fn daily_sdk_version(
        &self,
        channel: Channel,
        cancel: &CancellationToken,
    ) -> Result<Option<semver::Version>, ResolveError> {
        let url = format!("{}/{}/daily/sdk-version.txt", self.daily_base_url, channel);
        debug!(%url, "querying daily build version");

        let request = self.http.get(&url).send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            r = request => r,
        };
        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("daily build endpoint returned HTTP {}", r.status());
                return Ok(None);
            }
            Err(err) => {
                warn!("daily build endpoint unreachable: {err}");
                return Ok(None);
            }
        };

        // Only a plain version body is trusted; an HTML error page or a
        // redirect to something else must not be mistaken for a version.
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("text/plain")
            && !content_type.starts_with("application/octet-stream")
        {
            warn!("daily build endpoint returned unexpected content type '{content_type}'");
            return Ok(None);
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            b = response.text() => b,
        };
        let text = match body {
            Ok(t) => t,
            Err(err) => {
                warn!("daily build body unreadable: {err}");
                return Ok(None);
            }
        };

        match text.trim().parse::<semver::Version>() {
            Ok(version) => Ok(Some(version)),
            Err(err) => {
                warn!("daily build version '{}' unparsable: {err}", text.trim());
                Ok(None)
            }
        }
    }
}
