//! Status feed: where the current broken/not-broken reading comes from

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::io::HttpClient;

/// A human-readable explanation of a disruption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One reading of the monitored service's health
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub broken: bool,
    #[serde(default)]
    pub reasons: Vec<Reason>,
}

impl StatusSnapshot {
    /// Text of the first reason, if any
    pub fn primary_reason(&self) -> Option<&str> {
        self.reasons.first().map(|r| r.text.as_str())
    }
}

/// Source of status snapshots
#[async_trait]
pub trait FeedSource: Send + Sync + std::fmt::Debug {
    /// Fetch a fresh snapshot
    async fn fetch(&self) -> crate::Result<StatusSnapshot>;
}

/// Fetches the status JSON from an HTTP endpoint
pub struct HttpFeedSource {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for HttpFeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFeedSource")
            .field("url", &self.url)
            .finish()
    }
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        let url = url.into();
        tracing::debug!("Created HttpFeedSource for {}", url);
        Self { url, http }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> crate::Result<StatusSnapshot> {
        let response = self.http.get(&self.url).await?;

        if response.status != 200 {
            return Err(crate::MetroWatchError::Feed(format!(
                "{} returned status {}",
                self.url, response.status
            )));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            crate::MetroWatchError::Feed(format!("Malformed status from {}: {}", self.url, e))
        })
    }
}
