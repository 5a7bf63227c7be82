//! Mastodon status poster

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::NotifierConfig;
use crate::io::HttpClient;
use crate::notifier::{Notification, Notifier};

/// Mastodon rejects statuses longer than this by default
const MAX_STATUS_CHARS: usize = 500;

/// Posts notifications as public statuses on a Mastodon instance
pub struct MastodonNotifier {
    statuses_url: String,
    authorization: String,
    visibility: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for MastodonNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MastodonNotifier")
            .field("statuses_url", &self.statuses_url)
            .field("visibility", &self.visibility)
            .finish()
    }
}

impl MastodonNotifier {
    /// Build from a `mastodon` notifier config; `None` for any other type
    pub fn from_config(config: &NotifierConfig, http: Arc<dyn HttpClient>) -> Option<Self> {
        let NotifierConfig::Mastodon {
            instance_url,
            access_token,
            visibility,
        } = config
        else {
            return None;
        };

        let statuses_url = format!("{}/api/v1/statuses", instance_url.trim_end_matches('/'));
        tracing::debug!("Created MastodonNotifier posting to {}", statuses_url);

        Some(Self {
            statuses_url,
            authorization: format!("Bearer {}", access_token),
            visibility: visibility.clone(),
            http,
        })
    }
}

#[async_trait]
impl Notifier for MastodonNotifier {
    fn type_name(&self) -> &str {
        "mastodon"
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        let status: String = notification
            .message
            .chars()
            .take(MAX_STATUS_CHARS)
            .collect();
        let headers = [("Authorization", self.authorization.as_str())];
        let params = [
            ("status", status.as_str()),
            ("visibility", self.visibility.as_str()),
        ];

        tracing::debug!(
            "Posting Mastodon status ({} chars, {})",
            status.chars().count(),
            self.visibility
        );

        let response = self
            .http
            .post_form(&self.statuses_url, &headers, &params)
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(crate::MetroWatchError::Notifier(format!(
                "Mastodon API returned status {}: {}",
                response.status, response.body
            )));
        }

        tracing::debug!("Mastodon status posted");
        Ok(())
    }
}
