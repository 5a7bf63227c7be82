//! Pushover notification client

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::NotifierConfig;
use crate::io::HttpClient;
use crate::notifier::{Notification, Notifier};

const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Pushover notification sender
pub struct PushoverNotifier {
    api_token: String,
    user_key: String,
    default_title: String,
    default_priority: i8,
    default_sound: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for PushoverNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverNotifier")
            .field("default_title", &self.default_title)
            .finish()
    }
}

impl PushoverNotifier {
    /// Build from a `pushover` notifier config; `None` for any other type
    pub fn from_config(config: &NotifierConfig, http: Arc<dyn HttpClient>) -> Option<Self> {
        let NotifierConfig::Pushover {
            api_token,
            user_key,
            default_title,
            default_priority,
            default_sound,
        } = config
        else {
            return None;
        };

        tracing::debug!("Created PushoverNotifier with title '{}'", default_title);

        Some(Self {
            api_token: api_token.clone(),
            user_key: user_key.clone(),
            default_title: default_title.clone(),
            default_priority: *default_priority,
            default_sound: default_sound.clone(),
            http,
        })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn type_name(&self) -> &str {
        "pushover"
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        let title = if notification.title.is_empty() {
            &self.default_title
        } else {
            &notification.title
        };
        let priority = if notification.priority != 0 {
            notification.priority
        } else {
            self.default_priority
        };
        let sound = notification.sound.as_deref().unwrap_or(&self.default_sound);

        let priority_str = priority.to_string();
        let mut params = vec![
            ("token", self.api_token.as_str()),
            ("user", self.user_key.as_str()),
            ("title", title),
            ("message", notification.message.as_str()),
            ("priority", &priority_str),
            ("sound", sound),
        ];
        if let Some(url) = &notification.url {
            params.push(("url", url.as_str()));
        }

        tracing::debug!(
            "Sending Pushover notification: title='{}', priority={}",
            title,
            priority
        );

        let response = self.http.post_form(PUSHOVER_API_URL, &[], &params).await?;

        if response.status != 200 {
            return Err(crate::MetroWatchError::Notifier(format!(
                "Pushover API returned status {}: {}",
                response.status, response.body
            )));
        }

        tracing::debug!("Pushover notification sent successfully");
        Ok(())
    }
}
