//! Rendering notification text from templates
//!
//! Templates understand three placeholders: `{reason}` (first reason of the
//! snapshot, truncated), `{time}` (wall-clock `HH:MM:SS`) and `{url}` (the
//! public status page).

use chrono::{DateTime, TimeZone};

use crate::config::NotificationsConfig;
use crate::decision::Decision;
use crate::feed::StatusSnapshot;
use crate::notifier::Notification;

const UNKNOWN_REASON: &str = "Syy ei tiedossa.";

/// Turns decisions into notifications
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    site_url: String,
    broken_template: String,
    recovered_template: String,
    max_reason_chars: usize,
}

impl MessageRenderer {
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self {
            site_url: config.site_url.clone(),
            broken_template: config.broken_template.clone(),
            recovered_template: config.recovered_template.clone(),
            max_reason_chars: config.max_reason_chars,
        }
    }

    /// Render the notification for `decision`, or `None` when silent
    pub fn render<Tz>(
        &self,
        decision: Decision,
        snapshot: &StatusSnapshot,
        now: &DateTime<Tz>,
    ) -> Option<Notification>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let (template, priority) = match decision {
            Decision::NotifyBroken => (&self.broken_template, 1),
            Decision::NotifyRecovered => (&self.recovered_template, 0),
            Decision::Silent => return None,
        };

        let reason: String = snapshot
            .primary_reason()
            .unwrap_or(UNKNOWN_REASON)
            .chars()
            .take(self.max_reason_chars)
            .collect();
        let time = now.format("%H:%M:%S").to_string();

        let message = template
            .replace("{reason}", &reason)
            .replace("{time}", &time)
            .replace("{url}", &self.site_url);

        Some(Notification {
            title: String::new(),
            message,
            priority,
            sound: None,
            url: Some(self.site_url.clone()),
        })
    }
}
