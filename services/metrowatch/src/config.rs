//! Configuration types for the metrowatch service

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Upstream status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
        }
    }
}

/// Poll scheduling and notification debounce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub interval: Duration,
    #[serde(default = "default_min_renotify_interval", with = "humantime_serde")]
    pub min_renotify_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            min_renotify_interval: default_min_renotify_interval(),
        }
    }
}

/// Where notification state is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_state_ttl", with = "humantime_serde")]
    pub state_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            state_ttl: default_state_ttl(),
        }
    }
}

/// Store backend with tagged enum for extensibility
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Disabled,
    Memory,
    Redis {
        #[serde(default = "default_redis_host")]
        host: String,
        #[serde(default = "default_redis_port")]
        port: u16,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        database: u32,
        /// Deadline for connecting and for each command
        #[serde(default = "default_redis_timeout", with = "humantime_serde")]
        timeout: Duration,
    },
}

/// Notification rendering and delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// When false, notifications are logged instead of sent
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_broken_template")]
    pub broken_template: String,
    #[serde(default = "default_recovered_template")]
    pub recovered_template: String,
    #[serde(default = "default_max_reason_chars")]
    pub max_reason_chars: usize,
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            site_url: default_site_url(),
            broken_template: default_broken_template(),
            recovered_template: default_recovered_template(),
            max_reason_chars: default_max_reason_chars(),
            notifiers: Vec::new(),
        }
    }
}

/// Notifier configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotifierConfig {
    #[serde(rename = "pushover")]
    Pushover {
        api_token: String,
        user_key: String,
        #[serde(default = "default_pushover_title")]
        default_title: String,
        #[serde(default)]
        default_priority: i8,
        #[serde(default = "default_pushover_sound")]
        default_sound: String,
    },
    #[serde(rename = "mastodon")]
    Mastodon {
        instance_url: String,
        access_token: String,
        #[serde(default = "default_visibility")]
        visibility: String,
    },
}

impl NotifierConfig {
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Pushover { .. } => "pushover",
            NotifierConfig::Mastodon { .. } => "mastodon",
        }
    }
}

/// Status API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_status_port")]
    pub port: u16,
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub cache_ttl: Duration,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_status_port(),
            cache_key: default_cache_key(),
            cache_ttl: default_cache_ttl(),
            history_size: default_history_size(),
        }
    }
}

fn default_feed_url() -> String {
    "http://localhost:3000/api/status".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_min_renotify_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_state_ttl() -> Duration {
    Duration::from_secs(60 * 60 * 24)
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_site_url() -> String {
    "https://onkometrorikki.fi".to_string()
}

fn default_broken_template() -> String {
    "JUURI NYT – Metrossa häiriö:\n{reason}\nKatso: {url} #länsimetro #hsl #metrohelsinki"
        .to_string()
}

fn default_recovered_template() -> String {
    "JUURI NYT – Metro toimii jälleen! Katso: {url} Kello on nyt {time}. #länsimetro #hsl #metrohelsinki"
        .to_string()
}

fn default_max_reason_chars() -> usize {
    170
}

fn default_pushover_title() -> String {
    "Metro Status".to_string()
}

fn default_pushover_sound() -> String {
    "pushover".to_string()
}

fn default_visibility() -> String {
    "public".to_string()
}

fn default_true() -> bool {
    true
}

fn default_status_port() -> u16 {
    11120
}

fn default_cache_key() -> String {
    "status".to_string()
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_history_size() -> usize {
    100
}

impl Config {
    /// Replace `${VAR}` secret values with the named environment variable
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        for notifier in &mut self.notifications.notifiers {
            match notifier {
                NotifierConfig::Pushover {
                    api_token,
                    user_key,
                    ..
                } => {
                    resolve_secret(api_token)?;
                    resolve_secret(user_key)?;
                }
                NotifierConfig::Mastodon { access_token, .. } => resolve_secret(access_token)?,
            }
        }

        if let StoreBackend::Redis {
            password: Some(password),
            ..
        } = &mut self.store.backend
        {
            resolve_secret(password)?;
        }

        Ok(())
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.poll.interval.is_zero() {
            return Err(crate::MetroWatchError::Config(
                "poll.interval must be greater than zero".to_string(),
            ));
        }
        if self.store.state_ttl.is_zero() {
            return Err(crate::MetroWatchError::Config(
                "store.state_ttl must be greater than zero".to_string(),
            ));
        }
        if self.notifications.enabled && self.notifications.notifiers.is_empty() {
            return Err(crate::MetroWatchError::Config(
                "notifications are enabled but no notifiers are configured".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_secret(value: &mut String) -> crate::Result<()> {
    let Some(var) = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return Ok(());
    };

    let resolved = std::env::var(var).map_err(|_| {
        crate::MetroWatchError::Config(format!("Environment variable {} is not set", var))
    })?;
    tracing::debug!("Resolved secret from environment variable {}", var);
    *value = resolved;
    Ok(())
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::MetroWatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
