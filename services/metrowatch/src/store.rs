//! Key/value stores and the persisted notification state kept in them
//!
//! [`StateStore`] is the only thing the poll cycle talks to. It never returns
//! an error: reads that fail come back as "no prior state" and writes that
//! fail are logged and dropped, so a broken store degrades the service to
//! cold-start behavior instead of stopping it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::decision::PriorStatus;
use crate::feed::StatusSnapshot;

pub const PREVIOUSLY_BROKEN_KEY: &str = "previously-broken";
pub const PREVIOUS_NOTIFICATION_TIME_KEY: &str = "previous-notification-time";

const BROKEN_VALUE: &str = "broken";
const RECOVERED_VALUE: &str = "recovered";

/// Async key/value store with per-key expiry
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Backend name for log messages
    fn backend(&self) -> &'static str;

    /// Read a value; `Ok(None)` if the key is missing or expired
    async fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Write a value that expires after `ttl`
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> crate::Result<()>;
}

/// Store used when no backend is configured: remembers nothing
#[derive(Debug, Default)]
pub struct DisabledStore;

#[async_trait]
impl KeyValueStore for DisabledStore {
    fn backend(&self) -> &'static str {
        "disabled"
    }

    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        tracing::debug!("Store disabled, no value for '{}'", key);
        Ok(None)
    }

    async fn set_with_expiry(&self, key: &str, _value: &str, _ttl: Duration) -> crate::Result<()> {
        tracing::warn!("Store unavailable, unable to save '{}'", key);
        Ok(())
    }
}

/// In-process store; values are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires_at)) if *expires_at > now => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: drop it so the map does not grow without bound
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|(_, expires_at)| *expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> crate::Result<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}

/// Prior notification state as read back from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedState {
    pub prior: PriorStatus,
    pub last_notified_epoch_ms: Option<u64>,
}

impl PersistedState {
    /// State with nothing on record
    pub fn cold() -> Self {
        Self {
            prior: PriorStatus::Unknown,
            last_notified_epoch_ms: None,
        }
    }
}

/// Fail-soft adapter that persists the notification state in a [`KeyValueStore`]
pub struct StateStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("backend", &self.store.backend())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl StateStore {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Read a key, treating any store error as absent
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    "Reading '{}' from {} store failed, treating as absent: {}",
                    key,
                    self.store.backend(),
                    e
                );
                None
            }
        }
    }

    /// Write a key, logging failures. Returns whether the write succeeded.
    pub async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> bool {
        match self.store.set_with_expiry(key, value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Writing '{}' to {} store failed: {}",
                    key,
                    self.store.backend(),
                    e
                );
                false
            }
        }
    }

    /// Load the prior broken flag and notification time
    pub async fn load(&self) -> PersistedState {
        let prior = self
            .get(PREVIOUSLY_BROKEN_KEY)
            .await
            .map_or(PriorStatus::Unknown, |raw| decode_prior(&raw));
        let last_notified_epoch_ms = self
            .get(PREVIOUS_NOTIFICATION_TIME_KEY)
            .await
            .and_then(|raw| decode_epoch_ms(&raw));

        PersistedState {
            prior,
            last_notified_epoch_ms,
        }
    }

    /// Record a successful notification. Both keys get a fresh TTL.
    pub async fn commit(&self, broken: bool, now_epoch_ms: u64) {
        let flag_saved = self
            .set_with_expiry(PREVIOUSLY_BROKEN_KEY, encode_broken(broken), self.ttl)
            .await;
        let time_saved = self
            .set_with_expiry(
                PREVIOUS_NOTIFICATION_TIME_KEY,
                &now_epoch_ms.to_string(),
                self.ttl,
            )
            .await;

        if flag_saved && time_saved {
            tracing::debug!(
                "Saved notification state: broken={}, at={}",
                broken,
                now_epoch_ms
            );
        }
    }

    /// Publish the latest snapshot for other readers
    pub async fn cache_status(&self, key: &str, snapshot: &StatusSnapshot, ttl: Duration) {
        match serde_json::to_string(snapshot) {
            Ok(json) => {
                if self.set_with_expiry(key, &json, ttl).await {
                    tracing::debug!("Updated status cache '{}'", key);
                }
            }
            Err(e) => tracing::warn!("Serializing status for cache failed: {}", e),
        }
    }

    /// Read back the snapshot published by [`StateStore::cache_status`]
    pub async fn cached_status(&self, key: &str) -> Option<StatusSnapshot> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Cached status under '{}' is unreadable: {}", key, e);
                None
            }
        }
    }
}

fn encode_broken(broken: bool) -> &'static str {
    if broken {
        BROKEN_VALUE
    } else {
        RECOVERED_VALUE
    }
}

fn decode_prior(raw: &str) -> PriorStatus {
    match raw {
        BROKEN_VALUE => PriorStatus::Broken,
        RECOVERED_VALUE => PriorStatus::Recovered,
        other => {
            tracing::warn!(
                "Unrecognized value '{}' under '{}', treating as unknown",
                other,
                PREVIOUSLY_BROKEN_KEY
            );
            PriorStatus::Unknown
        }
    }
}

fn decode_epoch_ms(raw: &str) -> Option<u64> {
    match raw.parse() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(
                "Unrecognized value '{}' under '{}', treating as absent",
                raw,
                PREVIOUS_NOTIFICATION_TIME_KEY
            );
            None
        }
    }
}
