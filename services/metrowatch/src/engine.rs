//! Engine: runs the poll-and-decide cycle and dispatches notifications

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::decision::{decide, Decision};
use crate::feed::{FeedSource, StatusSnapshot};
use crate::message::MessageRenderer;
use crate::notifier::{Notification, NotificationRecord, Notifier};
use crate::state::StateHandle;
use crate::store::StateStore;

/// Consecutive fetch failures after which the log escalates
const FETCH_ERROR_ALERT_THRESHOLD: u32 = 5;

/// What a single cycle ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "decision", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The feed could not be read; nothing else happened
    FetchFailed,
    Silent,
    /// At least one notifier accepted the message and the state was saved
    Notified(Decision),
    /// Every notifier failed; the state was left alone
    SendFailed(Decision),
    /// Notifications are disabled; the state was saved as if sent
    Simulated(Decision),
}

impl CycleOutcome {
    pub fn decision(&self) -> Option<Decision> {
        match self {
            CycleOutcome::FetchFailed => None,
            CycleOutcome::Silent => Some(Decision::Silent),
            CycleOutcome::Notified(d) | CycleOutcome::SendFailed(d) | CycleOutcome::Simulated(d) => {
                Some(*d)
            }
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::FetchFailed => write!(f, "fetch failed"),
            CycleOutcome::Silent => write!(f, "silent"),
            CycleOutcome::Notified(d) => write!(f, "{} sent", d),
            CycleOutcome::SendFailed(d) => write!(f, "{} failed to send", d),
            CycleOutcome::Simulated(d) => write!(f, "{} simulated", d),
        }
    }
}

#[derive(Debug, Clone)]
struct EngineSettings {
    min_renotify_interval: Duration,
    notifications_enabled: bool,
    cache_key: String,
    cache_ttl: Duration,
}

/// The engine owns everything a cycle touches
#[derive(Debug)]
pub struct Engine {
    feed: Arc<dyn FeedSource>,
    store: Arc<StateStore>,
    notifiers: Vec<Arc<dyn Notifier>>,
    renderer: MessageRenderer,
    settings: EngineSettings,
    state: StateHandle,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        store: Arc<StateStore>,
        notifiers: Vec<Arc<dyn Notifier>>,
        config: &Config,
        state: StateHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            feed,
            store,
            notifiers,
            renderer: MessageRenderer::from_config(&config.notifications),
            settings: EngineSettings {
                min_renotify_interval: config.poll.min_renotify_interval,
                notifications_enabled: config.notifications.enabled,
                cache_key: config.status.cache_key.clone(),
                cache_ttl: config.status.cache_ttl,
            },
            state,
            cancel,
        }
    }

    /// Run cycles until the cancellation token is triggered. The first cycle
    /// starts immediately; each following one starts `interval` after the
    /// previous one finished.
    pub async fn run(&self, interval: Duration) {
        tracing::info!(
            "Polling {:?} every {:?} (store: {}, notifiers: {}, notifications {})",
            self.feed,
            interval,
            self.store.backend(),
            self.notifiers.len(),
            if self.settings.notifications_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );

        loop {
            let outcome = self.run_cycle().await;
            tracing::debug!("Cycle finished: {}", outcome);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Polling loop cancelled");
                    break;
                }
            }
        }
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle as if the clock read `now`
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleOutcome {
        let now_ms = epoch_ms(&now);

        let snapshot = match self.feed.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let errors = self.state.write().await.record_fetch_error(now_ms);
                if errors == FETCH_ERROR_ALERT_THRESHOLD {
                    tracing::warn!("Status feed has failed {} times in a row: {}", errors, e);
                } else {
                    tracing::warn!("Fetching status failed: {}", e);
                }
                return CycleOutcome::FetchFailed;
            }
        };

        self.store
            .cache_status(&self.settings.cache_key, &snapshot, self.settings.cache_ttl)
            .await;

        let persisted = self.store.load().await;
        let decision = decide(
            snapshot.broken,
            persisted.prior,
            persisted.last_notified_epoch_ms,
            self.settings.min_renotify_interval,
            now_ms,
        );

        tracing::debug!(
            "broken={} prior={} last_notified={:?} -> {}",
            snapshot.broken,
            persisted.prior,
            persisted.last_notified_epoch_ms,
            decision
        );
        self.state
            .write()
            .await
            .record_poll(snapshot.broken, decision, now_ms);

        let Some(notification) =
            self.renderer
                .render(decision, &snapshot, &now.with_timezone(&Local))
        else {
            return CycleOutcome::Silent;
        };

        self.deliver(decision, &snapshot, &notification, now_ms).await
    }

    async fn deliver(
        &self,
        decision: Decision,
        snapshot: &StatusSnapshot,
        notification: &Notification,
        now_ms: u64,
    ) -> CycleOutcome {
        if !self.settings.notifications_enabled {
            tracing::info!(
                "Notifications disabled, would have sent: {}",
                notification.message
            );
            self.record(NotificationRecord {
                decision,
                notifier_type: "disabled".to_string(),
                message: notification.message.clone(),
                success: true,
                error: None,
                timestamp_epoch_ms: now_ms,
            })
            .await;
            self.store.commit(snapshot.broken, now_ms).await;
            return CycleOutcome::Simulated(decision);
        }

        tracing::info!("Sending {}: {}", decision, notification.message);
        let delivered = dispatch_notifications(
            decision,
            notification,
            &self.notifiers,
            &self.state,
            now_ms,
        )
        .await;

        if delivered == 0 {
            tracing::warn!("No notifier accepted {}, will retry next cycle", decision);
            return CycleOutcome::SendFailed(decision);
        }

        self.store.commit(snapshot.broken, now_ms).await;
        CycleOutcome::Notified(decision)
    }

    async fn record(&self, record: NotificationRecord) {
        self.state.write().await.add_notification(record);
    }
}

/// Send `notification` through every notifier, recording each attempt.
/// Returns the number of notifiers that accepted it.
pub async fn dispatch_notifications(
    decision: Decision,
    notification: &Notification,
    notifiers: &[Arc<dyn Notifier>],
    state: &StateHandle,
    now_ms: u64,
) -> usize {
    let mut delivered = 0;

    for notifier in notifiers {
        let notifier_type = notifier.type_name();
        tracing::debug!("Dispatching {} to '{}'", decision, notifier_type);

        let result = notifier.notify(notification).await;
        match &result {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!("Notification via '{}' failed: {}", notifier_type, e),
        }

        state.write().await.add_notification(NotificationRecord {
            decision,
            notifier_type: notifier_type.to_string(),
            message: notification.message.clone(),
            success: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            timestamp_epoch_ms: now_ms,
        });
    }

    delivered
}

fn epoch_ms(now: &DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp_millis()).unwrap_or(0)
}
