//! Decision engine: whether a poll result warrants a public notification
//!
//! Going broken is announced unconditionally. Recovery is announced only once
//! the minimum re-notify interval has passed since the previous notification,
//! which keeps a flapping service from producing a stream of recovery posts.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Broken/recovered status recorded with the last successful notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorStatus {
    Broken,
    Recovered,
    /// Never recorded, expired, or unreadable
    Unknown,
}

impl PriorStatus {
    pub fn from_broken(broken: bool) -> Self {
        if broken {
            PriorStatus::Broken
        } else {
            PriorStatus::Recovered
        }
    }
}

impl fmt::Display for PriorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorStatus::Broken => write!(f, "Broken"),
            PriorStatus::Recovered => write!(f, "Recovered"),
            PriorStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// What the poll cycle should do with the current reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    NotifyBroken,
    NotifyRecovered,
    Silent,
}

impl Decision {
    pub fn is_notify(&self) -> bool {
        !matches!(self, Decision::Silent)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::NotifyBroken => write!(f, "NotifyBroken"),
            Decision::NotifyRecovered => write!(f, "NotifyRecovered"),
            Decision::Silent => write!(f, "Silent"),
        }
    }
}

/// Decide whether to notify, given the current reading and the persisted state.
///
/// Rules, first match wins:
/// 1. broken now and not known to be broken before: [`Decision::NotifyBroken`]
/// 2. broken before, recovered now, and strictly more than
///    `min_renotify_interval` since the last notification:
///    [`Decision::NotifyRecovered`]
/// 3. otherwise [`Decision::Silent`]
///
/// Without a recorded notification time recovery is never announced. A
/// recorded time later than `now_epoch_ms` counts as no time elapsed.
pub fn decide(
    current_broken: bool,
    prior: PriorStatus,
    last_notified_epoch_ms: Option<u64>,
    min_renotify_interval: Duration,
    now_epoch_ms: u64,
) -> Decision {
    if current_broken && prior != PriorStatus::Broken {
        return Decision::NotifyBroken;
    }

    if prior == PriorStatus::Broken && !current_broken {
        if let Some(last) = last_notified_epoch_ms {
            let elapsed_ms = u128::from(now_epoch_ms.saturating_sub(last));
            if elapsed_ms > min_renotify_interval.as_millis() {
                return Decision::NotifyRecovered;
            }
        }
    }

    Decision::Silent
}
