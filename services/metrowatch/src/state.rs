//! Shared runtime state for the poll loop and the status API

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::decision::Decision;
use crate::notifier::NotificationRecord;

/// Snapshot of the poll loop's progress, as served by the status API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStatus {
    pub cycles: u64,
    pub last_poll_epoch_ms: u64,
    pub last_broken: Option<bool>,
    pub last_decision: Option<Decision>,
    pub consecutive_fetch_errors: u32,
}

/// Shared state accessible by engine and status API
#[derive(Debug)]
pub struct SharedState {
    pub poll: PollStatus,
    pub history: VecDeque<NotificationRecord>,
    pub history_max_size: usize,
    pub started_at: Instant,
}

impl SharedState {
    pub fn new(history_max_size: usize) -> Self {
        Self {
            poll: PollStatus::default(),
            history: VecDeque::with_capacity(history_max_size),
            history_max_size,
            started_at: Instant::now(),
        }
    }

    /// Record a completed fetch and the decision made on it
    pub fn record_poll(&mut self, broken: bool, decision: Decision, now_ms: u64) {
        self.poll.cycles += 1;
        self.poll.last_poll_epoch_ms = now_ms;
        self.poll.last_broken = Some(broken);
        self.poll.last_decision = Some(decision);
        self.poll.consecutive_fetch_errors = 0;
    }

    /// Record a failed fetch, returning the number of failures in a row
    pub fn record_fetch_error(&mut self, now_ms: u64) -> u32 {
        self.poll.cycles += 1;
        self.poll.last_poll_epoch_ms = now_ms;
        self.poll.consecutive_fetch_errors += 1;
        self.poll.consecutive_fetch_errors
    }

    /// Add a notification to history
    pub fn add_notification(&mut self, record: NotificationRecord) {
        if self.history_max_size == 0 {
            return;
        }
        if self.history.len() >= self.history_max_size {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Thread-safe shared state handle
pub type StateHandle = Arc<RwLock<SharedState>>;

pub fn new_state_handle(history_max_size: usize) -> StateHandle {
    Arc::new(RwLock::new(SharedState::new(history_max_size)))
}
