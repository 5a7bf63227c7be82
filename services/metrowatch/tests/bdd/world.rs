//! BDD test world for metrowatch service

use std::sync::Arc;
use std::time::Duration;

use cucumber::World;
use metrowatch::notifier::Notification;
use metrowatch::state::StateHandle;
use metrowatch::store::{MemoryStore, PersistedState, StateStore};
use metrowatch::{CycleOutcome, Decision, Engine, PriorStatus};

use crate::steps::doubles::{RecordingHttpClient, RecordingNotifier, ScriptedFeed};

#[derive(Debug, Default, World)]
pub struct MetroWatchWorld {
    // Decision testing
    pub renotify_interval: Option<Duration>,
    pub prior: Option<PriorStatus>,
    pub last_notified_secs_ago: Option<u64>,
    pub decision: Option<Decision>,

    // Cycle testing
    pub feed: Option<Arc<ScriptedFeed>>,
    pub notifiers: Vec<Arc<RecordingNotifier>>,
    pub store: Option<Arc<StateStore>>,
    pub state: Option<StateHandle>,
    pub engine: Option<Engine>,
    pub outcome: Option<CycleOutcome>,

    // Notifier testing
    pub http: Option<Arc<RecordingHttpClient>>,
    pub notification_result: Option<metrowatch::Result<()>>,
    pub rendered: Option<Notification>,

    // Store testing
    pub memory: Option<Arc<MemoryStore>>,
    pub persisted: Option<PersistedState>,
}
