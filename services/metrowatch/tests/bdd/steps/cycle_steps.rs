//! BDD step definitions for the poll-and-decide cycle feature

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use cucumber::{given, then, when};
use tokio_util::sync::CancellationToken;

use metrowatch::feed::FeedSource;
use metrowatch::notifier::Notifier;
use metrowatch::state::new_state_handle;
use metrowatch::store::{MemoryStore, StateStore};
use metrowatch::{Config, CycleOutcome, Engine, PriorStatus};

use crate::steps::doubles::{RecordingNotifier, ScriptedFeed};
use crate::world::MetroWatchWorld;

const START_EPOCH_SECS: i64 = 1_700_000_000;

fn build_engine(world: &mut MetroWatchWorld, notifications_enabled: bool) {
    let mut config = Config::default();
    config.poll.min_renotify_interval = Duration::from_secs(3600);
    config.notifications.enabled = notifications_enabled;
    config.notifications.broken_template = "Metro broken: {reason}".to_string();
    config.notifications.recovered_template = "Metro running again, see {url}".to_string();

    let feed = Arc::new(ScriptedFeed::default());
    let store = Arc::new(StateStore::new(
        Arc::new(MemoryStore::new()),
        Duration::from_secs(86_400),
    ));
    let state = new_state_handle(config.status.history_size);
    let notifiers: Vec<Arc<dyn Notifier>> = world
        .notifiers
        .iter()
        .map(|n| Arc::clone(n) as Arc<dyn Notifier>)
        .collect();

    world.engine = Some(Engine::new(
        Arc::clone(&feed) as Arc<dyn FeedSource>,
        Arc::clone(&store),
        notifiers,
        &config,
        Arc::clone(&state),
        CancellationToken::new(),
    ));
    world.feed = Some(feed);
    world.store = Some(store);
    world.state = Some(state);
}

fn outcome_name(outcome: &CycleOutcome) -> &'static str {
    match outcome {
        CycleOutcome::Notified(_) => "notified",
        CycleOutcome::Silent => "silent",
        CycleOutcome::SendFailed(_) => "send failed",
        CycleOutcome::Simulated(_) => "simulated",
        CycleOutcome::FetchFailed => "fetch failed",
    }
}

#[given(expr = "a metro watcher with a {word} notifier")]
fn watcher_with_notifier(world: &mut MetroWatchWorld, kind: String) {
    let succeed = match kind.as_str() {
        "working" => true,
        "failing" => false,
        other => panic!("Unknown notifier kind: {}", other),
    };
    world
        .notifiers
        .push(Arc::new(RecordingNotifier::new(&kind, succeed)));
    build_engine(world, true);
}

#[given("a metro watcher with a failing and a working notifier")]
fn watcher_with_mixed_notifiers(world: &mut MetroWatchWorld) {
    world
        .notifiers
        .push(Arc::new(RecordingNotifier::new("failing", false)));
    world
        .notifiers
        .push(Arc::new(RecordingNotifier::new("working", true)));
    build_engine(world, true);
}

#[given("a metro watcher with notifications disabled")]
fn watcher_disabled(world: &mut MetroWatchWorld) {
    world
        .notifiers
        .push(Arc::new(RecordingNotifier::new("working", true)));
    build_engine(world, false);
}

#[when(expr = "the feed reports the metro broken because {string}")]
fn feed_broken(world: &mut MetroWatchWorld, reason: String) {
    world
        .feed
        .as_ref()
        .expect("feed not set")
        .report_broken(&reason);
}

#[when("the feed reports the metro running")]
fn feed_running(world: &mut MetroWatchWorld) {
    world.feed.as_ref().expect("feed not set").report_running();
}

#[when("the feed is unreachable")]
fn feed_unreachable(world: &mut MetroWatchWorld) {
    world.feed.as_ref().expect("feed not set").fail();
}

#[when(expr = "a cycle runs {int} seconds after start")]
async fn cycle_runs(world: &mut MetroWatchWorld, seconds: i64) {
    let now = Utc
        .timestamp_opt(START_EPOCH_SECS + seconds, 0)
        .single()
        .expect("valid timestamp");
    let engine = world.engine.as_ref().expect("engine not built");
    world.outcome = Some(engine.run_cycle_at(now).await);
}

#[then(expr = "the cycle outcome is {string}")]
fn outcome_is(world: &mut MetroWatchWorld, expected: String) {
    let outcome = world.outcome.expect("no cycle has run");
    assert_eq!(outcome_name(&outcome), expected, "cycle outcome was {}", outcome);
}

#[then(expr = "the {word} notifier was asked {int} time(s)")]
async fn notifier_asked(world: &mut MetroWatchWorld, kind: String, times: usize) {
    let notifier = world
        .notifiers
        .iter()
        .find(|n| n.type_name() == kind)
        .expect("no such notifier");
    assert_eq!(notifier.messages().await.len(), times);
}

#[then(expr = "the last message contains {string}")]
async fn last_message_contains(world: &mut MetroWatchWorld, text: String) {
    let mut last = None;
    for notifier in &world.notifiers {
        if let Some(message) = notifier.messages().await.pop() {
            last = Some(message);
        }
    }
    let last = last.expect("no message was sent");
    assert!(
        last.contains(&text),
        "Expected '{}' in message '{}'",
        text,
        last
    );
}

#[then(expr = "the stored status is {string}")]
async fn stored_status(world: &mut MetroWatchWorld, expected: String) {
    let expected = match expected.as_str() {
        "broken" => PriorStatus::Broken,
        "recovered" => PriorStatus::Recovered,
        "unknown" => PriorStatus::Unknown,
        other => panic!("Unknown stored status: {}", other),
    };
    let store = world.store.as_ref().expect("store not set");
    assert_eq!(store.load().await.prior, expected);
}

#[then(expr = "the status cache says the metro is {string}")]
async fn status_cache(world: &mut MetroWatchWorld, expected: String) {
    let store = world.store.as_ref().expect("store not set");
    let cached = store
        .cached_status("status")
        .await
        .expect("nothing cached");
    assert_eq!(cached.broken, expected == "broken");
}

#[then(expr = "the history has {int} record(s)")]
async fn history_has(world: &mut MetroWatchWorld, count: usize) {
    let state = world.state.as_ref().expect("state not set");
    assert_eq!(state.read().await.history.len(), count);
}

#[then(expr = "{int} consecutive fetch error(s) are recorded")]
async fn fetch_errors(world: &mut MetroWatchWorld, count: u32) {
    let state = world.state.as_ref().expect("state not set");
    assert_eq!(state.read().await.poll.consecutive_fetch_errors, count);
}
