//! BDD step definitions for the persisted state feature

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};

use metrowatch::store::{KeyValueStore, MemoryStore, StateStore};
use metrowatch::PriorStatus;

use crate::world::MetroWatchWorld;

const TTL: Duration = Duration::from_secs(3600);

fn state_store(world: &MetroWatchWorld) -> StateStore {
    let memory = world.memory.clone().expect("store not set");
    StateStore::new(memory, TTL)
}

#[given("an empty store")]
fn empty_store(world: &mut MetroWatchWorld) {
    world.memory = Some(Arc::new(MemoryStore::new()));
}

#[given(expr = "the store holds {string} under {string}")]
async fn store_holds(world: &mut MetroWatchWorld, value: String, key: String) {
    let memory = world
        .memory
        .get_or_insert_with(|| Arc::new(MemoryStore::new()));
    memory
        .set_with_expiry(&key, &value, TTL)
        .await
        .expect("memory store write");
}

#[when(expr = "an announcement that the metro is {string} is recorded at {int}")]
async fn commit(world: &mut MetroWatchWorld, status: String, at_ms: u64) {
    state_store(world).commit(status == "broken", at_ms).await;
}

#[when("the notification state is loaded")]
async fn load(world: &mut MetroWatchWorld) {
    world.persisted = Some(state_store(world).load().await);
}

#[then(expr = "the prior status is {string}")]
fn prior_is(world: &mut MetroWatchWorld, expected: String) {
    let expected = match expected.as_str() {
        "broken" => PriorStatus::Broken,
        "recovered" => PriorStatus::Recovered,
        "unknown" => PriorStatus::Unknown,
        other => panic!("Unknown prior status: {}", other),
    };
    assert_eq!(world.persisted.expect("nothing loaded").prior, expected);
}

#[then(expr = "the last announcement time is {int}")]
fn time_is(world: &mut MetroWatchWorld, expected: u64) {
    assert_eq!(
        world.persisted.expect("nothing loaded").last_notified_epoch_ms,
        Some(expected)
    );
}

#[then("no announcement time is known")]
fn no_time(world: &mut MetroWatchWorld) {
    assert_eq!(
        world.persisted.expect("nothing loaded").last_notified_epoch_ms,
        None
    );
}

#[then(expr = "the store holds {string} under {string}")]
async fn raw_value(world: &mut MetroWatchWorld, value: String, key: String) {
    let memory = world.memory.as_ref().expect("store not set");
    assert_eq!(
        memory.get(&key).await.expect("memory store read").as_deref(),
        Some(value.as_str())
    );
}
