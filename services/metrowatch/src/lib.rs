//! MetroWatch - metro service status notifier
//!
//! Polls a status feed, decides whether a broken or recovered metro is worth
//! announcing, and posts the announcement through the configured notifiers.

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod feed;
pub mod io;
pub mod mastodon;
pub mod message;
pub mod notifier;
pub mod pushover;
pub mod redis;
pub mod server;
pub mod state;
pub mod store;

pub use config::{load_config, Config};
pub use decision::{decide, Decision, PriorStatus};
pub use engine::{CycleOutcome, Engine};
pub use error::{MetroWatchError, Result};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{NotifierConfig, StoreBackend, StoreConfig};
use crate::feed::HttpFeedSource;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::mastodon::MastodonNotifier;
use crate::notifier::Notifier;
use crate::pushover::PushoverNotifier;
use crate::redis::RedisStore;
use crate::server::ServerState;
use crate::store::{DisabledStore, KeyValueStore, MemoryStore, StateStore};

/// Build the key/value store selected in the config
pub fn build_store(config: &StoreConfig) -> Arc<dyn KeyValueStore> {
    match &config.backend {
        StoreBackend::Disabled => Arc::new(DisabledStore),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Redis {
            host,
            port,
            password,
            database,
            timeout,
        } => Arc::new(RedisStore::new(
            host,
            *port,
            password.clone(),
            *database,
            *timeout,
        )),
    }
}

/// Build one notifier per configured entry
pub fn build_notifiers(
    configs: &[NotifierConfig],
    http: &Arc<dyn HttpClient>,
) -> Vec<Arc<dyn Notifier>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    for notifier_config in configs {
        let notifier: Option<Arc<dyn Notifier>> = match notifier_config {
            NotifierConfig::Pushover { .. } => {
                PushoverNotifier::from_config(notifier_config, Arc::clone(http))
                    .map(|n| Arc::new(n) as Arc<dyn Notifier>)
            }
            NotifierConfig::Mastodon { .. } => {
                MastodonNotifier::from_config(notifier_config, Arc::clone(http))
                    .map(|n| Arc::new(n) as Arc<dyn Notifier>)
            }
        };
        notifiers.extend(notifier);
    }
    notifiers
}

/// Run the service with the given configuration until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::default());
    let cancel = CancellationToken::new();

    let feed = Arc::new(HttpFeedSource::new(&config.feed.url, Arc::clone(&http)));
    let store = Arc::new(StateStore::new(
        build_store(&config.store),
        config.store.state_ttl,
    ));
    let notifiers = build_notifiers(&config.notifications.notifiers, &http);
    let state = state::new_state_handle(config.status.history_size);

    let engine = Engine::new(
        feed,
        Arc::clone(&store),
        notifiers,
        &config,
        Arc::clone(&state),
        cancel.clone(),
    );

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    if config.status.enabled {
        let status_port = config.status.port;
        let server_state = ServerState {
            store: Arc::clone(&store),
            cache_key: config.status.cache_key.clone(),
            state: Arc::clone(&state),
        };
        let cancel_for_server = cancel.clone();

        tokio::spawn(async move {
            let router = server::build_router(server_state);
            let addr = SocketAddr::from(([0, 0, 0, 0], status_port));
            tracing::info!("Status server listening on http://{}", addr);

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(
                        "Failed to bind status server to port {}: {}. Continuing without it.",
                        status_port,
                        e
                    );
                    return;
                }
            };

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_for_server.cancelled().await;
                })
                .await
                .ok();

            tracing::debug!("Status server stopped");
        });
    }

    tracing::info!("MetroWatch engine started");

    // Blocks until cancelled
    engine.run(config.poll.interval).await;

    tracing::info!("MetroWatch engine stopped");
    Ok(())
}
