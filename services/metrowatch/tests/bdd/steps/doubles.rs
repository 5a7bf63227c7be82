//! Test doubles shared by the step definitions

use std::sync::Mutex;

use metrowatch::feed::{FeedSource, Reason, StatusSnapshot};
use metrowatch::io::{HttpClient, HttpResponse};
use metrowatch::notifier::{Notification, Notifier};
use tokio::sync::RwLock;

/// A feed that returns whatever it was last told to report
#[derive(Debug, Default)]
pub struct ScriptedFeed {
    snapshot: Mutex<Option<StatusSnapshot>>,
}

impl ScriptedFeed {
    pub fn report_broken(&self, reason: &str) {
        self.set(Some(StatusSnapshot {
            broken: true,
            reasons: vec![Reason {
                text: reason.to_string(),
                language: Some("fi".to_string()),
            }],
        }));
    }

    pub fn report_running(&self) {
        self.set(Some(StatusSnapshot::default()));
    }

    pub fn fail(&self) {
        self.set(None);
    }

    fn set(&self, snapshot: Option<StatusSnapshot>) {
        *self.snapshot.lock().unwrap() = snapshot;
    }
}

#[async_trait::async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch(&self) -> metrowatch::Result<StatusSnapshot> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| metrowatch::MetroWatchError::Feed("feed unreachable".to_string()))
    }
}

/// A notifier that records what it was asked to send
#[derive(Debug)]
pub struct RecordingNotifier {
    type_name: String,
    succeed: bool,
    records: RwLock<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new(type_name: &str, succeed: bool) -> Self {
        Self {
            type_name: type_name.to_string(),
            succeed,
            records: RwLock::new(Vec::new()),
        }
    }

    pub async fn messages(&self) -> Vec<String> {
        self.records
            .read()
            .await
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    async fn notify(&self, notification: &Notification) -> metrowatch::Result<()> {
        self.records.write().await.push(notification.clone());
        if self.succeed {
            Ok(())
        } else {
            Err(metrowatch::MetroWatchError::Notifier(
                "test failure".to_string(),
            ))
        }
    }
}

/// A form POST seen by [`RecordingHttpClient`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP client that answers every request with a fixed status
#[derive(Debug)]
pub struct RecordingHttpClient {
    status: u16,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingHttpClient {
    pub fn answering(status: u16) -> Self {
        Self {
            status,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[async_trait::async_trait]
impl HttpClient for RecordingHttpClient {
    async fn get(&self, _url: &str) -> metrowatch::Result<HttpResponse> {
        Ok(HttpResponse {
            status: self.status,
            body: "{}".to_string(),
        })
    }

    async fn post_form(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        params: &[(&str, &str)],
    ) -> metrowatch::Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers: owned(headers),
            params: owned(params),
        });
        Ok(HttpResponse {
            status: self.status,
            body: r#"{"status":1}"#.to_string(),
        })
    }
}
