use crate::core::{TransportError, TransportResponse, WebhookTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Fake webhook transport for testing
///
/// Records every POST and answers from a queue of scripted responses,
/// falling back to `200 ok` once the queue is empty.
#[derive(Clone, Default)]
pub struct FakeTransport {
    posts: Arc<Mutex<Vec<(String, String)>>>,
    // The front of the queue is the next answer.
    responses: Arc<Mutex<VecDeque<Result<u16, String>>>>,
    notify: Arc<Notify>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an HTTP answer with the given status
    pub fn add_status_response(&self, status: u16) {
        self.responses.lock().unwrap().push_back(Ok(status));
    }

    /// Queue a transport failure
    pub fn add_error_response(&self, error: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(error.to_string()));
    }

    /// Get the number of POSTs received so far
    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    /// Get the raw `(url, body)` pairs received so far
    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }

    /// Get the received bodies parsed as JSON
    pub fn bodies(&self) -> Vec<Value> {
        self.posts()
            .iter()
            .map(|(_, body)| serde_json::from_str(body).expect("body is not JSON"))
            .collect()
    }

    /// Wait until at least `count` POSTs have been received
    pub async fn wait_for_posts(&self, count: usize, timeout: std::time::Duration) {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if self.post_count() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .expect("Timed out waiting for webhook posts");
    }
}

#[async_trait]
impl WebhookTransport for FakeTransport {
    async fn post(&self, url: &str, body: String) -> Result<TransportResponse, TransportError> {
        self.posts.lock().unwrap().push((url.to_string(), body));
        self.notify.notify_waiters();

        let next = self.responses.lock().unwrap().pop_front();
        match next.unwrap_or(Ok(200)) {
            Ok(status) => Ok(TransportResponse {
                status,
                body: "ok".to_string(),
            }),
            Err(error) => Err(TransportError::Other(error)),
        }
    }
}
