//! Dispatches notifications to a Slack-style incoming webhook.

use crate::config::ReporterSettings;
use crate::core::WebhookTransport;
use crate::formatting::{stringify, UNSERIALIZABLE};
use crate::notification::delivery::{DeliveryHook, DeliveryOutcome, DeliveryReport};
use crate::notification::message::Notification;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Turns notifications into webhook payloads and sends them, one POST per call.
#[derive(Clone)]
pub struct SlackDispatcher {
    settings: Arc<ReporterSettings>,
    transport: Arc<dyn WebhookTransport>,
    on_delivery: Option<DeliveryHook>,
}

impl SlackDispatcher {
    /// Creates a new `SlackDispatcher`.
    pub fn new(settings: Arc<ReporterSettings>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            settings,
            transport,
            on_delivery: None,
        }
    }

    /// Registers an observer that receives every delivery report.
    pub fn with_delivery_hook(mut self, hook: DeliveryHook) -> Self {
        self.on_delivery = Some(hook);
        self
    }

    /// Builds the payload for a notification.
    ///
    /// The static payload fields come first; the computed `attachments` or
    /// `text` key is inserted afterwards and wins if the names collide.
    pub fn build_payload(&self, notification: &Notification) -> Map<String, Value> {
        let mut payload = self.settings.static_payload().clone();
        match notification {
            Notification::Attachment(attachment) => {
                let attachment = serde_json::to_value(attachment).unwrap_or_else(|e| {
                    warn!(error = %e, "Failed to serialize attachment, substituting placeholder");
                    Value::String(UNSERIALIZABLE.to_string())
                });
                payload.insert("attachments".to_string(), Value::Array(vec![attachment]));
            }
            Notification::Text(text) => {
                payload.insert("text".to_string(), Value::String(text.clone()));
            }
        }
        payload
    }

    /// Prepares the delivery of one notification without starting it.
    ///
    /// The returned future performs exactly one POST and resolves to its
    /// report. It owns everything it needs and can be spawned anywhere.
    pub fn delivery(&self, notification: &Notification) -> impl Future<Output = DeliveryReport> + Send + 'static {
        let body = stringify(&self.build_payload(notification));
        let url = self.settings.target_url().to_string();
        let transport = self.transport.clone();
        let hook = self.on_delivery.clone();

        metrics::counter!("notifications_dispatched_total").increment(1);

        async move {
            let started = Instant::now();
            let outcome = match transport.post(&url, body.clone()).await {
                Ok(response) if response.is_success() => DeliveryOutcome::Delivered {
                    status: response.status,
                },
                Ok(response) => DeliveryOutcome::Rejected {
                    status: response.status,
                    body: response.body,
                },
                Err(e) => DeliveryOutcome::Failed {
                    error: e.to_string(),
                },
            };
            let elapsed = started.elapsed();

            match &outcome {
                DeliveryOutcome::Delivered { status } => {
                    debug!(status, elapsed_ms = elapsed.as_millis() as u64, "Notification delivered");
                }
                DeliveryOutcome::Rejected { status, body } => {
                    warn!(status, body = %body, "Webhook rejected notification");
                }
                DeliveryOutcome::Failed { error } => {
                    error!(error = %error, "Failed to deliver notification");
                }
            }
            metrics::counter!("deliveries_total", "outcome" => outcome.label()).increment(1);
            metrics::histogram!("delivery_duration_seconds").record(elapsed.as_secs_f64());

            let report = DeliveryReport {
                url,
                body,
                outcome,
                elapsed,
            };
            if let Some(hook) = hook {
                hook(&report);
            }
            report
        }
    }

    /// Sends one notification on a detached task and returns immediately.
    ///
    /// The handle may be dropped; the send still runs to completion.
    pub fn send(&self, notification: &Notification) -> JoinHandle<DeliveryReport> {
        tokio::spawn(self.delivery(notification))
    }
}

impl std::fmt::Debug for SlackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackDispatcher")
            .field("target_url", &self.settings.target_url())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod slack_dispatcher_tests {
    use super::*;
    use crate::config::{Config, ReporterSettings};
    use crate::core::{TransportError, TransportResponse};
    use crate::notification::message::{Attachment, Color};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    // A fake transport that records every POST and answers with a fixed status.
    struct FakeTransport {
        status: Option<u16>,
        posts: Mutex<Vec<(String, String)>>,
    }

    impl FakeTransport {
        fn answering(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status: Some(status),
                posts: Mutex::new(Vec::new()),
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                status: None,
                posts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl WebhookTransport for FakeTransport {
        async fn post(&self, url: &str, body: String) -> Result<TransportResponse, TransportError> {
            self.posts.lock().unwrap().push((url.to_string(), body));
            match self.status {
                Some(status) => Ok(TransportResponse {
                    status,
                    body: "answer".into(),
                }),
                None => Err(TransportError::Other("connection refused".into())),
            }
        }
    }

    fn settings(static_payload: Value, basic: bool) -> Arc<ReporterSettings> {
        let mut config = Config::default().reporter;
        config.url = Some("https://hooks.slack.com".into());
        config.host = Some("localhost".into());
        config.slack = static_payload.as_object().cloned().unwrap_or_default();
        config.basic = basic;
        Arc::new(ReporterSettings::from_config(&config).unwrap())
    }

    fn attachment() -> Notification {
        let mut attachment = Attachment::with_pretext("`response` event".into());
        attachment.fallback = Some("200 POST /data".into());
        attachment.color = Some(Color::Good);
        Notification::Attachment(attachment)
    }

    #[test]
    fn test_wraps_attachment() {
        let dispatcher = SlackDispatcher::new(settings(json!({}), false), FakeTransport::answering(200));
        let payload = dispatcher.build_payload(&attachment());
        assert_eq!(
            Value::Object(payload),
            json!({
                "attachments": [{
                    "pretext": "`response` event",
                    "mrkdwn_in": ["pretext", "text", "fields"],
                    "fallback": "200 POST /data",
                    "color": "good"
                }]
            })
        );
    }

    #[test]
    fn test_static_fields_are_merged_and_computed_keys_win() {
        let settings = settings(
            json!({ "username": "testing-bot", "channel": "#test", "attachments": "static" }),
            false,
        );
        let dispatcher = SlackDispatcher::new(settings, FakeTransport::answering(200));
        let payload = dispatcher.build_payload(&attachment());

        assert_eq!(payload["username"], json!("testing-bot"));
        assert_eq!(payload["channel"], json!("#test"));
        assert!(payload["attachments"].is_array());
        assert_eq!(
            payload.keys().collect::<Vec<_>>(),
            vec!["username", "channel", "attachments"]
        );
    }

    #[test]
    fn test_text_notification_has_no_attachments() {
        let dispatcher = SlackDispatcher::new(settings(json!({ "channel": "#logs" }), true), FakeTransport::answering(200));
        let payload = dispatcher.build_payload(&Notification::Text("plain line".into()));
        assert_eq!(Value::Object(payload), json!({ "channel": "#logs", "text": "plain line" }));
    }

    #[tokio::test]
    async fn test_send_posts_serialized_payload_once() {
        let transport = FakeTransport::answering(200);
        let dispatcher = SlackDispatcher::new(settings(json!({}), false), transport.clone());

        let report = dispatcher.send(&attachment()).await.unwrap();

        let posts = transport.posts.lock().unwrap().clone();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "https://hooks.slack.com");
        assert_eq!(
            serde_json::from_str::<Value>(&posts[0].1).unwrap(),
            Value::Object(dispatcher.build_payload(&attachment()))
        );
        assert_eq!(report.body, posts[0].1);
        assert_eq!(report.outcome, DeliveryOutcome::Delivered { status: 200 });
    }

    #[tokio::test]
    async fn test_rejection_and_failure_are_reported_not_raised() {
        let dispatcher = SlackDispatcher::new(settings(json!({}), false), FakeTransport::answering(500));
        let report = dispatcher.send(&attachment()).await.unwrap();
        assert_eq!(
            report.outcome,
            DeliveryOutcome::Rejected { status: 500, body: "answer".into() }
        );

        let dispatcher = SlackDispatcher::new(settings(json!({}), false), FakeTransport::unreachable());
        let report = dispatcher.send(&attachment()).await.unwrap();
        assert_eq!(
            report.outcome,
            DeliveryOutcome::Failed { error: "connection refused".into() }
        );
    }

    #[tokio::test]
    async fn test_hook_sees_every_report() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = seen.clone();
        let dispatcher = SlackDispatcher::new(settings(json!({}), false), FakeTransport::answering(204))
            .with_delivery_hook(Arc::new(move |report: &DeliveryReport| {
                hook_seen.lock().unwrap().push(report.outcome.clone());
            }));

        dispatcher.send(&attachment()).await.unwrap();
        dispatcher.send(&attachment()).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                DeliveryOutcome::Delivered { status: 204 },
                DeliveryOutcome::Delivered { status: 204 }
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_handle_still_delivers() {
        let transport = FakeTransport::answering(200);
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let done_tx = Mutex::new(Some(done_tx));
        let dispatcher = SlackDispatcher::new(settings(json!({}), false), transport.clone())
            .with_delivery_hook(Arc::new(move |_: &DeliveryReport| {
                if let Some(tx) = done_tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            }));

        drop(dispatcher.send(&attachment()));

        tokio::time::timeout(std::time::Duration::from_secs(1), done_rx)
            .await
            .expect("delivery did not finish")
            .unwrap();
        assert_eq!(transport.posts.lock().unwrap().len(), 1);
    }
}
