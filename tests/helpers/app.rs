#![allow(dead_code)]
//! Test helpers for running the full reporter.

use anyhow::Result;
use eventhook::{
    app::App, config::Config, core::Event, internal_metrics::Metrics,
    notification::test_utils::FakeTransport, types::EventSender,
};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running reporter wired to a fake transport.
pub struct TestApp {
    pub events_tx: Option<EventSender>,
    pub shutdown_tx: watch::Sender<()>,
    pub transport: FakeTransport,
    app_handle: JoinHandle<Result<()>>,
}

impl TestApp {
    pub async fn send(&self, record: Value) -> Result<()> {
        let event: Event = serde_json::from_value(record)?;
        self.events_tx
            .as_ref()
            .expect("events channel already closed")
            .send(event)
            .await?;
        Ok(())
    }

    /// Closes the event stream and waits for the reporter to finish
    /// processing everything queued.
    pub async fn finish(mut self, timeout_duration: Duration) -> Result<FakeTransport> {
        drop(self.events_tx.take());
        match timeout(timeout_duration, self.app_handle).await {
            Ok(result) => result??,
            Err(_) => anyhow::bail!("App failed to finish within the timeout"),
        }
        Ok(self.transport)
    }

    /// Sends the shutdown signal and waits for the reporter to stop.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx.send(())?;
        match timeout(timeout_duration, self.app_handle).await {
            Ok(result) => result?,
            Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
        }
    }
}

/// Builds a `TestApp` with a webhook URL already configured.
pub struct TestAppBuilder {
    pub config: Config,
    transport: FakeTransport,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.reporter.url = Some("https://hooks.slack.com/services/test".into());
        config.reporter.host = Some("localhost".into());
        Self {
            config,
            transport: FakeTransport::new(),
        }
    }

    pub fn with_static_payload(mut self, payload: Value) -> Self {
        self.config.reporter.slack = payload.as_object().cloned().unwrap_or_default();
        self
    }

    pub fn with_basic_mode(mut self) -> Self {
        self.config.reporter.basic = true;
        self
    }

    pub fn with_subscriptions(mut self, subscriptions: Value) -> Self {
        self.config.events =
            serde_json::from_value::<BTreeMap<_, _>>(subscriptions).expect("bad subscriptions");
        self
    }

    pub fn with_transport(mut self, transport: FakeTransport) -> Self {
        self.transport = transport;
        self
    }

    pub async fn start(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let (app, events_tx) = App::builder(self.config)
            .transport_override(Arc::new(self.transport.clone()))
            .metrics_override(Metrics::disabled())
            .build(shutdown_rx)
            .await?;
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            events_tx: Some(events_tx),
            shutdown_tx,
            transport: self.transport,
            app_handle,
        })
    }
}
