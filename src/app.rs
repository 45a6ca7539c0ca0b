//! The reporter application, decoupled from the entry point.

use crate::{
    config::{Config, ReporterSettings},
    core::WebhookTransport,
    filter::EventFilter,
    formatting::SlackFormatter,
    internal_metrics::{Metrics, MetricsBuilder},
    notification::{
        manager::NotificationManager, DeliveryHook, ReqwestTransport, SlackDispatcher,
    },
    task_manager::TaskManager,
    types::EventSender,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument};

/// A handle to the running reporter.
pub struct App {
    task_manager: TaskManager,
    shutdown_rx: watch::Receiver<()>,
    stop_tx: watch::Sender<()>,
    manager_done_rx: oneshot::Receiver<()>,
    metrics: Metrics,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// The metrics handle shared by the pipeline, for wiring up event sources.
    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    /// Runs until the external shutdown signal fires or every event sender
    /// has been dropped, then stops all tasks and waits for them.
    ///
    /// In the second case all queued events are processed first.
    pub async fn run(mut self) -> Result<()> {
        tokio::select! {
            Ok(()) = self.shutdown_rx.changed() => {
                info!("Shutdown signal received. Waiting for tasks to complete...");
            }
            _ = &mut self.manager_done_rx => {
                info!("Event stream finished. Waiting for tasks to complete...");
            }
        }

        // Every internal task listens on `stop_tx`; receivers may already be gone.
        let _ = self.stop_tx.send(());
        self.task_manager.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the reporter application.
///
/// Separates constructing the components from running them and lets tests
/// swap the HTTP transport or observe deliveries.
pub struct AppBuilder {
    config: Config,
    transport_override: Option<Arc<dyn WebhookTransport>>,
    delivery_hook: Option<DeliveryHook>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport_override: None,
            delivery_hook: None,
            metrics_override: None,
        }
    }

    /// Overrides the HTTP transport for testing.
    pub fn transport_override(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.transport_override = Some(transport);
        self
    }

    /// Registers an observer for every delivery report.
    pub fn delivery_hook(mut self, hook: DeliveryHook) -> Self {
        self.delivery_hook = Some(hook);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Validates the configuration, spawns the reporter tasks and returns the
    /// running `App` together with the sender that feeds it events.
    ///
    /// Fails without spawning anything when the reporter configuration is
    /// invalid.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<()>) -> Result<(App, EventSender)> {
        let config = self.config;

        // =========================================================================
        // 1. Validate Settings
        // =========================================================================
        let settings = Arc::new(
            ReporterSettings::from_config(&config.reporter)
                .context("Invalid reporter configuration")?,
        );
        let transport: Arc<dyn WebhookTransport> = match self.transport_override {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new(config.reporter.timeout())
                    .context("Failed to build HTTP client")?,
            ),
        };
        debug!(
            target_url = settings.target_url(),
            origin = settings.origin_label(),
            basic = settings.basic_mode(),
            "Reporter settings validated"
        );

        let (stop_tx, stop_rx) = watch::channel(());
        let task_manager = TaskManager::new();

        // =========================================================================
        // 2. Initialize Metrics
        // =========================================================================
        let (metrics, metrics_server_info) = match self.metrics_override {
            Some(m) => (m, None),
            None => MetricsBuilder::new(config.metrics.clone()).build(stop_rx.clone()),
        };
        let metrics_addr = if let Some((server, addr)) = metrics_server_info {
            info!("Metrics server listening on http://{}", addr);
            task_manager.spawn("MetricsServer", server.run());
            Some(addr)
        } else {
            None
        };

        // =========================================================================
        // 3. Notification Pipeline
        // =========================================================================
        let mut dispatcher = SlackDispatcher::new(settings.clone(), transport);
        if let Some(hook) = self.delivery_hook {
            dispatcher = dispatcher.with_delivery_hook(hook);
        }

        let (events_tx, events_rx) = mpsc::channel(config.performance.queue_capacity.max(1));
        let manager = NotificationManager::new(
            events_rx,
            EventFilter::new(config.events.clone()),
            Arc::new(SlackFormatter::new(settings)),
            dispatcher,
            metrics.clone(),
        )
        .drain_timeout(Duration::from_secs(config.performance.drain_timeout_seconds));

        let (manager_done_tx, manager_done_rx) = oneshot::channel();
        task_manager.spawn("NotificationManager", async move {
            manager.run(stop_rx).await;
            let _ = manager_done_tx.send(());
        });

        let app = App {
            task_manager,
            shutdown_rx,
            stop_tx,
            manager_done_rx,
            metrics,
            metrics_addr,
        };
        Ok((app, events_tx))
    }
}
