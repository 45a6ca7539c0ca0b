//! # Internal Metrics Module
//!
//! Collects counters about the event pipeline and optionally exposes them
//! on a Prometheus `/metrics` endpoint.
//!
//! - **`MetricsBuilder`** installs the Prometheus recorder, binds the
//!   listener and constructs the `Metrics` handle.
//! - **`Metrics`** is the cloneable handle the pipeline updates.
//! - **`MetricsServer`** (in `server.rs`) serves the scrape endpoint.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use metrics::{Counter, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub events_received_total: Counter,
    pub events_filtered_total: Counter,
    pub events_malformed_total: Counter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Registers descriptions for all metrics with the global recorder and
    /// returns handles to the pipeline counters.
    pub fn new() -> Self {
        metrics::describe_counter!("events_received_total", Unit::Count, "Total number of events received by the notification manager.");
        metrics::describe_counter!("events_filtered_total", Unit::Count, "Total number of events dropped because they are not subscribed.");
        metrics::describe_counter!("events_malformed_total", Unit::Count, "Total number of input lines that could not be parsed as events.");
        metrics::describe_counter!("notifications_dispatched_total", Unit::Count, "Total number of notifications handed to the webhook transport.");
        metrics::describe_counter!("deliveries_total", Unit::Count, "Total number of finished deliveries, labeled by outcome.");
        metrics::describe_histogram!("delivery_duration_seconds", Unit::Seconds, "The time taken by a single webhook POST.");

        Self {
            events_received_total: metrics::counter!("events_received_total"),
            events_filtered_total: metrics::counter!("events_filtered_total"),
            events_malformed_total: metrics::counter!("events_malformed_total"),
        }
    }

    /// Creates a `Metrics` instance whose counters go nowhere.
    pub fn disabled() -> Self {
        Self {
            events_received_total: Counter::noop(),
            events_filtered_total: Counter::noop(),
            events_malformed_total: Counter::noop(),
        }
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system.
    ///
    /// Returns a disabled `Metrics` and no server when metrics are turned
    /// off or the recorder cannot be installed. A failure here never stops
    /// the reporter.
    pub fn build(
        self,
        shutdown_rx: watch::Receiver<()>,
    ) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Failed to configure Prometheus buckets: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        let (listener, addr) = match bind(self.config.listen_address) {
            Ok(bound) => bound,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::disabled(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);
        (metrics, Some((server, addr)))
    }
}

fn bind(address: SocketAddr) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = std::net::TcpListener::bind(address)?;
    let addr = listener.local_addr()?;
    // Tokio requires a non-blocking socket.
    listener.set_nonblocking(true)?;
    Ok((TcpListener::from_std(listener)?, addr))
}

pub mod server;
