//! The notification manager is the actor that turns inbound events into
//! webhook deliveries, one delivery per accepted event, in arrival order.

use crate::core::Event;
use crate::filter::EventFilter;
use crate::formatting::EventFormatter;
use crate::internal_metrics::Metrics;
use crate::notification::delivery::DeliveryReport;
use crate::notification::slack::SlackDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The `NotificationManager` actor.
pub struct NotificationManager {
    events_rx: mpsc::Receiver<Event>,
    filter: EventFilter,
    formatter: Arc<dyn EventFormatter>,
    dispatcher: SlackDispatcher,
    metrics: Metrics,
    drain_timeout: Duration,
}

impl NotificationManager {
    /// Creates a new `NotificationManager`.
    pub fn new(
        events_rx: mpsc::Receiver<Event>,
        filter: EventFilter,
        formatter: Arc<dyn EventFormatter>,
        dispatcher: SlackDispatcher,
        metrics: Metrics,
    ) -> Self {
        Self {
            events_rx,
            filter,
            formatter,
            dispatcher,
            metrics,
            drain_timeout: Duration::from_secs(5),
        }
    }

    /// Sets how long `run` waits for in-flight deliveries before returning.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Runs the manager's main loop until the event channel closes or a
    /// shutdown signal arrives.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<()>) {
        let mut in_flight: JoinSet<DeliveryReport> = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                Ok(()) = shutdown_rx.changed() => {
                    info!("NotificationManager received shutdown signal.");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("Delivery task panicked: {}", e);
                    }
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event, &mut in_flight),
                        None => {
                            info!("Event channel closed. Shutting down NotificationManager.");
                            break;
                        }
                    }
                }
            }
        }

        self.drain(in_flight).await;
    }

    fn handle_event(&self, event: Event, in_flight: &mut JoinSet<DeliveryReport>) {
        self.metrics.events_received_total.increment(1);

        if !self.filter.accepts(&event) {
            debug!(kind = event.kind(), "Event not subscribed, skipping");
            self.metrics.events_filtered_total.increment(1);
            return;
        }

        let notification = self.formatter.format(&event);
        debug!(kind = event.kind(), "Dispatching notification");
        in_flight.spawn(self.dispatcher.delivery(&notification));
    }

    /// Gives in-flight deliveries a bounded amount of time to finish.
    async fn drain(&self, mut in_flight: JoinSet<DeliveryReport>) {
        if in_flight.is_empty() {
            return;
        }

        debug!("Waiting for {} in-flight deliveries.", in_flight.len());
        let wait = async { while in_flight.join_next().await.is_some() {} };
        if tokio::time::timeout(self.drain_timeout, wait).await.is_err() {
            warn!(
                "{} deliveries still in flight after {:?}, abandoning them.",
                in_flight.len(),
                self.drain_timeout
            );
            in_flight.abort_all();
        }
    }
}
