//! Inbound event source
//!
//! Reads newline-delimited JSON events from any async reader and forwards
//! them, in arrival order, to the notification manager.

use crate::core::{Event, EventError};
use crate::internal_metrics::Metrics;
use anyhow::Result;
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, watch};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tracing::{debug, info, instrument, warn};

/// Parses one JSON line into an [`Event`].
pub fn parse_event(line: &str) -> Result<Event, EventError> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    Event::try_from(value)
}

/// Reads events line by line from an async reader.
pub struct LineEventSource<R> {
    reader: R,
    events_tx: mpsc::Sender<Event>,
    metrics: Metrics,
}

impl<R> LineEventSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, events_tx: mpsc::Sender<Event>, metrics: Metrics) -> Self {
        Self {
            reader,
            events_tx,
            metrics,
        }
    }

    /// Forwards every parsable line until EOF, shutdown, or the event
    /// channel closing.
    ///
    /// Blank lines are skipped silently; malformed lines are logged and
    /// skipped. Only a read error on the underlying reader is returned.
    #[instrument(skip_all)]
    pub async fn run(self, mut shutdown_rx: watch::Receiver<()>) -> Result<()> {
        let mut lines = LinesStream::new(tokio::io::AsyncBufReadExt::lines(self.reader));
        let mut line_number = 0usize;

        loop {
            let line = tokio::select! {
                biased;
                Ok(()) = shutdown_rx.changed() => {
                    info!("Event source received shutdown signal.");
                    break;
                }
                line = lines.next() => line,
            };

            let line = match line {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    info!("Event source reached end of input.");
                    break;
                }
            };
            line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let event = match parse_event(trimmed) {
                Ok(event) => event,
                Err(e) => {
                    warn!(line = line_number, error = %e, "Skipping malformed event");
                    self.metrics.events_malformed_total.increment(1);
                    continue;
                }
            };

            debug!(line = line_number, kind = event.kind(), "Read event");
            if self.events_tx.send(event).await.is_err() {
                info!("Event channel closed. Stopping event source.");
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    fn source(
        reader: tokio_test::io::Mock,
    ) -> (LineEventSource<BufReader<tokio_test::io::Mock>>, mpsc::Receiver<Event>) {
        let (events_tx, events_rx) = mpsc::channel(16);
        (
            LineEventSource::new(BufReader::new(reader), events_tx, Metrics::disabled()),
            events_rx,
        )
    }

    async fn collect(mut events_rx: mpsc::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = events_rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_parse_event_reads_kind() {
        let event = parse_event(r#"{"event":"log","timestamp":1,"tags":["a"],"data":"x"}"#).unwrap();
        assert_eq!(event.kind(), "log");
        assert_eq!(event.tags(), ["a".to_string()]);
    }

    #[test]
    fn test_parse_event_rejects_garbage() {
        assert!(matches!(parse_event("not json"), Err(EventError::InvalidJson(_))));
        assert!(matches!(parse_event(r#"{"timestamp":1}"#), Err(EventError::MissingKind)));
        assert!(matches!(
            parse_event(r#"{"event":"response","timestamp":1}"#),
            Err(EventError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_forwards_events_in_order() {
        let reader = Builder::new()
            .read(b"{\"event\":\"log\",\"timestamp\":1,\"data\":\"first\"}\n")
            .read(b"{\"event\":\"custom\",\"timestamp\":2,\"data\":\"second\"}\n")
            .build();
        let (source, events_rx) = source(reader);
        let (_shutdown_tx, shutdown_rx) = watch::channel(());

        source.run(shutdown_rx).await.unwrap();

        let events = collect(events_rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp(), 1);
        assert_eq!(events[1].kind(), "custom");
    }

    #[tokio::test]
    async fn test_skips_blank_and_malformed_lines() {
        let reader = Builder::new()
            .read(b"\n   \n{broken\n")
            .read(b"{\"timestamp\":5}\n")
            .read(b"{\"event\":\"log\",\"timestamp\":3,\"data\":\"kept\"}")
            .build();
        let (source, events_rx) = source(reader);
        let (_shutdown_tx, shutdown_rx) = watch::channel(());

        source.run(shutdown_rx).await.unwrap();

        let events = collect(events_rx).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp(), 3);
    }

    #[tokio::test]
    async fn test_read_error_is_returned() {
        let reader = Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            .build();
        let (source, _events_rx) = source(reader);
        let (_shutdown_tx, shutdown_rx) = watch::channel(());

        assert!(source.run(shutdown_rx).await.is_err());
    }

    #[tokio::test]
    async fn test_stops_when_channel_closes() {
        let reader = Builder::new()
            .read(b"{\"event\":\"log\",\"timestamp\":1,\"data\":\"a\"}\n")
            .build();
        let (source, events_rx) = source(reader);
        drop(events_rx);
        let (_shutdown_tx, shutdown_rx) = watch::channel(());

        source.run(shutdown_rx).await.unwrap();
    }
}
