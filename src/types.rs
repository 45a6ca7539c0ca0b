//! Common type aliases used throughout the application.

use crate::core::Event;
use tokio::sync::mpsc;

/// Feeds events to a running reporter. Dropping every clone ends the stream.
pub type EventSender = mpsc::Sender<Event>;
