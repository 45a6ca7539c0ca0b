//! Outcomes of individual webhook deliveries.
//!
//! Delivery results never flow back into event processing. They are logged,
//! counted, and handed to an optional [`DeliveryHook`] for diagnostics.

use std::sync::Arc;
use std::time::Duration;

/// A caller-supplied observer invoked once per finished delivery.
pub type DeliveryHook = Arc<dyn Fn(&DeliveryReport) + Send + Sync>;

/// How a single POST ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered with a 2xx status.
    Delivered { status: u16 },
    /// The endpoint answered with a non-2xx status.
    Rejected { status: u16, body: String },
    /// No answer was obtained.
    Failed { error: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    /// Label used for the `outcome` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered { .. } => "delivered",
            DeliveryOutcome::Rejected { .. } => "rejected",
            DeliveryOutcome::Failed { .. } => "failed",
        }
    }
}

/// Everything known about one finished delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub url: String,
    /// The exact body that was posted.
    pub body: String,
    pub outcome: DeliveryOutcome,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(DeliveryOutcome::Delivered { status: 200 }.label(), "delivered");
        assert_eq!(
            DeliveryOutcome::Rejected { status: 500, body: String::new() }.label(),
            "rejected"
        );
        assert_eq!(DeliveryOutcome::Failed { error: "boom".into() }.label(), "failed");
        assert!(DeliveryOutcome::Delivered { status: 204 }.is_delivered());
        assert!(!DeliveryOutcome::Failed { error: "boom".into() }.is_delivered());
    }
}
