//! Turns events into webhook deliveries.
//!
//! The `manager` receives events and applies the subscription filter, the
//! formatter produces a [`message::Notification`], and the `slack`
//! dispatcher posts it through a [`crate::core::WebhookTransport`] on a
//! detached task. Outcomes are described in `delivery`.
pub mod delivery;
pub mod manager;
pub mod message;
pub mod slack;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod transport;

pub use delivery::{DeliveryHook, DeliveryOutcome, DeliveryReport};
pub use message::{Attachment, Color, Field, Notification};
pub use slack::SlackDispatcher;
pub use transport::ReqwestTransport;
