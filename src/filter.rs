//! Subscription filtering of inbound events.
//!
//! A subscription maps an event kind to the tags that must be present for
//! an event of that kind to be forwarded:
//!
//! ```toml
//! [events]
//! ops = "*"
//! response = "*"
//! log = ["error", "warn"]
//! ```

use crate::core::Event;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const WILDCARD: &str = "*";

/// Tags selected for one event kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Subscription {
    /// `"*"` selects every event; any other string selects a single tag.
    One(String),
    /// Any of the listed tags. An empty list selects every event.
    Many(Vec<String>),
}

impl Subscription {
    fn accepts(&self, tags: &[String]) -> bool {
        match self {
            Subscription::One(tag) if tag == WILDCARD => true,
            Subscription::One(tag) => tags.contains(tag),
            Subscription::Many(wanted) if wanted.is_empty() => true,
            Subscription::Many(wanted) => wanted.iter().any(|tag| tags.contains(tag)),
        }
    }
}

/// Decides which events are forwarded.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    subscriptions: BTreeMap<String, Subscription>,
}

impl EventFilter {
    /// Creates a filter. An empty subscription map accepts every event.
    pub fn new(subscriptions: BTreeMap<String, Subscription>) -> Self {
        Self { subscriptions }
    }

    pub fn accepts(&self, event: &Event) -> bool {
        if self.subscriptions.is_empty() {
            return true;
        }
        self.subscriptions
            .get(event.kind())
            .is_some_and(|subscription| subscription.accepts(event.tags()))
    }
}
