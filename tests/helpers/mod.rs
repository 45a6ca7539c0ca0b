#![allow(dead_code)]
pub mod app;

use serde_json::Value;

/// Epoch millis that render as `141218/033519.797` in UTC.
pub const NOW: i64 = 1418873719797;

/// Parses a JSON literal into an event record value.
pub fn record(json: &str) -> Value {
    serde_json::from_str(json).expect("test record is not JSON")
}
