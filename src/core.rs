//! Core domain types and service traits for eventhook
//!
//! This module defines the inbound event model and the trait contract for
//! the outbound webhook transport.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Errors raised while turning a raw record into an [`Event`].
#[derive(Error, Debug)]
pub enum EventError {
    #[error("event record has no string `event` field")]
    MissingKind,

    #[error("malformed `{kind}` event: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// A structured record observed by the upstream source.
///
/// The kind is carried by the `event` field of the JSON record. Any kind
/// other than the four well-known ones is treated as a generic log record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Event {
    Ops(OpsEvent),
    Response(ResponseEvent),
    Request(RequestEvent),
    Error(ErrorEvent),
    Log(LogEvent),
}

impl Event {
    /// The kind name as it appeared on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Event::Ops(_) => "ops",
            Event::Response(_) => "response",
            Event::Request(_) => "request",
            Event::Error(_) => "error",
            Event::Log(log) => &log.kind,
        }
    }

    /// Epoch milliseconds at which the event was observed.
    pub fn timestamp(&self) -> i64 {
        match self {
            Event::Ops(e) => e.timestamp,
            Event::Response(e) => e.timestamp,
            Event::Request(e) => e.timestamp,
            Event::Error(e) => e.timestamp,
            Event::Log(e) => e.timestamp,
        }
    }

    /// Tags attached to the event. Only request and generic events carry tags.
    pub fn tags(&self) -> &[String] {
        match self {
            Event::Request(e) => &e.tags,
            Event::Log(e) => &e.tags,
            Event::Ops(_) | Event::Response(_) | Event::Error(_) => &[],
        }
    }
}

impl TryFrom<Value> for Event {
    type Error = EventError;

    fn try_from(value: Value) -> Result<Self, EventError> {
        let kind = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingKind)?
            .to_owned();

        let malformed = |source| EventError::Malformed {
            kind: kind.clone(),
            source,
        };

        let event = match kind.as_str() {
            "ops" => Event::Ops(serde_json::from_value(value).map_err(malformed)?),
            "response" => Event::Response(serde_json::from_value(value).map_err(malformed)?),
            "request" => Event::Request(serde_json::from_value(value).map_err(malformed)?),
            "error" => Event::Error(serde_json::from_value(value).map_err(malformed)?),
            _ => {
                let mut log: LogEvent = serde_json::from_value(value).map_err(malformed)?;
                log.kind = kind.clone();
                Event::Log(log)
            }
        };
        Ok(event)
    }
}

/// Process and OS metrics snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpsEvent {
    pub timestamp: i64,
    pub proc: ProcessStats,
    pub os: OsStats,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessStats {
    pub mem: ProcessMemory,
    /// Process uptime in seconds, kept as the number it was sent as.
    pub uptime: Number,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessMemory {
    /// Resident set size in bytes.
    pub rss: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsStats {
    /// 1, 5 and 15 minute load averages.
    pub load: [f64; 3],
}

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvent {
    pub timestamp: i64,
    pub method: String,
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: Map<String, Value>,
    pub status_code: i64,
    /// Response time in milliseconds.
    pub response_time: Number,
}

/// A log record emitted in the context of an HTTP request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestEvent {
    pub timestamp: i64,
    pub method: String,
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub data: EventData,
    /// `None` when the record has no `pid` key; an explicit `null` is kept.
    #[serde(default, deserialize_with = "present")]
    pub pid: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
}

/// An error raised while serving a request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorEvent {
    pub timestamp: i64,
    pub method: String,
    pub url: RequestUrl,
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RequestUrl {
    /// Path including the query string.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub pathname: Option<String>,
}

impl RequestUrl {
    /// The request path, preferring the variant that carries the query string.
    pub fn request_path(&self) -> &str {
        self.path
            .as_deref()
            .or(self.pathname.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorDetails {
    #[serde(default = "default_error_name")]
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

impl ErrorDetails {
    /// `"<name>: <message>"`
    pub fn summary(&self) -> String {
        format!("{}: {}", self.name, self.message)
    }

    /// The stack trace, or the summary line when the record carries none.
    pub fn stack_trace(&self) -> String {
        self.stack.clone().unwrap_or_else(|| self.summary())
    }
}

fn default_error_name() -> String {
    "Error".to_string()
}

/// A free-form log record. `kind` holds whatever the `event` field said.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogEvent {
    #[serde(skip)]
    pub kind: String,
    pub timestamp: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub data: EventData,
}

/// The payload of a log-style event: either a plain line or a JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Text(String),
    Structured(Value),
}

impl Default for EventData {
    fn default() -> Self {
        EventData::Text(String::new())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Only called when the key exists, so `null` becomes `Some(Value::Null)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// =============================================================================
// Service Traits
// =============================================================================

/// What the webhook endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors from the outbound HTTP transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Posts a serialized payload to a URL.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Sends `body` as the JSON body of a `POST` to `url`.
    ///
    /// # Returns
    /// * `Ok(TransportResponse)` for any HTTP answer, including non-2xx
    /// * `Err` when no answer was obtained (connect error, timeout, ...)
    async fn post(&self, url: &str, body: String) -> Result<TransportResponse, TransportError>;
}
