// src/formatting.rs

use crate::config::ReporterSettings;
use crate::core::{ErrorEvent, Event, EventData, LogEvent, OpsEvent, RequestEvent, ResponseEvent};
use crate::notification::message::{Attachment, Color, Field, Notification};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use tracing::warn;

const BYTES_PER_MEBIBYTE: f64 = 1024.0 * 1024.0;

/// Stands in for any value that cannot be serialized.
pub const UNSERIALIZABLE: &str = "[Unserializable]";

/// A trait for turning one event into one notification.
pub trait EventFormatter: Send + Sync {
    fn format(&self, event: &Event) -> Notification;
}

/// Renders events as Slack attachments.
pub struct SlackFormatter {
    settings: Arc<ReporterSettings>,
}

impl SlackFormatter {
    pub fn new(settings: Arc<ReporterSettings>) -> Self {
        Self { settings }
    }

    fn render_timestamp(&self, millis: i64) -> String {
        let Some(time) = DateTime::<Utc>::from_timestamp_millis(millis) else {
            return millis.to_string();
        };
        let mut rendered = String::new();
        match write!(rendered, "{}", time.format(self.settings.time_format())) {
            Ok(()) => rendered,
            Err(_) => millis.to_string(),
        }
    }

    fn preamble(&self, event: &Event) -> Attachment {
        Attachment::with_pretext(format!(
            "`{}` event from *{}* at {}",
            event.kind(),
            self.settings.origin_label(),
            self.render_timestamp(event.timestamp())
        ))
    }

    fn format_ops(&self, mut attachment: Attachment, ops: &OpsEvent) -> Attachment {
        let memory = format!(
            "{} Mb.",
            (ops.proc.mem.rss as f64 / BYTES_PER_MEBIBYTE).round() as u64
        );
        let load: Vec<String> = ops.os.load.iter().map(|avg| two_decimals(*avg)).collect();

        attachment.fallback = Some(format!(
            "L: {} | M: {} | U: {}",
            load[1], memory, ops.proc.uptime
        ));
        attachment.fields = vec![
            Field::short("Memory", memory),
            Field::short("Uptime (seconds)", ops.proc.uptime.clone()),
            Field::short("Load", load.join(" | ")),
        ];
        attachment
    }

    fn format_response(&self, mut attachment: Attachment, response: &ResponseEvent) -> Attachment {
        let method = response.method.to_uppercase();

        attachment.fallback = Some(format!(
            "{} {} {}",
            response.status_code, method, response.path
        ));
        attachment.color = Some(status_color(response.status_code));
        attachment.text = Some(format!(
            "*{}* {} {} {} ({}ms)",
            method,
            response.path,
            stringify(&response.query),
            response.status_code,
            response.response_time
        ));
        attachment
    }

    fn format_error(&self, mut attachment: Attachment, error: &ErrorEvent) -> Attachment {
        let summary = error.error.summary();

        attachment.fallback = Some(summary.clone());
        attachment.text = Some(format!(
            "*{}* {}",
            error.method.to_uppercase(),
            error.url.request_path()
        ));
        attachment.color = Some(Color::Danger);
        attachment.fields = vec![
            Field::new("Error", summary),
            Field::new("Stack", code_block(&error.error.stack_trace())),
        ];
        attachment
    }

    fn format_request(&self, mut attachment: Attachment, request: &RequestEvent) -> Attachment {
        let tags = request.tags.join(", ");
        let (data, data_fallback) = render_data(&request.data);

        attachment.fallback = Some(format!("{} {}", tags, data_fallback));
        attachment.text = Some(format!(
            "*{}* {}",
            request.method.to_uppercase(),
            request.path
        ));
        if request.tags.iter().any(|tag| tag == "error") {
            attachment.color = Some(Color::Danger);
        }
        attachment.fields = vec![
            Field::optional("PID", request.pid.clone()),
            Field::optional("Request ID", request.id.clone()),
            Field::new("Tags", tags),
            Field::new("Data", data),
        ];
        attachment
    }

    fn format_log(&self, mut attachment: Attachment, log: &LogEvent) -> Attachment {
        let tags = log.tags.iter().join(",");
        let (data, data_fallback) = render_data(&log.data);

        attachment.fallback = Some(format!("{} {}", tags, data_fallback).trim().to_string());
        attachment.fields = vec![Field::new("Tags", tags), Field::new("Data", data)];
        attachment
    }
}

impl EventFormatter for SlackFormatter {
    fn format(&self, event: &Event) -> Notification {
        if let Event::Log(log) = event {
            if self.settings.basic_mode() {
                return Notification::Text(render_data(&log.data).1);
            }
        }

        let attachment = self.preamble(event);
        let attachment = match event {
            Event::Ops(ops) => self.format_ops(attachment, ops),
            Event::Response(response) => self.format_response(attachment, response),
            Event::Error(error) => self.format_error(attachment, error),
            Event::Request(request) => self.format_request(attachment, request),
            Event::Log(log) => self.format_log(attachment, log),
        };
        Notification::Attachment(attachment)
    }
}

/// Two decimals, rounding ties away from zero (`0.125` becomes `0.13`).
fn two_decimals(value: f64) -> String {
    format!("{:.2}", (value * 100.0).round() / 100.0)
}

/// `good` below 400, `danger` otherwise.
pub fn status_color(status_code: i64) -> Color {
    if status_code < 400 {
        Color::Good
    } else {
        Color::Danger
    }
}

/// Wraps text in a fixed-width markdown code block.
pub fn code_block(text: &str) -> String {
    format!("```\n{}\n```", text)
}

/// Returns the field rendering and the fallback rendering of event data.
///
/// Objects, arrays and `null` are pretty-printed inside a code block for the field
/// and compacted for the fallback. Strings are used verbatim for both.
fn render_data(data: &EventData) -> (String, String) {
    match data {
        EventData::Text(text) => (text.clone(), text.clone()),
        // `null` is rendered like an object, the way the event producers expect.
        EventData::Structured(value) if value.is_object() || value.is_array() || value.is_null() => {
            (code_block(&stringify_pretty(value)), stringify(value))
        }
        EventData::Structured(value) => (stringify(value), stringify(value)),
    }
}

/// Compact JSON. Never fails: unserializable input yields a placeholder.
pub fn stringify<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize value, substituting placeholder");
        format!("\"{}\"", UNSERIALIZABLE)
    })
}

/// Pretty JSON with a 2-space indent. Never fails.
pub fn stringify_pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize value, substituting placeholder");
        format!("\"{}\"", UNSERIALIZABLE)
    })
}
