//! The transport-agnostic shape of a notification.

use serde::Serialize;
use serde_json::Value;

/// Fields of an attachment in which the webhook should render markdown.
pub const MRKDWN_IN: [&str; 3] = ["pretext", "text", "fields"];

/// What the formatter decided to say about one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    /// A rich attachment with pretext, fields and color.
    Attachment(Attachment),
    /// A bare line of text, used by basic mode.
    Text(String),
}

/// Attachment color hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Good,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub pretext: String,
    pub mrkdwn_in: [&'static str; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

impl Attachment {
    /// An attachment carrying only the pretext and the markdown marker.
    pub fn with_pretext(pretext: String) -> Self {
        Self {
            pretext,
            mrkdwn_in: MRKDWN_IN,
            fallback: None,
            text: None,
            color: None,
            fields: Vec::new(),
        }
    }
}

/// One titled value in an attachment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub title: String,
    /// Omitted from the payload when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<bool>,
}

impl Field {
    pub fn new(title: &str, value: impl Into<Value>) -> Self {
        Self {
            title: title.to_string(),
            value: Some(value.into()),
            short: None,
        }
    }

    /// A field whose value may be absent from the source record.
    pub fn optional(title: &str, value: Option<Value>) -> Self {
        Self {
            title: title.to_string(),
            value,
            short: None,
        }
    }

    /// A field the webhook may lay out side by side with its neighbours.
    pub fn short(title: &str, value: impl Into<Value>) -> Self {
        Self {
            short: Some(true),
            ..Self::new(title, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_optionals_are_omitted() {
        let attachment = Attachment::with_pretext("hello".into());
        assert_eq!(
            serde_json::to_value(&attachment).unwrap(),
            json!({ "pretext": "hello", "mrkdwn_in": ["pretext", "text", "fields"] })
        );
    }

    #[test]
    fn test_color_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Color::Danger).unwrap(), json!("danger"));
        assert_eq!(serde_json::to_value(Color::Good).unwrap(), json!("good"));
    }

    #[test]
    fn test_short_field() {
        let field = Field::short("Memory", "29 Mb.");
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({ "title": "Memory", "value": "29 Mb.", "short": true })
        );
    }
}
