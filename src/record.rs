use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;

use crate::error::RecordError;

#[derive(Debug, Clone, PartialEq)]
pub struct UserEvent {
    pub text: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantEvent {
    pub model_id: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// One decoded log line.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    User(UserEvent),
    Assistant(AssistantEvent),
    Unrecognized,
}

pub const UNKNOWN_MODEL: &str = "unknown";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawRecord {
    User {
        timestamp: Option<String>,
        #[serde(default)]
        message: UserBody,
    },
    Assistant {
        timestamp: Option<String>,
        #[serde(default)]
        message: AssistantBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct UserBody {
    content: Option<MessageContent>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantBody {
    model: Option<String>,
}

/// The `content` of a user message: either a bare string or a list of blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Items(Vec<Value>),
    Other(Value),
}

impl MessageContent {
    /// Flatten into a single string. List items contribute their `text`
    /// attribute when they are objects carrying one, otherwise their own
    /// textual form; items are joined with single spaces.
    pub fn flatten(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Items(items) => items
                .iter()
                .map(|item| match item.get("text") {
                    Some(text) if item.is_object() => value_text(text),
                    _ => value_text(item),
                })
                .collect::<Vec<_>>()
                .join(" "),
            MessageContent::Other(value) => value_text(value),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse an ISO-8601 timestamp. A trailing `Z` is rewritten to `+00:00`.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, RecordError> {
    let normalized = match raw.strip_suffix('Z') {
        Some(head) => format!("{head}+00:00"),
        None => raw.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalized).map_err(|source| RecordError::Timestamp {
        value: raw.to_string(),
        source,
    })
}

fn parse_optional_timestamp(raw: Option<&str>) -> Result<Option<DateTime<FixedOffset>>, RecordError> {
    raw.map(parse_timestamp).transpose()
}

/// Decode one line. Lines that are not valid records (bad JSON, unexpected
/// shapes, unknown `type`) become `Event::Unrecognized`; only a malformed
/// timestamp on an otherwise valid record is an error.
pub fn parse_line(line: &str) -> Result<Event, RecordError> {
    let record: RawRecord = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(_) => return Ok(Event::Unrecognized),
    };
    match record {
        RawRecord::User { timestamp, message } => Ok(Event::User(UserEvent {
            text: message.content.map(|c| c.flatten()).unwrap_or_default(),
            timestamp: parse_optional_timestamp(timestamp.as_deref())?,
        })),
        RawRecord::Assistant { timestamp, message } => Ok(Event::Assistant(AssistantEvent {
            model_id: message.model.unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
            timestamp: parse_optional_timestamp(timestamp.as_deref())?,
        })),
        RawRecord::Other => Ok(Event::Unrecognized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_line_with_zulu_timestamp() {
        let line = r#"{"timestamp":"2024-01-01T00:00:00Z", "type":"user", "message":{"content":"test this"}}"#;
        let Event::User(ev) = parse_line(line).unwrap() else { panic!("expected user event") };
        assert_eq!(ev.text, "test this");
        let ts = ev.timestamp.unwrap();
        assert_eq!(ts, DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap());
        assert_eq!(ts.offset().local_minus_utc(), 0);
    }

    #[test]
    fn list_content_is_joined_with_spaces() {
        let line = r#"{"type":"user","message":{"content":[{"type":"text","text":"hello"},"bare",{"type":"image"},7]}}"#;
        let Event::User(ev) = parse_line(line).unwrap() else { panic!("expected user event") };
        assert_eq!(ev.text, r#"hello bare {"type":"image"} 7"#);
        assert!(ev.timestamp.is_none());
    }

    #[test]
    fn missing_content_is_empty_text() {
        let Event::User(ev) = parse_line(r#"{"type":"user"}"#).unwrap() else { panic!("expected user event") };
        assert_eq!(ev.text, "");
    }

    #[test]
    fn assistant_model_defaults_to_unknown() {
        let ev = parse_line(r#"{"type":"assistant","message":{"content":[]}}"#).unwrap();
        assert_eq!(ev, Event::Assistant(AssistantEvent { model_id: "unknown".into(), timestamp: None }));

        let ev = parse_line(r#"{"type":"assistant","timestamp":"2024-03-02T10:00:00.5+02:00","message":{"model":"claude-x"}}"#).unwrap();
        let Event::Assistant(a) = ev else { panic!("expected assistant event") };
        assert_eq!(a.model_id, "claude-x");
        assert!(a.timestamp.is_some());
    }

    #[test]
    fn undecodable_lines_are_unrecognized() {
        for line in ["", "not json", "{\"type\":", "42", "[1,2]", r#"{"type":"summary","summary":"x"}"#, r#"{"no_type":true}"#, r#"{"type":"user","message":"flat"}"#] {
            assert_eq!(parse_line(line).unwrap(), Event::Unrecognized, "line: {line}");
        }
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let err = parse_line(r#"{"type":"user","timestamp":"yesterday","message":{"content":"hi"}}"#).unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }
}
