use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{IngestError, RecordError};
use crate::record::{self, Event};

pub const USER_PREVIEW_CHARS: usize = 500;
pub const PROBE_PREVIEW_CHARS: usize = 1000;
pub const PROBE_MESSAGES: usize = 3;

/// Optional timestamps persisted as RFC 3339 with an explicit offset (`+00:00`, never `Z`).
mod rfc3339_opt {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<FixedOffset>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(t) => s.serialize_some(&t.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub content: String,
    #[serde(default, with = "rfc3339_opt")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub full_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub model: String,
    #[serde(default, with = "rfc3339_opt")]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// The reconstructed record of one log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub source_path: PathBuf,
    pub user_messages: Vec<UserMessage>,
    pub assistant_messages: Vec<AssistantMessage>,
    /// First few user texts, used only for classification.
    pub first_user_messages: Vec<String>,
    pub models_used: BTreeSet<String>,
    #[serde(default, with = "rfc3339_opt")]
    pub first_timestamp: Option<DateTime<FixedOffset>>,
    #[serde(default, with = "rfc3339_opt")]
    pub last_timestamp: Option<DateTime<FixedOffset>>,
    pub file_size: u64,
    pub line_count: usize,
    /// Topic labels in table order; never empty once classified.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
}

impl Session {
    pub fn new(source_path: PathBuf, file_size: u64) -> Self {
        let session_id = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            session_id,
            source_path,
            user_messages: Vec::new(),
            assistant_messages: Vec::new(),
            first_user_messages: Vec::new(),
            models_used: BTreeSet::new(),
            first_timestamp: None,
            last_timestamp: None,
            file_size,
            line_count: 0,
            categories: Vec::new(),
            emotions: Vec::new(),
        }
    }

    pub fn first_preview(&self) -> Option<&str> {
        self.first_user_messages.first().map(String::as_str)
    }

    /// Feed one raw line (terminator stripped). Bytes that are not UTF-8
    /// count as a line but are otherwise skipped.
    pub fn ingest_bytes(&mut self, raw: &[u8]) -> Result<(), RecordError> {
        match std::str::from_utf8(raw) {
            Ok(line) => self.ingest_line(line),
            Err(_) => {
                self.line_count += 1;
                Ok(())
            }
        }
    }

    /// Feed one line in file order.
    pub fn ingest_line(&mut self, line: &str) -> Result<(), RecordError> {
        self.line_count += 1;
        match record::parse_line(line)? {
            Event::User(ev) => {
                self.observe(ev.timestamp);
                if self.first_user_messages.len() < PROBE_MESSAGES {
                    self.first_user_messages.push(truncate_chars(&ev.text, PROBE_PREVIEW_CHARS));
                }
                self.user_messages.push(UserMessage {
                    content: truncate_chars(&ev.text, USER_PREVIEW_CHARS),
                    timestamp: ev.timestamp,
                    full_length: ev.text.chars().count(),
                });
            }
            Event::Assistant(ev) => {
                self.observe(ev.timestamp);
                self.models_used.insert(ev.model_id.clone());
                self.assistant_messages.push(AssistantMessage {
                    model: ev.model_id,
                    timestamp: ev.timestamp,
                });
            }
            Event::Unrecognized => {}
        }
        Ok(())
    }

    fn observe(&mut self, ts: Option<DateTime<FixedOffset>>) {
        let Some(ts) = ts else { return };
        if self.first_timestamp.is_none_or(|first| ts < first) {
            self.first_timestamp = Some(ts);
        }
        if self.last_timestamp.is_none_or(|last| ts > last) {
            self.last_timestamp = Some(ts);
        }
    }
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// A session plus the fault, if any, that cut its ingestion short.
#[derive(Debug)]
pub struct Loaded {
    pub session: Session,
    pub error: Option<IngestError>,
}

/// Build a session from lines of `reader`. Stops at the first read or
/// record fault and returns what was accumulated up to that point.
pub fn build_session<R: BufRead>(path: &Path, file_size: u64, mut reader: R) -> Loaded {
    let mut session = Session::new(path.to_path_buf(), file_size);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let line_no = session.line_count + 1;
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(source) => {
                let error = IngestError::Read { path: path.to_path_buf(), line: line_no, source };
                return Loaded { session, error: Some(error) };
            }
        }
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if let Err(source) = session.ingest_bytes(raw) {
            let error = IngestError::Record { path: path.to_path_buf(), line: line_no, source };
            return Loaded { session, error: Some(error) };
        }
    }
    Loaded { session, error: None }
}

pub fn load_session(path: &Path) -> Loaded {
    let opened = File::open(path).and_then(|f| f.metadata().map(|m| (f, m.len())));
    match opened {
        Ok((file, size)) => build_session(path, size, BufReader::new(file)),
        Err(source) => Loaded {
            session: Session::new(path.to_path_buf(), 0),
            error: Some(IngestError::Open { path: path.to_path_buf(), source }),
        },
    }
}
