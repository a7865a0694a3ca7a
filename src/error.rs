use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// A fault that stops ingestion of one log file. The session built so far is kept.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read failed in {} at line {line}: {source}", path.display())]
    Read {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("bad record in {} at line {line}: {source}", path.display())]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: RecordError,
    },
}

impl IngestError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            IngestError::Open { path, .. }
            | IngestError::Read { path, .. }
            | IngestError::Record { path, .. } => path,
        }
    }
}
