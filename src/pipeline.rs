use std::path::Path;

use crate::aggregate::Aggregate;
use crate::classify::Classifier;
use crate::discovery::list_session_logs;
use crate::error::IngestError;
use crate::session::{Loaded, Session, load_session};

#[derive(Debug, Default)]
pub struct Census {
    /// In processing order (oldest log first).
    pub sessions: Vec<Session>,
    pub aggregate: Aggregate,
    pub failures: Vec<IngestError>,
}

/// Scan `log_dir`, build and label one session per log, and fold them into
/// the aggregate. A faulty file is reported and kept with whatever was read.
pub fn analyze_dir(log_dir: &Path, classifier: &Classifier) -> anyhow::Result<Census> {
    let files = list_session_logs(log_dir)?;
    tracing::info!(count = files.len(), dir = %log_dir.display(), "found session files");

    let mut census = Census::default();
    for (i, path) in files.iter().enumerate() {
        if (i + 1) % 10 == 0 {
            tracing::info!("processing session {}/{}", i + 1, files.len());
        }
        let Loaded { mut session, error } = load_session(path);
        if let Some(e) = error {
            tracing::warn!(path = %e.path().display(), error = %e, "error processing session log");
            census.failures.push(e);
        }
        classifier.apply(&mut session);
        tracing::debug!(
            session = %session.session_id,
            lines = session.line_count,
            categories = ?session.categories,
            "session analyzed"
        );
        census.aggregate.add(&session);
        census.sessions.push(session);
    }
    Ok(census)
}
