use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::aggregate::Aggregate;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub total_sessions: usize,
    pub total_size_mb: f64,
    pub total_messages: usize,
    pub total_user_messages: usize,
    #[serde(default)]
    pub total_assistant_messages: usize,
}

/// Everything persisted for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub overview: Overview,
    pub sessions: Vec<Session>,
    pub category_stats: BTreeMap<String, usize>,
    pub model_stats: BTreeMap<String, usize>,
    pub daily_activity: BTreeMap<String, usize>,
}

impl Snapshot {
    pub fn new(sessions: Vec<Session>, agg: &Aggregate) -> Self {
        let totals = &agg.totals;
        Self {
            overview: Overview {
                total_sessions: totals.sessions,
                total_size_mb: totals.size_mb(),
                total_messages: totals.messages(),
                total_user_messages: totals.user_messages,
                total_assistant_messages: totals.assistant_messages,
            },
            sessions,
            category_stats: agg.topics.to_string_map(),
            model_stats: agg.models.to_string_map(),
            daily_activity: agg.daily_activity.to_string_map(),
        }
    }
}

/// Replace whatever is at `path` with `snapshot`.
pub fn write(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).with_context(|| format!("writing snapshot {}", path.display()))?;
    Ok(())
}

pub fn read(path: &Path) -> anyhow::Result<Snapshot> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    let snapshot = serde_json::from_str(&raw).with_context(|| format!("decoding snapshot {}", path.display()))?;
    Ok(snapshot)
}
