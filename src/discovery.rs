use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const LOG_EXTENSION: &str = "jsonl";

/// Session logs directly under `dir`, oldest modification first.
pub fn list_session_logs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("log directory {} does not exist", dir.display());
    }
    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    for res in WalkBuilder::new(dir).max_depth(Some(1)).standard_filters(false).build() {
        let dirent = match res {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = dirent.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        let modified = dirent
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((modified, path.to_path_buf()));
    }
    found.sort();
    Ok(found.into_iter().map(|(_, p)| p).collect())
}
