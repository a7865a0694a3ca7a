use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classify::MatchMode;
use crate::report::ReportLimits;

pub const DEFAULT_OUTPUT: &str = "conversation-log-analysis.json";

/// One layer of settings; unset fields fall through to the next layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SettingsLayer {
    pub log_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub match_mode: Option<MatchMode>,
    pub top_days: Option<usize>,
    pub top_largest: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub log_dir: PathBuf,
    pub output: PathBuf,
    pub match_mode: MatchMode,
    pub limits: ReportLimits,
}

pub fn load_settings_file(path: &Path) -> anyhow::Result<SettingsLayer> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading settings {}", path.display()))?;
    let layer = serde_json::from_str(&raw).with_context(|| format!("parsing settings {}", path.display()))?;
    Ok(layer)
}

/// Command line beats the settings file, which beats built-in defaults.
pub fn resolve_effective_settings(file: &SettingsLayer, cli: &SettingsLayer) -> EffectiveSettings {
    let defaults = ReportLimits::default();
    EffectiveSettings {
        log_dir: cli
            .log_dir
            .clone()
            .or_else(|| file.log_dir.clone())
            .unwrap_or_else(|| PathBuf::from(".")),
        output: cli
            .output
            .clone()
            .or_else(|| file.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
        match_mode: cli.match_mode.or(file.match_mode).unwrap_or_default(),
        limits: ReportLimits {
            top_days: cli.top_days.or(file.top_days).unwrap_or(defaults.top_days),
            top_largest: cli.top_largest.or(file.top_largest).unwrap_or(defaults.top_largest),
        },
    }
}
