use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

mod aggregate;
mod classify;
mod discovery;
mod error;
mod pipeline;
mod record;
mod report;
mod session;
mod settings;
mod snapshot;

use classify::{Classifier, MatchMode};
use settings::SettingsLayer;

#[derive(Debug, Parser)]
#[command(name = "session_census")]
#[command(about = "Summarize and classify assistant session logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a directory of .jsonl session logs and write a snapshot.
    Analyze {
        #[arg(long)]
        log_dir: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// JSON settings file; flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        match_mode: Option<MatchMode>,
        #[arg(long)]
        top_days: Option<usize>,
        #[arg(long)]
        top_largest: Option<usize>,
    },
    /// Print the report stored in an earlier snapshot.
    Show {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        top_days: Option<usize>,
        #[arg(long)]
        top_largest: Option<usize>,
    },
}

/// `RUST_LOG`-style directives; anything unset falls back to `info`.
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).parse_lossy(directives)
}

fn main() -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    fmt().with_env_filter(log_filter(&directives)).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze { log_dir, output, config, match_mode, top_days, top_largest } => {
            let file_layer = match config {
                Some(path) => settings::load_settings_file(&path)?,
                None => SettingsLayer::default(),
            };
            let cli_layer = SettingsLayer { log_dir, output, match_mode, top_days, top_largest };
            let eff = settings::resolve_effective_settings(&file_layer, &cli_layer);

            let classifier = Classifier::new(eff.match_mode).context("compiling keyword tables")?;
            let census = pipeline::analyze_dir(&eff.log_dir, &classifier)?;

            let mut stdout = std::io::stdout().lock();
            report::render(&mut stdout, &census.sessions, &census.aggregate, eff.limits)?;
            if !census.failures.is_empty() {
                tracing::warn!(count = census.failures.len(), "some session logs were only partially read");
            }

            let snap = snapshot::Snapshot::new(census.sessions, &census.aggregate);
            snapshot::write(&eff.output, &snap)?;
            tracing::info!(path = %eff.output.display(), "detailed analysis saved");
        }
        Commands::Show { snapshot: path, top_days, top_largest } => {
            let snap = snapshot::read(&path)?;
            let agg = aggregate::Aggregate::from_sessions(&snap.sessions);
            let cli_layer = SettingsLayer { top_days, top_largest, ..Default::default() };
            let eff = settings::resolve_effective_settings(&SettingsLayer::default(), &cli_layer);
            let mut stdout = std::io::stdout().lock();
            report::render(&mut stdout, &snap.sessions, &agg, eff.limits)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logs_of_faulty_run(directives: &str) -> String {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("bad.jsonl"),
            "{\"type\":\"user\",\"message\":{\"content\":\"hi\"}}\n{\"type\":\"user\",\"timestamp\":\"nope\"}\n",
        )
        .unwrap();

        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = fmt()
            .with_env_filter(log_filter(directives))
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();
        let classifier = Classifier::new(MatchMode::Substring).unwrap();
        let census = tracing::subscriber::with_default(subscriber, || pipeline::analyze_dir(dir.path(), &classifier)).unwrap();
        assert_eq!(census.failures.len(), 1);

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn file_faults_are_logged_at_the_default_level() {
        let out = logs_of_faulty_run("");
        assert!(out.contains("error processing session log"), "{out}");
        assert!(out.contains("bad.jsonl"), "{out}");
        assert!(out.contains("found session files"), "{out}");
        assert!(!out.contains("session analyzed"), "{out}");
    }

    #[test]
    fn explicit_directives_override_the_default() {
        let out = logs_of_faulty_run("error");
        assert!(!out.contains("error processing session log"), "{out}");
    }
}
