use chrono::{DateTime, FixedOffset};
use std::io::{self, Write};

use crate::aggregate::{Aggregate, bytes_to_mb};
use crate::session::{Session, truncate_chars};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLimits {
    pub top_days: usize,
    pub top_largest: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self { top_days: 10, top_largest: 5 }
    }
}

const RULE_WIDTH: usize = 80;
const INVENTORY_WIDTH: usize = 140;
const INVENTORY_PREVIEW: usize = 80;
const MILESTONE_PREVIEW: usize = 100;

fn day(ts: Option<DateTime<FixedOffset>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "unknown".to_string())
}

fn preview(session: &Session, max: usize) -> Option<String> {
    session.first_preview().map(|p| truncate_chars(p, max).replace('\n', " "))
}

/// `1234567` -> `1,234,567`.
fn grouped(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Render the console report. `sessions` are listed in the order given.
pub fn render<W: Write>(out: &mut W, sessions: &[Session], agg: &Aggregate, limits: ReportLimits) -> io::Result<()> {
    let totals = &agg.totals;
    writeln!(out, "\n{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "CONVERSATION LOG ANALYSIS")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;

    writeln!(out, "\n## OVERVIEW")?;
    writeln!(out, "Total Sessions: {}", totals.sessions)?;
    writeln!(out, "Total Size: {:.1} MB", totals.size_mb())?;
    writeln!(out, "Total Messages: {}", grouped(totals.messages()))?;
    writeln!(out, "  - User Messages: {}", grouped(totals.user_messages))?;
    writeln!(out, "  - Assistant Messages: {}", grouped(totals.assistant_messages))?;

    if let Some(range) = agg.date_range {
        writeln!(out, "\nDate Range: {} to {}", day(Some(range.earliest)), day(Some(range.latest)))?;
        writeln!(out, "Duration: {} days", range.days())?;
    }

    writeln!(out, "\n## MODELS USED")?;
    for (model, count) in agg.models.ranked() {
        writeln!(out, "  {model}: {count} sessions")?;
    }

    writeln!(out, "\n## SESSION CATEGORIES")?;
    for (cat, count) in agg.topics.ranked() {
        writeln!(out, "  {cat}: {count} sessions")?;
    }

    writeln!(out, "\n## MOST ACTIVE DAYS (Top {})", limits.top_days)?;
    for (d, count) in agg.daily_activity.ranked().into_iter().take(limits.top_days) {
        writeln!(out, "  {d}: {count} sessions")?;
    }

    writeln!(out, "\n## SESSION INVENTORY (Chronological)")?;
    writeln!(out, "\n{:<4} {:<12} {:<8} {:<5} {:<30} First Message Preview", "#", "Date", "Size", "Msgs", "Category")?;
    writeln!(out, "{}", "-".repeat(INVENTORY_WIDTH))?;
    for (i, s) in sessions.iter().enumerate() {
        let size = format!("{:.0}KB", s.file_size as f64 / 1024.0);
        let cats = s.categories.iter().take(2).cloned().collect::<Vec<_>>().join(", ");
        let first = preview(s, INVENTORY_PREVIEW).unwrap_or_default();
        writeln!(
            out,
            "{:<4} {:<12} {:<8} {:<5} {:<30} {}",
            i + 1,
            day(s.first_timestamp),
            size,
            s.user_messages.len(),
            cats,
            first
        )?;
    }

    writeln!(out, "\n## POTENTIAL MILESTONES")?;
    writeln!(out, "\nLargest Sessions (Top {}):", limits.top_largest)?;
    let mut by_size: Vec<&Session> = sessions.iter().collect();
    by_size.sort_by(|a, b| b.file_size.cmp(&a.file_size));
    for s in by_size.into_iter().take(limits.top_largest) {
        let text = preview(s, MILESTONE_PREVIEW).unwrap_or_else(|| "N/A".to_string());
        writeln!(out, "  {} - {:.1}MB - {}", day(s.first_timestamp), bytes_to_mb(s.file_size), text)?;
    }

    writeln!(out, "\nEmotional Markers:")?;
    for s in sessions.iter().filter(|s| !s.emotions.is_empty()) {
        let text = preview(s, MILESTONE_PREVIEW).unwrap_or_else(|| "N/A".to_string());
        writeln!(out, "  {} [{}] - {}", day(s.first_timestamp), s.emotions.join(", "), text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, size: u64, first: &str, emotions: &[&str]) -> Session {
        let mut s = Session::new(format!("/logs/{id}.jsonl").into(), size);
        s.first_timestamp = Some(DateTime::parse_from_rfc3339("2024-02-03T04:05:06+00:00").unwrap());
        s.last_timestamp = s.first_timestamp;
        s.first_user_messages = vec![first.to_string()];
        s.categories = vec!["debugging".into(), "testing".into(), "analysis".into()];
        s.emotions = emotions.iter().map(|e| e.to_string()).collect();
        s
    }

    fn rendered(sessions: &[Session], limits: ReportLimits) -> String {
        let agg = Aggregate::from_sessions(sessions);
        let mut buf = Vec::new();
        render(&mut buf, sessions, &agg, limits).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn sections_appear_in_order() {
        let text = rendered(&[session("a", 2048, "hello\nworld", &[])], ReportLimits::default());
        let order = [
            "## OVERVIEW",
            "Date Range: 2024-02-03 to 2024-02-03",
            "## MODELS USED",
            "## SESSION CATEGORIES",
            "## MOST ACTIVE DAYS (Top 10)",
            "## SESSION INVENTORY",
            "Largest Sessions (Top 5):",
            "Emotional Markers:",
        ];
        let mut at = 0;
        for heading in order {
            let pos = text[at..].find(heading).unwrap_or_else(|| panic!("missing {heading}"));
            at += pos;
        }
        assert!(text.contains("debugging, testing"));
        assert!(!text.contains("debugging, testing, analysis"));
        assert!(text.contains("hello world"));
        assert!(text.contains("2KB"));
    }

    #[test]
    fn largest_and_emotion_listings() {
        let sessions = vec![
            session("small", 1024, "small one", &["positive"]),
            session("big", 3 * 1024 * 1024, "big one", &[]),
        ];
        let text = rendered(&sessions, ReportLimits { top_days: 10, top_largest: 1 });
        assert!(text.contains("2024-02-03 - 3.0MB - big one"));
        assert!(!text.contains("0.0MB - small one"));
        assert!(text.contains("2024-02-03 [positive] - small one"));
        assert!(!text.contains("[] - big one"));
    }

    #[test]
    fn message_totals_use_thousands_separators() {
        assert_eq!(grouped(0), "0");
        assert_eq!(grouped(999), "999");
        assert_eq!(grouped(1000), "1,000");
        assert_eq!(grouped(1234567), "1,234,567");

        let mut s = session("busy", 1024, "hi", &[]);
        s.assistant_messages = vec![
            crate::session::AssistantMessage { model: "m".into(), timestamp: None };
            1500
        ];
        let text = rendered(&[s], ReportLimits::default());
        assert!(text.contains("Total Messages: 1,500"));
        assert!(text.contains("  - Assistant Messages: 1,500"));
        assert!(text.contains("  - User Messages: 0"));
    }

    #[test]
    fn empty_session_renders_unknown_and_na() {
        let mut s = Session::new("/logs/empty.jsonl".into(), 0);
        s.categories = vec!["general".into()];
        let text = rendered(&[s], ReportLimits::default());
        assert!(text.contains("unknown - 0.0MB - N/A"));
        assert!(!text.contains("Date Range"));
    }
}
