use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::Session;

pub struct LabelRule {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

pub const DEFAULT_TOPIC: &str = "general";

pub const TOPIC_RULES: &[LabelRule] = &[
    LabelRule { label: "setup", keywords: &["alias", "command", "setup", "install", "configure"] },
    LabelRule { label: "framework-development", keywords: &["orchestrator", "framework", "agent", "flow", "action"] },
    LabelRule { label: "feature-implementation", keywords: &["implement", "build", "create", "add feature"] },
    LabelRule { label: "debugging", keywords: &["fix", "bug", "error", "issue", "broken"] },
    LabelRule { label: "refactoring", keywords: &["refactor", "reorganize", "clean", "improve"] },
    LabelRule { label: "testing", keywords: &["test", "verify", "check"] },
    LabelRule { label: "design-system", keywords: &["design", "token", "color", "spacing", "css"] },
    LabelRule { label: "documentation", keywords: &["doc", "documentation", "readme", "learning"] },
    LabelRule { label: "analysis", keywords: &["analyze", "audit", "review", "examine"] },
    LabelRule { label: "planning", keywords: &["plan", "roadmap", "next", "what should"] },
];

pub const EMOTION_RULES: &[LabelRule] = &[
    LabelRule { label: "positive", keywords: &["amazing", "perfect", "excellent", "great", "beautiful"] },
    LabelRule { label: "challenging", keywords: &["frustrated", "stuck", "confused", "problem"] },
    LabelRule { label: "breakthrough", keywords: &["aha", "i see", "understand now", "got it"] },
];

/// How a keyword is looked for in the probe text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Plain substring containment.
    #[default]
    Substring,
    /// Keyword must start and end on word boundaries.
    Word,
}

enum Trigger {
    Substring(&'static str),
    Word(Regex),
}

impl Trigger {
    fn hits(&self, probe: &str) -> bool {
        match self {
            Trigger::Substring(kw) => probe.contains(kw),
            Trigger::Word(re) => re.is_match(probe),
        }
    }
}

struct CompiledRule {
    label: &'static str,
    triggers: Vec<Trigger>,
}

fn compile(rules: &[LabelRule], mode: MatchMode) -> Result<Vec<CompiledRule>, regex::Error> {
    rules
        .iter()
        .map(|rule| {
            let triggers = rule
                .keywords
                .iter()
                .map(|kw| match mode {
                    MatchMode::Substring => Ok(Trigger::Substring(*kw)),
                    MatchMode::Word => Regex::new(&format!(r"\b{}\b", regex::escape(kw))).map(Trigger::Word),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledRule { label: rule.label, triggers })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub topics: Vec<String>,
    pub emotions: Vec<String>,
}

pub struct Classifier {
    topics: Vec<CompiledRule>,
    emotions: Vec<CompiledRule>,
}

impl Classifier {
    pub fn new(mode: MatchMode) -> Result<Self, regex::Error> {
        Ok(Self { topics: compile(TOPIC_RULES, mode)?, emotions: compile(EMOTION_RULES, mode)? })
    }

    pub fn classify(&self, prefix: &[String]) -> Labels {
        let probe = probe_text(prefix);
        let mut topics = matching(&self.topics, &probe);
        if topics.is_empty() {
            topics.push(DEFAULT_TOPIC.to_string());
        }
        Labels { topics, emotions: matching(&self.emotions, &probe) }
    }

    /// Label a finished session from its cached leading user texts.
    pub fn apply(&self, session: &mut Session) {
        let labels = self.classify(&session.first_user_messages);
        session.categories = labels.topics;
        session.emotions = labels.emotions;
    }
}

pub fn probe_text(prefix: &[String]) -> String {
    prefix.join(" ").to_lowercase()
}

fn matching(rules: &[CompiledRule], probe: &str) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.triggers.iter().any(|t| t.hits(probe)))
        .map(|rule| rule.label.to_string())
        .collect()
}
