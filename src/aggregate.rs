use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::session::Session;

/// Occurrence counter that remembers first-seen order of its keys.
#[derive(Debug, Clone)]
pub struct FrequencyTable<K> {
    entries: Vec<(K, usize)>,
    index: HashMap<K, usize>,
}

impl<K> Default for FrequencyTable<K> {
    fn default() -> Self {
        Self { entries: Vec::new(), index: HashMap::new() }
    }
}

impl<K: Clone + Eq + Hash> FrequencyTable<K> {
    pub fn add(&mut self, key: K) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, 1));
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &K) -> usize {
        self.index.get(key).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// Descending by count; equal counts keep first-seen order.
    pub fn ranked(&self) -> Vec<(K, usize)> {
        let mut out = self.entries.clone();
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }

    pub fn to_string_map(&self) -> BTreeMap<String, usize>
    where
        K: ToString,
    {
        self.entries.iter().map(|(k, c)| (k.to_string(), *c)).collect()
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub earliest: DateTime<FixedOffset>,
    pub latest: DateTime<FixedOffset>,
}

impl DateRange {
    pub fn days(&self) -> i64 {
        (self.latest - self.earliest).num_days()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Totals {
    pub sessions: usize,
    pub size_bytes: u64,
    pub user_messages: usize,
    pub assistant_messages: usize,
}

impl Totals {
    pub fn messages(&self) -> usize {
        self.user_messages + self.assistant_messages
    }

    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    pub topics: FrequencyTable<String>,
    pub models: FrequencyTable<String>,
    pub daily_activity: FrequencyTable<NaiveDate>,
    pub totals: Totals,
    pub date_range: Option<DateRange>,
}

impl Aggregate {
    pub fn add(&mut self, session: &Session) {
        for topic in &session.categories {
            self.topics.add(topic.clone());
        }
        for model in &session.models_used {
            self.models.add(model.clone());
        }
        if let Some(first) = session.first_timestamp {
            self.daily_activity.add(first.date_naive());
        }

        self.totals.sessions += 1;
        self.totals.size_bytes += session.file_size;
        self.totals.user_messages += session.user_messages.len();
        self.totals.assistant_messages += session.assistant_messages.len();

        if let Some(first) = session.first_timestamp {
            let last = session.last_timestamp.unwrap_or(first);
            self.date_range = Some(match self.date_range {
                None => DateRange { earliest: first, latest: last },
                Some(r) => DateRange { earliest: r.earliest.min(first), latest: r.latest.max(last) },
            });
        }
    }

    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let mut agg = Self::default();
        for s in sessions {
            agg.add(s);
        }
        agg
    }
}
