//! Cycle history
//!
//! - [`ParserHistory`]: two-slot (`current`, `previous`) ring per parser kind,
//!   owned by the collector so parsers never hold each other
//! - [`ChangeLog`]: bounded rolling window of changed records

use crate::diff::{ChangedRecord, VfId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Current and previous instance of one parser kind
#[derive(Debug, Clone)]
pub struct ParserHistory<T> {
    current: Option<T>,
    previous: Option<T>,
}

impl<T> Default for ParserHistory<T> {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
        }
    }
}

impl<T> ParserHistory<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the newest instance; the old current becomes previous and the
    /// old previous is dropped.
    pub fn push(&mut self, next: T) {
        self.previous = self.current.replace(next);
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.previous = None;
    }
}

/// One logged change
#[derive(Debug, Clone, Serialize)]
pub struct ChangeLogEntry {
    pub logged_at: DateTime<Utc>,
    pub source: &'static str,
    pub vf_id: Option<VfId>,
    pub unit: Option<String>,
    pub changes: ChangedRecord,
}

/// Rolling window of changed entries, oldest evicted first
#[derive(Debug, Clone)]
pub struct ChangeLog {
    entries: VecDeque<ChangeLogEntry>,
    max_entries: usize,
}

impl ChangeLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.min(1024)),
            max_entries,
        }
    }

    pub fn push(&mut self, entry: ChangeLogEntry) {
        if self.max_entries == 0 {
            return;
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ChangeLogEntry> {
        self.entries.iter()
    }

    /// Entries logged by one source
    pub fn entries_from(&self, source: &str) -> Vec<&ChangeLogEntry> {
        self.entries.iter().filter(|e| e.source == source).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
