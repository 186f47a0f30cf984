// Presentation model for the results list

use chrono::{DateTime, Local};
use std::collections::HashMap;
use uuid::Uuid;

use super::markdown::{self, DisplayTree};
use crate::models::QueryRecord;
use crate::time_format::time_format_ago_at;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryHeader {
    /// Newest answer: share affordance, no timestamp.
    Current { share: bool },
    Historical { label: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub question: Option<String>,
    pub header: EntryHeader,
}

pub fn history_entries(records: &[QueryRecord], now: DateTime<Local>) -> Vec<HistoryEntry> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let header = if index == 0 {
                EntryHeader::Current { share: true }
            } else {
                EntryHeader::Historical {
                    label: format!(
                        "Historical result {}",
                        time_format_ago_at(Some(record.date), now)
                    ),
                }
            };
            HistoryEntry {
                id: record.id,
                question: record.question.clone(),
                header,
            }
        })
        .collect()
}

/// Rendered answers keyed by record id. Records never change, so entries
/// only go away when their record leaves the list.
#[derive(Debug, Default)]
pub struct MarkdownCache {
    revision: Option<u64>,
    trees: HashMap<Uuid, DisplayTree>,
}

impl MarkdownCache {
    /// Drop trees for records that are no longer listed.
    pub fn sync(&mut self, revision: u64, records: &[QueryRecord]) {
        if self.revision == Some(revision) {
            return;
        }
        self.trees
            .retain(|id, _| records.iter().any(|record| record.id == *id));
        self.revision = Some(revision);
    }

    pub fn tree(&mut self, record: &QueryRecord) -> &DisplayTree {
        self.trees
            .entry(record.id)
            .or_insert_with(|| markdown::render(&record.value))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.trees.len()
    }
}
