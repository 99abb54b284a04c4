use std::collections::VecDeque;

use chrono::Utc;
use coderev_core::{InputDescriptor, ReviewRecord};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Session-lifetime list of completed reviews, most recent first.
///
/// Append-only: records are never edited, removed, or reordered.
///
/// # Examples
///
/// ```
/// use coderev_core::InputDescriptor;
/// use coderev_review::history::History;
///
/// let mut history = History::default();
/// let first = history.record("ok", InputDescriptor { file_count: 1, manual_chars: 0 }, "x");
/// let second = history.record("fine", InputDescriptor::default(), "y");
/// assert_eq!(history.latest().unwrap().id, second.id);
/// assert_eq!(history.select(first.id).unwrap().result, "ok");
/// ```
#[derive(Debug, Clone, Default)]
pub struct History {
    records: VecDeque<ReviewRecord>,
}

impl History {
    /// Store a completed review and return the new record.
    ///
    /// `descriptor` is copied, so later changes to the session's inputs never
    /// alter the stored summary.
    pub fn record(&mut self, result: &str, descriptor: InputDescriptor, unit: &str) -> ReviewRecord {
        let record = ReviewRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            summary: descriptor.summary(),
            result: result.to_string(),
            digest: unit_digest(unit),
        };
        self.records.push_front(record.clone());
        record
    }

    /// Look up a record by id.
    pub fn select(&self, id: Uuid) -> Option<&ReviewRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// The most recently completed review.
    pub fn latest(&self) -> Option<&ReviewRecord> {
        self.records.front()
    }

    /// Records from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &ReviewRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn unit_digest(unit: &str) -> String {
    format!("{:x}", Sha256::digest(unit.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> InputDescriptor {
        InputDescriptor {
            file_count: n,
            manual_chars: 0,
        }
    }

    #[test]
    fn newest_record_is_first() {
        let mut history = History::default();
        let a = history.record("a", files(1), "unit-a");
        let b = history.record("b", files(2), "unit-b");
        let c = history.record("c", files(3), "unit-c");

        let ids: Vec<Uuid> = history.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn summary_is_derived_from_descriptor() {
        let mut history = History::default();
        let record = history.record(
            "r",
            InputDescriptor {
                file_count: 0,
                manual_chars: 42,
            },
            "u",
        );
        assert_eq!(record.summary, "0 files, 42 manual chars");
    }

    #[test]
    fn select_does_not_reorder() {
        let mut history = History::default();
        let a = history.record("a", files(1), "x");
        let b = history.record("b", files(1), "y");

        assert_eq!(history.select(a.id).unwrap().result, "a");
        assert_eq!(history.latest().unwrap().id, b.id);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn select_unknown_id_is_none() {
        let history = History::default();
        assert!(history.is_empty());
        assert!(history.select(Uuid::new_v4()).is_none());
    }

    #[test]
    fn digest_is_sha256_of_unit() {
        let mut history = History::default();
        let record = history.record("r", files(0), "abc");
        assert_eq!(
            record.digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
