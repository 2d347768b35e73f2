//! Relationships waiting for an endpoint that has not been materialized yet.
//!
//! Every mutation is journaled so a failed node or a rolled-back fragment can
//! put the index back exactly as it was. The journal is cleared when the
//! surrounding data transaction commits.

use ahash::AHashMap;

use crate::{fragment::Relationship, identity::Key};

enum JournalEntry {
    Deferred(Key),
    Taken(Key, Vec<Relationship>),
}

/// Position in the undo journal returned by [`PendingRelationships::checkpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint(usize);

#[derive(Default)]
pub struct PendingRelationships {
    waiting: AHashMap<Key, Vec<Relationship>>,
    journal: Vec<JournalEntry>,
}

impl PendingRelationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `relationship` under the missing endpoint `key`.
    pub fn defer(&mut self, key: Key, relationship: Relationship) {
        self.waiting
            .entry(key.clone())
            .or_default()
            .push(relationship);
        self.journal.push(JournalEntry::Deferred(key));
    }

    /// Removes and returns everything waiting on `key`, in arrival order.
    pub fn take(&mut self, key: &Key) -> Vec<Relationship> {
        match self.waiting.remove(key) {
            Some(relationships) => {
                self.journal
                    .push(JournalEntry::Taken(key.clone(), relationships.clone()));
                relationships
            }
            None => Vec::new(),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Reverts every `defer` and `take` made since `checkpoint`.
    pub fn rollback_to(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::Deferred(key) => {
                    if let Some(list) = self.waiting.get_mut(&key) {
                        list.pop();
                        if list.is_empty() {
                            self.waiting.remove(&key);
                        }
                    }
                }
                JournalEntry::Taken(key, relationships) => {
                    self.waiting.insert(key, relationships);
                }
            }
        }
    }

    /// Makes every journaled change permanent.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    pub fn key_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.waiting.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.waiting.contains_key(key)
    }

    pub fn waiting_on(&self, key: &Key) -> &[Relationship] {
        self.waiting.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Unresolved keys sorted by their dotted form.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.waiting.keys().cloned().collect();
        keys.sort_by_cached_key(|key| key.to_string());
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &[Relationship])> {
        self.waiting
            .iter()
            .map(|(key, relationships)| (key, relationships.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knows(start: &str, end: &str) -> Relationship {
        Relationship::new(
            "KNOWS",
            Key::with_property("Person", "id", start),
            Key::with_property("Person", "id", end),
        )
    }

    #[test]
    fn defer_groups_by_key_in_arrival_order() {
        let mut pending = PendingRelationships::new();
        let key = Key::with_property("Person", "id", "A");
        pending.defer(key.clone(), knows("A", "B"));
        pending.defer(key.clone(), knows("A", "C"));

        assert_eq!(pending.key_count(), 1);
        let taken = pending.take(&key);
        assert_eq!(taken, vec![knows("A", "B"), knows("A", "C")]);
        assert!(pending.is_empty());
    }

    #[test]
    fn rollback_restores_taken_and_drops_deferred() {
        let mut pending = PendingRelationships::new();
        let a = Key::with_property("Person", "id", "A");
        let b = Key::with_property("Person", "id", "B");
        pending.defer(a.clone(), knows("A", "B"));
        pending.commit();

        let checkpoint = pending.checkpoint();
        assert_eq!(pending.take(&a).len(), 1);
        pending.defer(b.clone(), knows("A", "B"));
        assert!(pending.contains(&b));

        pending.rollback_to(checkpoint);
        assert_eq!(pending.waiting_on(&a), &[knows("A", "B")]);
        assert!(!pending.contains(&b));
        assert_eq!(pending.relationship_count(), 1);
    }

    #[test]
    fn commit_makes_changes_permanent() {
        let mut pending = PendingRelationships::new();
        let a = Key::with_property("Person", "id", "A");
        let checkpoint = pending.checkpoint();
        pending.defer(a.clone(), knows("A", "B"));
        pending.commit();
        pending.rollback_to(checkpoint);
        assert!(pending.contains(&a));
    }

    #[test]
    fn keys_are_sorted_for_reports() {
        let mut pending = PendingRelationships::new();
        pending.defer(Key::with_property("Person", "id", "Y"), knows("X", "Y"));
        pending.defer(Key::with_property("Person", "id", "X"), knows("X", "Y"));
        let keys: Vec<String> = pending.keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["Person.id.X", "Person.id.Y"]);
    }
}
