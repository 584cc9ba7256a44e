//! Identity mapping entries and the in-process mapping table
//!
//! A mapping entry ties `(entity_type, entity_row_id)` to a stable public
//! UUID. Two uniqueness rules hold at all times:
//!
//! - at most one entry per `(entity_type, entity_row_id)`
//! - `public_id` is unique across all entity types
//!
//! Entries are created once and deleted with their row; they are never
//! updated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One row of the mapping store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub public_id: Uuid,
    pub entity_type: String,
    pub entity_row_id: i64,
    pub created_at: DateTime<Utc>,
}

impl MappingEntry {
    /// New entry with a freshly generated v4 public id
    pub fn new(entity_type: impl Into<String>, entity_row_id: i64) -> Self {
        Self {
            public_id: Uuid::new_v4(),
            entity_type: entity_type.into(),
            entity_row_id,
            created_at: Utc::now(),
        }
    }
}

/// Result of inserting into a [`MappingTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Uuid),
    /// The row already had an entry; carries the existing public id
    AlreadyMapped(Uuid),
    /// Another row already owns this public id
    PublicIdTaken,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Mapping entries indexed both ways
#[derive(Debug, Default, Clone)]
pub struct MappingTable {
    by_public_id: HashMap<Uuid, MappingEntry>,
    by_row: HashMap<(String, i64), Uuid>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, tolerating duplicates: the first writer wins.
    pub fn insert(&mut self, entry: MappingEntry) -> InsertOutcome {
        let key = (entry.entity_type.clone(), entry.entity_row_id);
        if let Some(existing) = self.by_row.get(&key) {
            return InsertOutcome::AlreadyMapped(*existing);
        }
        if self.by_public_id.contains_key(&entry.public_id) {
            return InsertOutcome::PublicIdTaken;
        }
        let public_id = entry.public_id;
        self.by_row.insert(key, public_id);
        self.by_public_id.insert(public_id, entry);
        InsertOutcome::Inserted(public_id)
    }

    /// Entry for a row, creating one when missing
    pub fn get_or_insert(&mut self, entity_type: &str, entity_row_id: i64) -> MappingEntry {
        loop {
            match self.insert(MappingEntry::new(entity_type, entity_row_id)) {
                InsertOutcome::Inserted(id) | InsertOutcome::AlreadyMapped(id) => {
                    if let Some(entry) = self.by_public_id.get(&id) {
                        return entry.clone();
                    }
                }
                // v4 collision, draw again
                InsertOutcome::PublicIdTaken => continue,
            }
        }
    }

    pub fn get_by_public_id(&self, public_id: &Uuid) -> Option<&MappingEntry> {
        self.by_public_id.get(public_id)
    }

    pub fn get_for_row(&self, entity_type: &str, entity_row_id: i64) -> Option<&MappingEntry> {
        self.by_row
            .get(&(entity_type.to_string(), entity_row_id))
            .and_then(|id| self.by_public_id.get(id))
    }

    /// Remove the entry owned by a row, returning it
    pub fn remove_for_row(&mut self, entity_type: &str, entity_row_id: i64) -> Option<MappingEntry> {
        let public_id = self
            .by_row
            .remove(&(entity_type.to_string(), entity_row_id))?;
        self.by_public_id.remove(&public_id)
    }

    /// The subset of `row_ids` that already have an entry
    pub fn mapped_row_ids(&self, entity_type: &str, row_ids: &[i64]) -> HashSet<i64> {
        self.public_ids_for(entity_type, row_ids)
            .into_keys()
            .collect()
    }

    /// Public ids of the given rows, for those that have one
    pub fn public_ids_for(&self, entity_type: &str, row_ids: &[i64]) -> HashMap<i64, Uuid> {
        row_ids
            .iter()
            .filter_map(|pk| {
                self.by_row
                    .get(&(entity_type.to_string(), *pk))
                    .map(|id| (*pk, *id))
            })
            .collect()
    }

    pub fn count_for(&self, entity_type: &str) -> usize {
        self.by_row
            .keys()
            .filter(|(et, _)| et == entity_type)
            .count()
    }

    pub fn len(&self) -> usize {
        self.by_public_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_public_id.is_empty()
    }
}
