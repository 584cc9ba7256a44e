//! In-memory datastore for testing and development
//!
//! Rows and mapping entries live behind a single lock, so a row write and
//! the mapping hook it triggers form one unit of work: either both happen
//! or neither does, and no reader ever observes one without the other.

use crate::core::entity::{AnnotatedRow, Row};
use crate::core::error::{IdError, ResolutionError};
use crate::core::mapping::{InsertOutcome, MappingEntry, MappingTable};
use crate::core::model::ModelRegistry;
use crate::core::query::{Annotation, RowQuery, SortDirection, SortField};
use crate::core::store::{PublicIdStore, RowStore, RowWriter};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, BTreeMap<i64, Row>>,
    sequences: HashMap<String, i64>,
    mappings: MappingTable,
}

impl State {
    /// Post-insert hook: give a freshly inserted row its mapping entry
    fn after_insert(&mut self, registry: &ModelRegistry, row: &Row) {
        let tracked = registry
            .get(&row.entity_type)
            .is_some_and(|model| model.tracks_public_ids());
        if tracked {
            let entry = self.mappings.get_or_insert(&row.entity_type, row.pk);
            tracing::debug!(
                entity_type = %row.entity_type,
                pk = row.pk,
                public_id = %entry.public_id,
                "mapping entry created"
            );
        }
    }

    /// Post-delete hook: drop exactly the entry the row owned
    fn after_delete(&mut self, entity_type: &str, pk: i64) {
        if let Some(entry) = self.mappings.remove_for_row(entity_type, pk) {
            tracing::debug!(
                entity_type,
                pk,
                public_id = %entry.public_id,
                "mapping entry deleted"
            );
        }
    }

    fn select(&self, query: &RowQuery) -> Vec<AnnotatedRow> {
        let Some(table) = self.tables.get(&query.entity_type) else {
            return Vec::new();
        };

        let rows: Vec<&Row> = match &query.pks {
            Some(pks) => {
                let wanted: HashSet<i64> = pks.iter().copied().collect();
                table
                    .values()
                    .filter(|row| wanted.contains(&row.pk))
                    .collect()
            }
            None => table.values().collect(),
        };

        let public_ids = if query.is_annotated(Annotation::PublicId) {
            let pks: Vec<i64> = rows.iter().map(|row| row.pk).collect();
            Some(self.mappings.public_ids_for(&query.entity_type, &pks))
        } else {
            None
        };

        let mut selected: Vec<AnnotatedRow> = rows
            .into_iter()
            .map(|row| AnnotatedRow {
                public_id: public_ids
                    .as_ref()
                    .and_then(|ids| ids.get(&row.pk).copied()),
                row: row.clone(),
            })
            .filter(|annotated| {
                query
                    .public_id
                    .is_none_or(|wanted| annotated.public_id == Some(wanted))
            })
            .collect();

        if let Some((field, direction)) = query.order {
            match field {
                SortField::Pk => selected.sort_by_key(|r| r.row.pk),
                // rows without an entry sort last, like NULLs in ascending SQL order
                SortField::PublicId => {
                    selected.sort_by_key(|r| (r.public_id.is_none(), r.public_id))
                }
            }
            if direction == SortDirection::Desc {
                selected.reverse();
            }
        }

        selected
    }
}

/// In-memory implementation of every store trait
#[derive(Clone)]
pub struct InMemoryDatabase {
    registry: Arc<ModelRegistry>,
    state: Arc<RwLock<State>>,
}

impl InMemoryDatabase {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Bulk-load rows without firing lifecycle hooks.
    ///
    /// Stands in for data written before the mapping hooks existed, which is
    /// what the backfill utility is for.
    pub fn load_rows<I>(&self, entity_type: &str, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = (i64, serde_json::Value)>,
    {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let table = state.tables.entry(entity_type.to_string()).or_default();
        let mut loaded = 0;
        for (pk, data) in rows {
            table.insert(pk, Row::new(entity_type, pk, data));
            loaded += 1;
        }
        let last = table.keys().next_back().copied().unwrap_or(0);
        let sequence = state.sequences.entry(entity_type.to_string()).or_insert(0);
        *sequence = (*sequence).max(last);

        Ok(loaded)
    }

    fn ensure_registered(&self, entity_type: &str) -> Result<()> {
        if self.registry.get(entity_type).is_none() {
            return Err(IdError::from(ResolutionError::UnknownType {
                name: entity_type.to_string(),
            })
            .into());
        }
        Ok(())
    }

    fn insert_row(&self, entity_type: &str, pk: Option<i64>, data: serde_json::Value) -> Result<Row> {
        self.ensure_registered(entity_type)?;
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let last = state
            .tables
            .get(entity_type)
            .and_then(|t| t.keys().next_back().copied())
            .unwrap_or(0);
        let sequence = state.sequences.get(entity_type).copied().unwrap_or(0);

        let pk = match pk {
            Some(pk) => {
                let taken = state
                    .tables
                    .get(entity_type)
                    .is_some_and(|t| t.contains_key(&pk));
                if taken {
                    return Err(anyhow!("{} with pk {} already exists", entity_type, pk));
                }
                pk
            }
            None => {
                let next = sequence.max(last) + 1;
                state.sequences.insert(entity_type.to_string(), next);
                next
            }
        };

        let row = Row::new(entity_type, pk, data);
        state
            .tables
            .entry(entity_type.to_string())
            .or_default()
            .insert(pk, row.clone());
        state.after_insert(&self.registry, &row);

        Ok(row)
    }
}

#[async_trait]
impl RowStore for InMemoryDatabase {
    async fn get(&self, entity_type: &str, pk: i64) -> Result<Option<Row>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(state
            .tables
            .get(entity_type)
            .and_then(|table| table.get(&pk))
            .cloned())
    }

    async fn list_pks(
        &self,
        entity_type: &str,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<i64>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let Some(table) = state.tables.get(entity_type) else {
            return Ok(Vec::new());
        };
        let pks = match after {
            Some(after) => table
                .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
                .map(|(pk, _)| *pk)
                .take(limit)
                .collect(),
            None => table.keys().copied().take(limit).collect(),
        };
        Ok(pks)
    }

    async fn existing_pks(&self, entity_type: &str, pks: &[i64]) -> Result<HashSet<i64>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let Some(table) = state.tables.get(entity_type) else {
            return Ok(HashSet::new());
        };
        Ok(pks
            .iter()
            .copied()
            .filter(|pk| table.contains_key(pk))
            .collect())
    }

    async fn fetch(&self, query: &RowQuery) -> Result<Vec<AnnotatedRow>> {
        query.validate()?;
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let selected = state.select(query).into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => selected.take(limit).collect(),
            None => selected.collect(),
        })
    }

    async fn count(&self, query: &RowQuery) -> Result<usize> {
        query.validate()?;
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(state.select(query).len())
    }
}

#[async_trait]
impl RowWriter for InMemoryDatabase {
    async fn create(&self, entity_type: &str, data: serde_json::Value) -> Result<Row> {
        self.insert_row(entity_type, None, data)
    }

    async fn create_with_pk(
        &self,
        entity_type: &str,
        pk: i64,
        data: serde_json::Value,
    ) -> Result<Row> {
        self.insert_row(entity_type, Some(pk), data)
    }

    async fn delete(&self, entity_type: &str, pk: i64) -> Result<bool> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let removed = state
            .tables
            .get_mut(entity_type)
            .and_then(|table| table.remove(&pk))
            .is_some();
        if removed {
            state.after_delete(entity_type, pk);
        }
        Ok(removed)
    }
}

#[async_trait]
impl PublicIdStore for InMemoryDatabase {
    async fn get_by_public_id(&self, public_id: &Uuid) -> Result<Option<MappingEntry>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(state.mappings.get_by_public_id(public_id).cloned())
    }

    async fn get_for_row(&self, entity_type: &str, pk: i64) -> Result<Option<MappingEntry>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(state.mappings.get_for_row(entity_type, pk).cloned())
    }

    async fn get_or_create(&self, entity_type: &str, pk: i64) -> Result<MappingEntry> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(state.mappings.get_or_insert(entity_type, pk))
    }

    async fn bulk_insert(&self, entries: Vec<MappingEntry>) -> Result<usize> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let mut inserted = 0;
        for entry in entries {
            let (entity_type, pk) = (entry.entity_type.clone(), entry.entity_row_id);
            match state.mappings.insert(entry) {
                InsertOutcome::Inserted(_) => inserted += 1,
                InsertOutcome::AlreadyMapped(existing) => {
                    tracing::debug!(%entity_type, pk, %existing, "mapping entry already present, skipped");
                }
                InsertOutcome::PublicIdTaken => {
                    tracing::warn!(%entity_type, pk, "public id collision, skipped");
                }
            }
        }
        Ok(inserted)
    }

    async fn mapped_row_ids(&self, entity_type: &str, pks: &[i64]) -> Result<HashSet<i64>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(state.mappings.mapped_row_ids(entity_type, pks))
    }

    async fn delete_for_row(&self, entity_type: &str, pk: i64) -> Result<usize> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(usize::from(
            state.mappings.remove_for_row(entity_type, pk).is_some(),
        ))
    }

    async fn count(&self, entity_type: Option<&str>) -> Result<usize> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(match entity_type {
            Some(entity_type) => state.mappings.count_for(entity_type),
            None => state.mappings.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ModelDescriptor, PkKind};
    use serde_json::json;

    fn database() -> InMemoryDatabase {
        let registry = ModelRegistry::new()
            .with(ModelDescriptor::new("catalog", "widget").with_public_id())
            .unwrap()
            .with(ModelDescriptor::new("catalog", "gadget").with_pk_kind(PkKind::Explicit))
            .unwrap()
            .with(ModelDescriptor::new("legacy", "thing"))
            .unwrap();
        InMemoryDatabase::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_pks() {
        let db = database();
        let a = db.create("catalog.widget", json!({"n": 1})).await.unwrap();
        let b = db.create("catalog.widget", json!({"n": 2})).await.unwrap();
        assert_eq!(a.pk, 1);
        assert_eq!(b.pk, 2);
    }

    #[tokio::test]
    async fn test_create_fires_mapping_hook_for_tracked_models_only() {
        let db = database();
        let widget = db.create("catalog.widget", json!({})).await.unwrap();
        let thing = db.create("legacy.thing", json!({})).await.unwrap();

        assert!(db.get_for_row("catalog.widget", widget.pk).await.unwrap().is_some());
        assert!(db.get_for_row("legacy.thing", thing.pk).await.unwrap().is_none());
        assert_eq!(PublicIdStore::count(&db, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_its_entry() {
        let db = database();
        let first = db.create("catalog.widget", json!({})).await.unwrap();
        let second = db.create("catalog.widget", json!({})).await.unwrap();
        let kept = db.get_for_row("catalog.widget", second.pk).await.unwrap().unwrap();

        assert!(db.delete("catalog.widget", first.pk).await.unwrap());
        assert!(db.get_for_row("catalog.widget", first.pk).await.unwrap().is_none());
        assert_eq!(
            db.get_for_row("catalog.widget", second.pk).await.unwrap(),
            Some(kept)
        );
        assert_eq!(PublicIdStore::count(&db, None).await.unwrap(), 1);
        assert!(!db.delete("catalog.widget", first.pk).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_unknown_type_is_typed_error() {
        let db = database();
        let err: IdError = db.create("nope.nope", json!({})).await.unwrap_err().into();
        assert!(matches!(
            err,
            IdError::Resolution(ResolutionError::UnknownType { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_with_pk_rejects_duplicates() {
        let db = database();
        db.create_with_pk("catalog.gadget", 7, json!({})).await.unwrap();
        assert!(db.create_with_pk("catalog.gadget", 7, json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_load_rows_skips_hooks_and_moves_sequence() {
        let db = database();
        let loaded = db
            .load_rows("catalog.widget", (1..=5).map(|pk| (pk, json!({}))))
            .unwrap();
        assert_eq!(loaded, 5);
        assert_eq!(PublicIdStore::count(&db, None).await.unwrap(), 0);

        let next = db.create("catalog.widget", json!({})).await.unwrap();
        assert_eq!(next.pk, 6);
    }

    #[tokio::test]
    async fn test_list_pks_pages_in_order() {
        let db = database();
        db.load_rows("catalog.widget", [(5, json!({})), (1, json!({})), (3, json!({}))])
            .unwrap();

        assert_eq!(db.list_pks("catalog.widget", None, 2).await.unwrap(), vec![1, 3]);
        assert_eq!(db.list_pks("catalog.widget", Some(3), 2).await.unwrap(), vec![5]);
        assert!(db.list_pks("catalog.widget", Some(5), 2).await.unwrap().is_empty());
        assert!(db.list_pks("catalog.missing", None, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_insert_skips_conflicts() {
        let db = database();
        let existing = db.get_or_create("catalog.widget", 1).await.unwrap();

        let inserted = db
            .bulk_insert(vec![
                MappingEntry::new("catalog.widget", 1),
                MappingEntry::new("catalog.widget", 2),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(
            db.get_for_row("catalog.widget", 1).await.unwrap().unwrap().public_id,
            existing.public_id
        );
    }

    #[tokio::test]
    async fn test_fetch_annotated_filter_and_sort() {
        let db = database();
        for _ in 0..3 {
            db.create("catalog.widget", json!({})).await.unwrap();
        }
        let target = db.get_for_row("catalog.widget", 2).await.unwrap().unwrap();

        let plain = db.fetch(&RowQuery::all("catalog.widget")).await.unwrap();
        assert!(plain.iter().all(|r| r.public_id.is_none()));

        let annotated = RowQuery::all("catalog.widget").annotate(Annotation::PublicId);
        let rows = db.fetch(&annotated).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.public_id.is_some()));

        let filtered = db
            .fetch(&annotated.clone().filter_public_id(target.public_id))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].row.pk, 2);

        let sorted = db
            .fetch(&annotated.order_by(SortField::PublicId, SortDirection::Asc))
            .await
            .unwrap();
        let ids: Vec<Uuid> = sorted.iter().filter_map(|r| r.public_id).collect();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_fetch_pagination_and_count() {
        let db = database();
        db.load_rows("legacy.thing", (1..=10).map(|pk| (pk, json!({}))))
            .unwrap();
        let query = RowQuery::all("legacy.thing")
            .order_by(SortField::Pk, SortDirection::Desc)
            .offset(2)
            .limit(3);
        let rows = db.fetch(&query).await.unwrap();
        let pks: Vec<i64> = rows.iter().map(|r| r.row.pk).collect();
        assert_eq!(pks, vec![8, 7, 6]);
        assert_eq!(RowStore::count(&db, &query).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_fetch_rejects_unannotated_public_id_filter() {
        let db = database();
        let query = RowQuery::all("catalog.widget").filter_public_id(Uuid::new_v4());
        assert!(db.fetch(&query).await.is_err());
    }
}
