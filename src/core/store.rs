//! Store traits for rows and identity mappings
//!
//! The resolvers are agnostic to the storage mechanism. A backend provides
//! read access to rows ([`RowStore`]), the mapping side-table
//! ([`PublicIdStore`]) and, when it owns writes, row lifecycle
//! ([`RowWriter`]).

use crate::core::entity::{AnnotatedRow, Row};
use crate::core::mapping::MappingEntry;
use crate::core::query::RowQuery;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

/// Read access to model rows
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Get a row by primary key
    async fn get(&self, entity_type: &str, pk: i64) -> Result<Option<Row>>;

    /// Primary keys in ascending order, strictly greater than `after`
    async fn list_pks(&self, entity_type: &str, after: Option<i64>, limit: usize)
    -> Result<Vec<i64>>;

    /// The subset of `pks` whose rows still exist
    async fn existing_pks(&self, entity_type: &str, pks: &[i64]) -> Result<HashSet<i64>>;

    /// Run a query, evaluating its annotations in bulk
    async fn fetch(&self, query: &RowQuery) -> Result<Vec<AnnotatedRow>>;

    /// Number of rows matching the query's filters (offset and limit ignored)
    async fn count(&self, query: &RowQuery) -> Result<usize>;
}

/// Row lifecycle for backends that own writes.
///
/// Implementations keep the mapping store in sync: creating a row of a
/// model that tracks public ids creates its mapping entry, deleting the row
/// deletes exactly that entry, both within the same unit of work.
#[async_trait]
pub trait RowWriter: Send + Sync {
    /// Insert a row, assigning the next auto-increment primary key
    async fn create(&self, entity_type: &str, data: serde_json::Value) -> Result<Row>;

    /// Insert a row under an application-supplied primary key
    async fn create_with_pk(&self, entity_type: &str, pk: i64, data: serde_json::Value)
    -> Result<Row>;

    /// Delete a row. Returns whether it existed.
    async fn delete(&self, entity_type: &str, pk: i64) -> Result<bool>;
}

/// The identity mapping side-table
#[async_trait]
pub trait PublicIdStore: Send + Sync {
    async fn get_by_public_id(&self, public_id: &Uuid) -> Result<Option<MappingEntry>>;

    async fn get_for_row(&self, entity_type: &str, pk: i64) -> Result<Option<MappingEntry>>;

    /// Entry for a row, creating it when missing.
    ///
    /// Concurrent callers race on the uniqueness constraint; the first
    /// writer wins and everyone gets its entry back.
    async fn get_or_create(&self, entity_type: &str, pk: i64) -> Result<MappingEntry>;

    /// Insert entries in one atomic unit of work, skipping those that
    /// conflict with existing entries. Returns how many were inserted.
    async fn bulk_insert(&self, entries: Vec<MappingEntry>) -> Result<usize>;

    /// The subset of `pks` that already have an entry
    async fn mapped_row_ids(&self, entity_type: &str, pks: &[i64]) -> Result<HashSet<i64>>;

    /// Delete the entry owned by a row. Returns how many were deleted.
    async fn delete_for_row(&self, entity_type: &str, pk: i64) -> Result<usize>;

    /// Number of entries, optionally for one entity type
    async fn count(&self, entity_type: Option<&str>) -> Result<usize>;
}

/// A backend providing everything: rows, writes and mappings
pub trait Datastore: RowStore + RowWriter + PublicIdStore {}

impl<T: RowStore + RowWriter + PublicIdStore> Datastore for T {}
