//! Backfill of the mapping store for rows that predate public ids
//!
//! The job pages through primary keys in ascending order. For each batch it
//! determines the missing entries fresh from the stores, re-checks that the
//! rows still exist and bulk-inserts the survivors in one unit of work.
//! Conflicts with entries created concurrently are skipped. A failing batch
//! is logged and recorded in the report; the remaining batches still run,
//! and a second run only picks up what the first one missed.
//!
//! ```rust,ignore
//! let backfiller = Backfiller::from_store(registry, store).dry_run(false);
//! let reports = backfiller.backfill_all_models(1000, Some("catalog")).await?;
//! println!("created {}", BackfillReport::total_created(&reports));
//! ```

use crate::core::error::{BackfillError, ConfigError, IdError, IdResult, ResolutionError};
use crate::core::mapping::MappingEntry;
use crate::core::model::{ModelDescriptor, ModelRegistry};
use crate::core::store::{PublicIdStore, RowStore};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of backfilling one model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Entity type of the model
    pub model: String,
    pub batches: usize,
    /// Primary keys visited
    pub scanned: usize,
    /// Entries inserted, or that would be inserted in dry-run mode
    pub created: usize,
    pub already_mapped: usize,
    /// Rows deleted between the scan and the insert
    pub vanished: usize,
    pub failures: Vec<BackfillError>,
    pub dry_run: bool,
}

impl BackfillReport {
    fn new(model: &str, dry_run: bool) -> Self {
        Self {
            model: model.to_string(),
            dry_run,
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total_created(reports: &[BackfillReport]) -> usize {
        reports.iter().map(|r| r.created).sum()
    }
}

#[derive(Debug, Default)]
struct BatchOutcome {
    already_mapped: usize,
    vanished: usize,
    created: usize,
}

/// Backfill job over a row store and a mapping store
#[derive(Clone)]
pub struct Backfiller {
    registry: Arc<ModelRegistry>,
    rows: Arc<dyn RowStore>,
    mappings: Arc<dyn PublicIdStore>,
    dry_run: bool,
}

impl Backfiller {
    pub fn new(
        registry: Arc<ModelRegistry>,
        rows: Arc<dyn RowStore>,
        mappings: Arc<dyn PublicIdStore>,
    ) -> Self {
        Self {
            registry,
            rows,
            mappings,
            dry_run: false,
        }
    }

    pub fn from_store<S>(registry: Arc<ModelRegistry>, store: Arc<S>) -> Self
    where
        S: RowStore + PublicIdStore + 'static,
    {
        let rows: Arc<dyn RowStore> = store.clone();
        let mappings: Arc<dyn PublicIdStore> = store;
        Self::new(registry, rows, mappings)
    }

    /// Compute and log counts without writing
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Backfill one model. `report.created` is the number of new entries.
    pub async fn backfill_model(
        &self,
        model: &ModelDescriptor,
        batch_size: usize,
    ) -> IdResult<BackfillReport> {
        check_batch_size(batch_size)?;
        if !model.tracks_public_ids() {
            return Err(BackfillError::NotEligible {
                model: model.entity_type().to_string(),
            }
            .into());
        }

        let entity_type = model.entity_type();
        let mut report = BackfillReport::new(entity_type, self.dry_run);
        let mut cursor = None;

        tracing::info!(model = entity_type, batch_size, dry_run = self.dry_run, "backfill started");

        loop {
            let pks = self.rows.list_pks(entity_type, cursor, batch_size).await?;
            let (Some(&first_pk), Some(&last_pk)) = (pks.first(), pks.last()) else {
                break;
            };
            cursor = Some(last_pk);
            report.batches += 1;
            report.scanned += pks.len();

            match self.backfill_batch(entity_type, &pks).await {
                Ok(outcome) => {
                    tracing::debug!(
                        model = entity_type,
                        first_pk,
                        last_pk,
                        created = outcome.created,
                        already_mapped = outcome.already_mapped,
                        vanished = outcome.vanished,
                        "batch done"
                    );
                    report.already_mapped += outcome.already_mapped;
                    report.vanished += outcome.vanished;
                    report.created += outcome.created;
                }
                Err(err) => {
                    tracing::error!(
                        model = entity_type,
                        first_pk,
                        last_pk,
                        rows = ?pks,
                        error = %format!("{:#}", err),
                        "backfill batch failed, continuing"
                    );
                    report.failures.push(BackfillError::PartialBatchFailure {
                        model: entity_type.to_string(),
                        first_pk,
                        last_pk,
                        row_ids: pks.clone(),
                        message: format!("{:#}", err),
                    });
                }
            }

            if pks.len() < batch_size {
                break;
            }
        }

        tracing::info!(
            model = entity_type,
            batches = report.batches,
            created = report.created,
            already_mapped = report.already_mapped,
            vanished = report.vanished,
            failed_batches = report.failures.len(),
            dry_run = self.dry_run,
            "backfill finished"
        );
        Ok(report)
    }

    /// Backfill every registered model that tracks public ids, optionally
    /// only those of one app
    pub async fn backfill_all_models(
        &self,
        batch_size: usize,
        app_filter: Option<&str>,
    ) -> IdResult<Vec<BackfillReport>> {
        check_batch_size(batch_size)?;
        let mut reports = Vec::new();
        for model in self.registry.iter() {
            if app_filter.is_some_and(|app| app != model.app_label()) {
                continue;
            }
            if !model.tracks_public_ids() {
                tracing::debug!(model = model.entity_type(), "skipping, no public ids");
                continue;
            }
            reports.push(self.backfill_model(model, batch_size).await?);
        }
        Ok(reports)
    }

    /// Create the entry for one row. Returns whether an entry was (or, in
    /// dry-run mode, would be) created; `false` when the row is missing or
    /// already mapped.
    pub async fn backfill_single_instance(
        &self,
        app_label: &str,
        model_name: &str,
        pk: i64,
    ) -> IdResult<bool> {
        let model = self
            .registry
            .by_app_model(app_label, model_name)
            .ok_or_else(|| {
                IdError::from(ResolutionError::UnknownType {
                    name: format!("{}.{}", app_label, model_name),
                })
            })?;
        if !model.tracks_public_ids() {
            return Err(BackfillError::NotEligible {
                model: model.entity_type().to_string(),
            }
            .into());
        }
        let entity_type = model.entity_type();

        if self.rows.get(entity_type, pk).await?.is_none() {
            tracing::debug!(model = entity_type, pk, "row does not exist");
            return Ok(false);
        }
        if self.mappings.get_for_row(entity_type, pk).await?.is_some() {
            return Ok(false);
        }
        if self.dry_run {
            return Ok(true);
        }
        let inserted = self
            .mappings
            .bulk_insert(vec![MappingEntry::new(entity_type, pk)])
            .await?;
        Ok(inserted == 1)
    }

    async fn backfill_batch(&self, entity_type: &str, pks: &[i64]) -> anyhow::Result<BatchOutcome> {
        let mapped = self.mappings.mapped_row_ids(entity_type, pks).await?;
        let missing: Vec<i64> = pks.iter().copied().filter(|pk| !mapped.contains(pk)).collect();
        let mut outcome = BatchOutcome {
            already_mapped: mapped.len(),
            ..Default::default()
        };
        if missing.is_empty() {
            return Ok(outcome);
        }

        let existing = self.rows.existing_pks(entity_type, &missing).await?;
        let survivors: Vec<i64> = missing.iter().copied().filter(|pk| existing.contains(pk)).collect();
        outcome.vanished = missing.len() - survivors.len();

        if self.dry_run {
            outcome.created = survivors.len();
            return Ok(outcome);
        }

        let entries: Vec<MappingEntry> = survivors
            .iter()
            .map(|&pk| MappingEntry::new(entity_type, pk))
            .collect();
        let inserted = self.mappings.bulk_insert(entries).await?;
        if inserted < survivors.len() {
            tracing::warn!(
                model = entity_type,
                skipped = survivors.len() - inserted,
                "entries created concurrently, skipped"
            );
        }
        outcome.created = inserted;
        Ok(outcome)
    }
}

fn check_batch_size(batch_size: usize) -> IdResult<()> {
    if batch_size == 0 {
        return Err(ConfigError::InvalidValue {
            field: "batch_size".to_string(),
            value: "0".to_string(),
            message: "batch size must be positive".to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{AnnotatedRow, Row};
    use crate::core::query::RowQuery;
    use crate::storage::InMemoryDatabase;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn registry() -> Arc<ModelRegistry> {
        Arc::new(
            ModelRegistry::new()
                .with(ModelDescriptor::new("catalog", "widget").with_public_id())
                .unwrap()
                .with(ModelDescriptor::new("catalog", "gadget").with_pk_scheme())
                .unwrap()
                .with(ModelDescriptor::new("billing", "invoice").with_public_id())
                .unwrap(),
        )
    }

    fn seeded(rows: i64) -> Arc<InMemoryDatabase> {
        let db = Arc::new(InMemoryDatabase::new(registry()));
        db.load_rows("catalog.widget", (1..=rows).map(|pk| (pk, json!({}))))
            .unwrap();
        db
    }

    /// Mapping store whose n-th bulk insert fails
    struct FlakyMappings {
        inner: Arc<InMemoryDatabase>,
        calls: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl PublicIdStore for FlakyMappings {
        async fn get_by_public_id(&self, public_id: &Uuid) -> Result<Option<MappingEntry>> {
            self.inner.get_by_public_id(public_id).await
        }
        async fn get_for_row(&self, entity_type: &str, pk: i64) -> Result<Option<MappingEntry>> {
            self.inner.get_for_row(entity_type, pk).await
        }
        async fn get_or_create(&self, entity_type: &str, pk: i64) -> Result<MappingEntry> {
            self.inner.get_or_create(entity_type, pk).await
        }
        async fn bulk_insert(&self, entries: Vec<MappingEntry>) -> Result<usize> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
                bail!("connection reset");
            }
            self.inner.bulk_insert(entries).await
        }
        async fn mapped_row_ids(&self, entity_type: &str, pks: &[i64]) -> Result<HashSet<i64>> {
            self.inner.mapped_row_ids(entity_type, pks).await
        }
        async fn delete_for_row(&self, entity_type: &str, pk: i64) -> Result<usize> {
            self.inner.delete_for_row(entity_type, pk).await
        }
        async fn count(&self, entity_type: Option<&str>) -> Result<usize> {
            PublicIdStore::count(self.inner.as_ref(), entity_type).await
        }
    }

    /// Row store whose scan reports pks that are gone by the time they are
    /// re-checked
    struct PhantomRows {
        inner: Arc<InMemoryDatabase>,
        phantoms: Vec<i64>,
    }

    #[async_trait]
    impl RowStore for PhantomRows {
        async fn get(&self, entity_type: &str, pk: i64) -> Result<Option<Row>> {
            self.inner.get(entity_type, pk).await
        }
        async fn list_pks(&self, entity_type: &str, after: Option<i64>, limit: usize) -> Result<Vec<i64>> {
            let mut pks = self.inner.list_pks(entity_type, after, limit).await?;
            pks.extend(self.phantoms.iter().filter(|&&pk| after.is_none_or(|a| pk > a)));
            pks.sort_unstable();
            pks.truncate(limit);
            Ok(pks)
        }
        async fn existing_pks(&self, entity_type: &str, pks: &[i64]) -> Result<HashSet<i64>> {
            self.inner.existing_pks(entity_type, pks).await
        }
        async fn fetch(&self, query: &RowQuery) -> Result<Vec<AnnotatedRow>> {
            self.inner.fetch(query).await
        }
        async fn count(&self, query: &RowQuery) -> Result<usize> {
            RowStore::count(self.inner.as_ref(), query).await
        }
    }

    #[tokio::test]
    async fn test_ten_thousand_rows_in_ten_batches() {
        let db = seeded(10_000);
        let backfiller = Backfiller::from_store(db.registry().clone(), db.clone());
        let widget = db.registry().get("catalog.widget").unwrap().clone();

        let report = backfiller.backfill_model(&widget, 1000).await.unwrap();
        assert_eq!(report.batches, 10);
        assert_eq!(report.created, 10_000);
        assert!(report.is_complete());
        assert_eq!(PublicIdStore::count(db.as_ref(), Some("catalog.widget")).await.unwrap(), 10_000);

        let rerun = backfiller.backfill_model(&widget, 1000).await.unwrap();
        assert_eq!(rerun.created, 0);
        assert_eq!(rerun.already_mapped, 10_000);
    }

    #[tokio::test]
    async fn test_partially_mapped_table() {
        let db = seeded(25);
        for pk in [3, 7, 11] {
            db.get_or_create("catalog.widget", pk).await.unwrap();
        }
        let backfiller = Backfiller::from_store(db.registry().clone(), db.clone());
        let widget = db.registry().get("catalog.widget").unwrap().clone();

        let report = backfiller.backfill_model(&widget, 10).await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.created, 22);
        assert_eq!(report.already_mapped, 3);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let db = seeded(50);
        let backfiller = Backfiller::from_store(db.registry().clone(), db.clone()).dry_run(true);
        let widget = db.registry().get("catalog.widget").unwrap().clone();

        let report = backfiller.backfill_model(&widget, 20).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.created, 50);
        assert_eq!(PublicIdStore::count(db.as_ref(), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_abort_and_rerun_recovers() {
        let db = seeded(30);
        let flaky = Arc::new(FlakyMappings {
            inner: db.clone(),
            calls: AtomicUsize::new(0),
            fail_on: 1,
        });
        let backfiller = Backfiller::new(db.registry().clone(), db.clone(), flaky);
        let widget = db.registry().get("catalog.widget").unwrap().clone();

        let report = backfiller.backfill_model(&widget, 10).await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.created, 20);
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0] {
            BackfillError::PartialBatchFailure {
                first_pk,
                last_pk,
                row_ids,
                message,
                ..
            } => {
                assert_eq!((*first_pk, *last_pk), (11, 20));
                assert_eq!(row_ids.len(), 10);
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected failure {:?}", other),
        }

        let rerun = Backfiller::from_store(db.registry().clone(), db.clone())
            .backfill_model(&widget, 10)
            .await
            .unwrap();
        assert_eq!(rerun.created, 10);
        assert_eq!(PublicIdStore::count(db.as_ref(), None).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_rows_deleted_during_scan_are_skipped() {
        let db = seeded(5);
        let rows = Arc::new(PhantomRows {
            inner: db.clone(),
            phantoms: vec![100, 101],
        });
        let backfiller = Backfiller::new(db.registry().clone(), rows, db.clone());
        let widget = db.registry().get("catalog.widget").unwrap().clone();

        let report = backfiller.backfill_model(&widget, 100).await.unwrap();
        assert_eq!(report.scanned, 7);
        assert_eq!(report.vanished, 2);
        assert_eq!(report.created, 5);
        assert!(db.get_for_row("catalog.widget", 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_models_filters_and_skips() {
        let db = seeded(4);
        db.load_rows("catalog.gadget", [(1, json!({}))]).unwrap();
        db.load_rows("billing.invoice", [(1, json!({})), (2, json!({}))])
            .unwrap();
        let backfiller = Backfiller::from_store(db.registry().clone(), db.clone());

        let catalog = backfiller.backfill_all_models(2, Some("catalog")).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].model, "catalog.widget");
        assert_eq!(BackfillReport::total_created(&catalog), 4);

        let all = backfiller.backfill_all_models(2, None).await.unwrap();
        assert_eq!(BackfillReport::total_created(&all), 2);
        assert!(db.get_for_row("catalog.gadget", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_instance() {
        let db = seeded(3);
        let backfiller = Backfiller::from_store(db.registry().clone(), db.clone());

        assert!(backfiller.backfill_single_instance("catalog", "widget", 2).await.unwrap());
        assert!(!backfiller.backfill_single_instance("catalog", "widget", 2).await.unwrap());
        assert!(!backfiller.backfill_single_instance("catalog", "widget", 99).await.unwrap());

        let err = backfiller
            .backfill_single_instance("catalog", "gadget", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, IdError::Backfill(BackfillError::NotEligible { .. })));

        let err = backfiller
            .backfill_single_instance("catalog", "nothing", 1)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_TYPE");
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let db = seeded(1);
        let backfiller = Backfiller::from_store(db.registry().clone(), db.clone());
        let widget = db.registry().get("catalog.widget").unwrap().clone();
        assert!(backfiller.backfill_model(&widget, 0).await.is_err());
    }
}
