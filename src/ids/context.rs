//! Resolution context: everything a strategy needs, passed explicitly
//!
//! The context bundles the model registry, the row store, the mapping store
//! and the feature flag source. It is the single entry point request
//! handlers use; which strategy ran is never visible to them.

use crate::config::FeatureFlags;
use crate::core::entity::Row;
use crate::core::error::{IdError, IdResult, ResolutionError};
use crate::core::model::{ModelDescriptor, ModelRegistry};
use crate::core::query::RowQuery;
use crate::core::store::{PublicIdStore, RowStore};
use crate::ids::format::{ExternalId, is_canonical_uuid_v4, is_numeric};
use crate::ids::graphql;
use crate::ids::selector::{self, IdScheme, StrategyBundle};
use std::sync::Arc;

#[derive(Clone)]
pub struct ResolutionContext {
    registry: Arc<ModelRegistry>,
    rows: Arc<dyn RowStore>,
    mappings: Arc<dyn PublicIdStore>,
    flags: Arc<dyn FeatureFlags>,
}

impl ResolutionContext {
    pub fn new(
        registry: Arc<ModelRegistry>,
        rows: Arc<dyn RowStore>,
        mappings: Arc<dyn PublicIdStore>,
        flags: Arc<dyn FeatureFlags>,
    ) -> Self {
        Self {
            registry,
            rows,
            mappings,
            flags,
        }
    }

    /// Context over a backend that stores both rows and mappings
    pub fn from_store<S>(registry: Arc<ModelRegistry>, store: Arc<S>, flags: Arc<dyn FeatureFlags>) -> Self
    where
        S: RowStore + PublicIdStore + 'static,
    {
        let rows: Arc<dyn RowStore> = store.clone();
        let mappings: Arc<dyn PublicIdStore> = store;
        Self::new(registry, rows, mappings, flags)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn rows(&self) -> &dyn RowStore {
        self.rows.as_ref()
    }

    pub fn mappings(&self) -> &dyn PublicIdStore {
        self.mappings.as_ref()
    }

    /// Current value of `ENABLE_PUBLIC_ID_LOGIC`, read on every call
    pub fn public_id_enabled(&self) -> bool {
        self.flags.public_id_enabled()
    }

    /// Registered model for an entity type
    pub fn model(&self, entity_type: &str) -> IdResult<&Arc<ModelDescriptor>> {
        self.registry.get(entity_type).ok_or_else(|| {
            IdError::from(ResolutionError::UnknownType {
                name: entity_type.to_string(),
            })
        })
    }

    /// Registered model for a GraphQL type name
    pub fn model_for_graphql_type(&self, type_name: &str) -> IdResult<&Arc<ModelDescriptor>> {
        self.registry.by_graphql_type(type_name).ok_or_else(|| {
            IdError::from(ResolutionError::UnknownType {
                name: type_name.to_string(),
            })
        })
    }

    /// Strategy bundle for a model under the current flag value
    pub fn bundle_for(&self, model: &ModelDescriptor) -> StrategyBundle {
        selector::select(model, self.public_id_enabled())
    }

    // =========================================================================
    // Id resolution
    // =========================================================================

    /// External id of a row under its model's active scheme
    pub async fn get_id_from_instance(&self, row: &Row) -> IdResult<ExternalId> {
        let model = self.model(&row.entity_type)?;
        self.bundle_for(model)
            .id_resolver
            .get_id_from_instance(self, row)
            .await
    }

    /// Resolve an external id of `model` back to its row
    pub async fn resolve_id(&self, external_id: &str, model: &ModelDescriptor) -> IdResult<Option<Row>> {
        self.bundle_for(model)
            .id_resolver
            .resolve_id(self, external_id, Some(model))
            .await
    }

    // =========================================================================
    // GraphQL
    // =========================================================================

    /// GraphQL global id of a row
    pub async fn to_global_id(&self, row: &Row) -> IdResult<String> {
        let model = self.model(&row.entity_type)?;
        let type_name = model.graphql_type_name().ok_or_else(|| {
            IdError::from(ResolutionError::UnknownType {
                name: format!("GraphQL type for {}", model.entity_type()),
            })
        })?;
        let bundle = self.bundle_for(model);
        let id = bundle.id_resolver.get_id_from_instance(self, row).await?;
        Ok(bundle.graphql_resolver.to_global_id(type_name, &id))
    }

    /// Resolve a GraphQL global id of any shape to its row
    pub async fn resolve_node(&self, global_id: &str, expected_type: Option<&str>) -> IdResult<Option<Row>> {
        graphql::get_node_from_global_id(self, global_id, expected_type).await
    }

    /// Primary key behind a GraphQL global id of any shape
    pub async fn pk_from_global_id(&self, global_id: &str, expected_type: Option<&str>) -> IdResult<i64> {
        graphql::get_pk_from_global_id(self, global_id, expected_type).await
    }

    // =========================================================================
    // REST
    // =========================================================================

    /// Resolve a REST path segment to a primary key of `model`.
    ///
    /// - a canonical UUIDv4 goes through the mapping store when the flag is on
    /// - a bare number is a primary key, unless the model is served under
    ///   the Public-ID scheme, which does not accept raw keys
    /// - anything else must be a legacy base64 `TypeName:pk` global id of
    ///   the model's GraphQL type
    pub async fn resolve_lookup(&self, model: &ModelDescriptor, raw: &str) -> IdResult<i64> {
        let bundle = self.bundle_for(model);
        if is_canonical_uuid_v4(raw) && self.public_id_enabled() {
            return StrategyBundle::public_id()
                .rest_resolver
                .resolve_public_id_to_pk(self, raw, Some(model))
                .await;
        }
        if is_numeric(raw) {
            if bundle.scheme == IdScheme::PublicId {
                return Err(IdError::type_mismatch(
                    model.entity_type(),
                    "a numeric primary key",
                ));
            }
            return bundle
                .rest_resolver
                .resolve_public_id_to_pk(self, raw, Some(model))
                .await;
        }
        // legacy global ids are accepted whatever the active scheme, as in GraphQL
        StrategyBundle::legacy()
            .rest_resolver
            .resolve_public_id_to_pk(self, raw, Some(model))
            .await
    }

    // =========================================================================
    // Query annotation
    // =========================================================================

    /// Annotate a query with the external id column under the active scheme
    pub fn annotate(&self, model: &ModelDescriptor, query: RowQuery) -> RowQuery {
        self.bundle_for(model)
            .queryset_annotator
            .annotate(model, query)
    }
}
