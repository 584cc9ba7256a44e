//! # baseapp-ids
//!
//! Dual identifier resolution for model rows: every row keeps its numeric
//! primary key, and models that opt in also get an opaque public id (UUIDv4)
//! kept in a side mapping table.
//!
//! ## Features
//!
//! - **Three schemes**: Legacy (base64 `Type:pk` global ids), Public-ID
//!   (UUIDv4 from the mapping table) and Pk (bare primary key)
//! - **Per-call strategy selection**: the `ENABLE_PUBLIC_ID_LOGIC` flag and the
//!   model's declared eligibility pick the scheme on every resolution
//! - **Mapping lifecycle**: entries created and deleted with their rows, in
//!   the same unit of work
//! - **Bulk annotation**: list queries carry the public id without per-row
//!   lookups
//! - **Backfill**: batched, idempotent, restartable population of the
//!   mapping table
//! - **Exposure**: REST lookups by either id shape, GraphQL `node(id:)`
//!   behind the `graphql` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use baseapp_ids::prelude::*;
//!
//! let registry = Arc::new(
//!     ModelRegistry::new()
//!         .with(ModelDescriptor::new("catalog", "widget").with_public_id())?,
//! );
//! let db = Arc::new(InMemoryDatabase::new(registry.clone()));
//! let ctx = ResolutionContext::from_store(registry, db.clone(), Arc::new(RuntimeFlags::new(true)));
//!
//! let row = db.create("catalog.widget", json!({"name": "Sprocket"})).await?;
//! let id = ctx.get_id_from_instance(&row).await?;          // a UUID
//! let widget = ctx.model("catalog.widget")?.clone();
//! assert_eq!(ctx.resolve_id(&id.to_string(), &widget).await?, Some(row));
//! ```

pub mod backfill;
pub mod config;
pub mod core;
pub mod ids;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    pub use crate::backfill::{BackfillReport, Backfiller};
    pub use crate::config::{
        ENABLE_PUBLIC_ID_LOGIC, FeatureFlags, IdsConfig, RuntimeFlags, StaticFlags,
    };
    pub use crate::core::{
        AnnotatedRow, Annotation, Datastore, Eligibility, GraphQLType, IdError, IdResult,
        MappingEntry, ModelDescriptor, ModelRegistry, PkKind, PublicIdStore, ResolutionError,
        Row, RowQuery, RowStore, RowWriter, SortDirection, SortField,
    };
    pub use crate::ids::{
        ExternalId, GraphQLResolver, IdResolver, IdScheme, QuerysetAnnotator,
        ResolutionContext, RestResolver, StrategyBundle, select,
    };
    pub use crate::server::{AppState, ServerBuilder};
    pub use crate::storage::InMemoryDatabase;

    #[cfg(feature = "postgres")]
    pub use crate::storage::PostgresStore;

    pub use serde_json::json;
    pub use std::sync::Arc;
}
