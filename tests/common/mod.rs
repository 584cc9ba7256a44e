//! Shared fixtures for integration tests

#![allow(dead_code)]

use baseapp_ids::prelude::*;

/// A catalog with one model per identifier situation:
/// - `Widget`, `OtherModel`: Public-ID eligible
/// - `Gadget`: explicit primary key ids
/// - `Thing`: legacy only
/// - `Hidden`: Public-ID eligible, GraphQL type without `Node`
pub fn catalog_registry() -> Arc<ModelRegistry> {
    Arc::new(
        ModelRegistry::new()
            .with(
                ModelDescriptor::new("catalog", "widget")
                    .with_public_id()
                    .with_node_type("Widget"),
            )
            .unwrap()
            .with(
                ModelDescriptor::new("catalog", "othermodel")
                    .with_public_id()
                    .with_node_type("OtherModel"),
            )
            .unwrap()
            .with(
                ModelDescriptor::new("catalog", "gadget")
                    .with_pk_scheme()
                    .with_pk_kind(PkKind::Explicit)
                    .with_node_type("Gadget"),
            )
            .unwrap()
            .with(ModelDescriptor::new("legacy", "thing").with_node_type("Thing"))
            .unwrap()
            .with(
                ModelDescriptor::new("catalog", "hidden")
                    .with_public_id()
                    .with_graphql_type(GraphQLType {
                        name: "Hidden".to_string(),
                        interfaces: vec![],
                    }),
            )
            .unwrap(),
    )
}

pub struct Fixture {
    pub db: Arc<InMemoryDatabase>,
    pub flags: RuntimeFlags,
    pub ctx: ResolutionContext,
}

impl Fixture {
    pub fn new(public_id_enabled: bool) -> Self {
        let registry = catalog_registry();
        let db = Arc::new(InMemoryDatabase::new(registry.clone()));
        let flags = RuntimeFlags::new(public_id_enabled);
        let ctx = ResolutionContext::from_store(registry, db.clone(), Arc::new(flags.clone()));
        Self { db, flags, ctx }
    }

    pub fn model(&self, entity_type: &str) -> Arc<ModelDescriptor> {
        self.ctx.model(entity_type).unwrap().clone()
    }
}
