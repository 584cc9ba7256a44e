//! Model descriptors and the registry that indexes them
//!
//! A [`ModelDescriptor`] carries what the resolvers need to know about a model
//! class: its entity type tag, the kind of primary key it has, the identifier
//! schemes it declares itself eligible for and the GraphQL type that exposes
//! it. Descriptors are registered once at startup in a [`ModelRegistry`].

use crate::core::error::{ConfigError, IdResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the GraphQL interface that marks a type as globally fetchable
pub const NODE_INTERFACE: &str = "Node";

/// Kind of primary key a model uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PkKind {
    /// Database-assigned, monotonically increasing integer
    #[default]
    AutoIncrement,
    /// Integer supplied by the application
    Explicit,
    /// Non-numeric key
    Uuid,
}

/// Identifier schemes a model may declare itself eligible for.
///
/// Absent any marker, the legacy scheme applies unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    PublicId,
    Pk,
}

/// GraphQL object type exposing a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLType {
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

impl GraphQLType {
    /// A type that implements the `Node` interface
    pub fn node(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interfaces: vec![NODE_INTERFACE.to_string()],
        }
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

    pub fn implements_node(&self) -> bool {
        self.implements(NODE_INTERFACE)
    }
}

/// Static description of a model class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    app_label: String,
    model_name: String,
    entity_type: String,
    plural: String,
    db_table: String,
    pk_kind: PkKind,
    eligibility: Vec<Eligibility>,
    graphql: Option<GraphQLType>,
}

impl ModelDescriptor {
    /// Describe a model with an auto-increment pk and no eligibility markers
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        let app_label = app_label.into().to_lowercase();
        let model_name = model_name.into().to_lowercase();
        Self {
            entity_type: format!("{}.{}", app_label, model_name),
            plural: format!("{}s", model_name),
            db_table: format!("{}_{}", app_label, model_name),
            app_label,
            model_name,
            pk_kind: PkKind::AutoIncrement,
            eligibility: Vec::new(),
            graphql: None,
        }
    }

    pub fn with_public_id(self) -> Self {
        self.with_eligibility(Eligibility::PublicId)
    }

    pub fn with_pk_scheme(self) -> Self {
        self.with_eligibility(Eligibility::Pk)
    }

    pub fn with_eligibility(mut self, eligibility: Eligibility) -> Self {
        if !self.eligibility.contains(&eligibility) {
            self.eligibility.push(eligibility);
        }
        self
    }

    pub fn with_pk_kind(mut self, pk_kind: PkKind) -> Self {
        self.pk_kind = pk_kind;
        self
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = plural.into();
        self
    }

    pub fn with_db_table(mut self, db_table: impl Into<String>) -> Self {
        self.db_table = db_table.into();
        self
    }

    /// Expose the model as a GraphQL type implementing `Node`
    pub fn with_node_type(self, name: impl Into<String>) -> Self {
        self.with_graphql_type(GraphQLType::node(name))
    }

    pub fn with_graphql_type(mut self, graphql: GraphQLType) -> Self {
        self.graphql = Some(graphql);
        self
    }

    pub fn app_label(&self) -> &str {
        &self.app_label
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Entity type tag, `app_label.model_name`
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn db_table(&self) -> &str {
        &self.db_table
    }

    pub fn pk_kind(&self) -> PkKind {
        self.pk_kind
    }

    pub fn graphql(&self) -> Option<&GraphQLType> {
        self.graphql.as_ref()
    }

    pub fn graphql_type_name(&self) -> Option<&str> {
        self.graphql.as_ref().map(|t| t.name.as_str())
    }

    pub fn eligibility(&self) -> &[Eligibility] {
        &self.eligibility
    }

    pub fn is_public_id_eligible(&self) -> bool {
        self.eligibility.contains(&Eligibility::PublicId)
    }

    pub fn is_pk_eligible(&self) -> bool {
        self.eligibility.contains(&Eligibility::Pk)
    }

    pub fn has_auto_increment_pk(&self) -> bool {
        self.pk_kind == PkKind::AutoIncrement
    }

    /// Whether rows of this model own a mapping entry.
    ///
    /// Independent of the feature flag: mapping entries are maintained for
    /// every eligible model so the flag can be flipped at any time.
    pub fn tracks_public_ids(&self) -> bool {
        self.is_public_id_eligible() && self.has_auto_increment_pk()
    }
}

/// Registry of all known models
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, Arc<ModelDescriptor>>,
    by_graphql_type: HashMap<String, String>,
    by_plural: HashMap<String, String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model.
    ///
    /// Entity types, GraphQL type names and plurals must all be unique.
    pub fn register(&mut self, descriptor: ModelDescriptor) -> IdResult<Arc<ModelDescriptor>> {
        let entity_type = descriptor.entity_type().to_string();
        if self.models.contains_key(&entity_type) {
            return Err(ConfigError::DuplicateModel { name: entity_type }.into());
        }
        if let Some(name) = descriptor.graphql_type_name() {
            if self.by_graphql_type.contains_key(name) {
                return Err(ConfigError::DuplicateModel {
                    name: name.to_string(),
                }
                .into());
            }
        }
        if self.by_plural.contains_key(descriptor.plural()) {
            return Err(ConfigError::DuplicateModel {
                name: descriptor.plural().to_string(),
            }
            .into());
        }

        if let Some(name) = descriptor.graphql_type_name() {
            self.by_graphql_type
                .insert(name.to_string(), entity_type.clone());
        }
        self.by_plural
            .insert(descriptor.plural().to_string(), entity_type.clone());

        let descriptor = Arc::new(descriptor);
        self.models.insert(entity_type, descriptor.clone());
        Ok(descriptor)
    }

    /// Builder-style registration, for setup code and tests
    pub fn with(mut self, descriptor: ModelDescriptor) -> IdResult<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    pub fn get(&self, entity_type: &str) -> Option<&Arc<ModelDescriptor>> {
        self.models.get(entity_type)
    }

    pub fn by_app_model(&self, app_label: &str, model_name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.get(&format!(
            "{}.{}",
            app_label.to_lowercase(),
            model_name.to_lowercase()
        ))
    }

    pub fn by_graphql_type(&self, type_name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.by_graphql_type
            .get(type_name)
            .and_then(|entity_type| self.models.get(entity_type))
    }

    pub fn by_plural(&self, plural: &str) -> Option<&Arc<ModelDescriptor>> {
        self.by_plural
            .get(plural)
            .and_then(|entity_type| self.models.get(entity_type))
    }

    /// Models in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.models.values()
    }

    pub fn entity_types(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
