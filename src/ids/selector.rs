//! Strategy selection
//!
//! Picks the identifier scheme for a model from its eligibility markers and
//! the current value of the public id flag. Pure and cheap: it is evaluated
//! on every call and never cached, since the flag can change at runtime.

use crate::core::model::ModelDescriptor;
use crate::ids::annotate::QuerysetAnnotator;
use crate::ids::graphql::GraphQLResolver;
use crate::ids::id_resolver::IdResolver;
use crate::ids::rest::RestResolver;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// Raw numeric primary key, legacy base64 GraphQL global ids
    Legacy,
    /// Opaque UUID from the mapping store
    PublicId,
    /// Explicit numeric primary key
    Pk,
}

impl fmt::Display for IdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdScheme::Legacy => "legacy",
            IdScheme::PublicId => "public_id",
            IdScheme::Pk => "pk",
        };
        f.write_str(name)
    }
}

/// The four collaborating strategies for one scheme.
///
/// Immutable and built fresh for every resolution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyBundle {
    pub scheme: IdScheme,
    pub id_resolver: IdResolver,
    pub graphql_resolver: GraphQLResolver,
    pub queryset_annotator: QuerysetAnnotator,
    pub rest_resolver: RestResolver,
}

impl StrategyBundle {
    pub fn for_scheme(scheme: IdScheme) -> Self {
        Self {
            scheme,
            id_resolver: IdResolver::new(scheme),
            graphql_resolver: GraphQLResolver::new(scheme),
            queryset_annotator: QuerysetAnnotator::new(scheme),
            rest_resolver: RestResolver::new(scheme),
        }
    }

    pub fn legacy() -> Self {
        Self::for_scheme(IdScheme::Legacy)
    }

    pub fn public_id() -> Self {
        Self::for_scheme(IdScheme::PublicId)
    }

    pub fn pk() -> Self {
        Self::for_scheme(IdScheme::Pk)
    }
}

/// Choose the scheme for a model.
///
/// 1. Public-ID when the model declares it, has an auto-increment pk and the
///    flag is on
/// 2. Pk when the model declares explicit-pk eligibility
/// 3. Legacy otherwise
pub fn select_scheme(model: &ModelDescriptor, public_id_enabled: bool) -> IdScheme {
    if public_id_enabled && model.is_public_id_eligible() && model.has_auto_increment_pk() {
        IdScheme::PublicId
    } else if model.is_pk_eligible() {
        IdScheme::Pk
    } else {
        IdScheme::Legacy
    }
}

/// Choose the strategy bundle for a model
pub fn select(model: &ModelDescriptor, public_id_enabled: bool) -> StrategyBundle {
    StrategyBundle::for_scheme(select_scheme(model, public_id_enabled))
}
