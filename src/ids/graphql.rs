//! GraphQL resolver strategies and the global id dispatcher
//!
//! Each strategy encodes and decodes one shape of global id. The free
//! functions [`get_node_from_global_id`] and [`get_pk_from_global_id`] pick
//! the strategy from the shape of the incoming string:
//!
//! 1. canonical UUIDv4 with the public id flag on: Public-ID
//! 2. bare number: Pk, which needs an expected type
//! 3. anything else: Legacy base64 `TypeName:pk`, regardless of the flag
//!
//! Before returning an object every strategy checks that its GraphQL type
//! implements `Node` and, when the caller expects a type, that it is exactly
//! that type. A mismatch is an error, not a silent `None`.

use crate::core::entity::Row;
use crate::core::error::{IdError, IdResult, ResolutionError};
use crate::core::model::{ModelDescriptor, NODE_INTERFACE};
use crate::ids::context::ResolutionContext;
use crate::ids::format::{
    ExternalId, decode_global_id, encode_global_id, is_canonical_uuid_v4, is_numeric, parse_pk,
    parse_public_id,
};
use crate::ids::selector::IdScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphQLResolver {
    scheme: IdScheme,
}

impl GraphQLResolver {
    pub fn new(scheme: IdScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> IdScheme {
        self.scheme
    }

    /// Encode a global id for an object of `type_name`
    pub fn to_global_id(&self, type_name: &str, id: &ExternalId) -> String {
        match self.scheme {
            IdScheme::Legacy => encode_global_id(type_name, &id.to_string()),
            IdScheme::PublicId | IdScheme::Pk => id.to_string(),
        }
    }

    /// Primary key behind a global id of this strategy's shape. With an
    /// expected GraphQL type, ids of another type are a type mismatch.
    pub async fn get_pk_from_global_id(
        &self,
        ctx: &ResolutionContext,
        global_id: &str,
        expected_type: Option<&str>,
    ) -> IdResult<i64> {
        match self.scheme {
            IdScheme::Legacy => {
                let (type_name, id) = decode_global_id(global_id)?;
                ensure_expected(&type_name, expected_type)?;
                parse_pk(&id)
            }
            IdScheme::Pk => parse_pk(global_id),
            IdScheme::PublicId => {
                let public_id = parse_public_id(global_id)?;
                let Some(entry) = ctx.mappings().get_by_public_id(&public_id).await? else {
                    let entity_type = match expected_type {
                        Some(name) => ctx.model_for_graphql_type(name)?.entity_type(),
                        None => NODE_INTERFACE,
                    };
                    return Err(IdError::not_found(entity_type, public_id));
                };
                if expected_type.is_some() {
                    let model = ctx.model(&entry.entity_type)?;
                    ensure_expected(
                        model.graphql_type_name().unwrap_or(model.entity_type()),
                        expected_type,
                    )?;
                }
                Ok(entry.entity_row_id)
            }
        }
    }

    /// Resolve a global id of this strategy's shape to its row
    pub async fn get_node_from_global_id(
        &self,
        ctx: &ResolutionContext,
        global_id: &str,
        expected_type: Option<&str>,
    ) -> IdResult<Option<Row>> {
        match self.scheme {
            IdScheme::Legacy => legacy_node(ctx, global_id, expected_type).await,
            IdScheme::PublicId => public_id_node(ctx, global_id, expected_type).await,
            IdScheme::Pk => pk_node(ctx, global_id, expected_type).await,
        }
    }
}

/// The model's GraphQL type must implement `Node`; returns its name
fn ensure_node(model: &ModelDescriptor) -> IdResult<&str> {
    match model.graphql() {
        Some(graphql) if graphql.implements_node() => Ok(&graphql.name),
        Some(graphql) => Err(IdError::type_mismatch(NODE_INTERFACE, graphql.name.clone())),
        None => Err(IdError::type_mismatch(NODE_INTERFACE, model.entity_type())),
    }
}

fn ensure_expected(type_name: &str, expected_type: Option<&str>) -> IdResult<()> {
    match expected_type {
        Some(expected) if expected != type_name => Err(IdError::type_mismatch(expected, type_name)),
        _ => Ok(()),
    }
}

async fn legacy_node(
    ctx: &ResolutionContext,
    global_id: &str,
    expected_type: Option<&str>,
) -> IdResult<Option<Row>> {
    let (type_name, id) = decode_global_id(global_id)?;
    ensure_expected(&type_name, expected_type)?;
    let model = ctx.model_for_graphql_type(&type_name)?;
    ensure_node(model)?;
    let pk = parse_pk(&id)?;
    Ok(ctx.rows().get(model.entity_type(), pk).await?)
}

async fn public_id_node(
    ctx: &ResolutionContext,
    global_id: &str,
    expected_type: Option<&str>,
) -> IdResult<Option<Row>> {
    let public_id = parse_public_id(global_id)?;
    let Some(entry) = ctx.mappings().get_by_public_id(&public_id).await? else {
        return Ok(None);
    };
    let model = ctx.model(&entry.entity_type)?;
    if !model.is_public_id_eligible() {
        return Err(ResolutionError::SchemaInconsistency {
            entity_type: entry.entity_type.clone(),
            scheme: IdScheme::PublicId.to_string(),
            message: format!("public id {} maps to a model without public ids", public_id),
        }
        .into());
    }
    let type_name = ensure_node(model)?;
    ensure_expected(type_name, expected_type)?;
    Ok(ctx
        .rows()
        .get(&entry.entity_type, entry.entity_row_id)
        .await?)
}

async fn pk_node(
    ctx: &ResolutionContext,
    global_id: &str,
    expected_type: Option<&str>,
) -> IdResult<Option<Row>> {
    let expected = expected_type.ok_or_else(|| {
        IdError::invalid_format(global_id, "numeric identifiers need an expected type")
    })?;
    let model = ctx.model_for_graphql_type(expected)?;
    if !model.is_pk_eligible() {
        return Err(IdError::type_mismatch(expected, "a numeric primary key"));
    }
    ensure_node(model)?;
    let pk = parse_pk(global_id)?;
    Ok(ctx.rows().get(model.entity_type(), pk).await?)
}

/// Resolve a global id of any shape.
///
/// A canonical UUID that has no mapping entry falls through the chain; since
/// `-` is outside the standard base64 alphabet it can never be a legacy
/// blob, so it ends as `None` rather than as a format error.
pub async fn get_node_from_global_id(
    ctx: &ResolutionContext,
    global_id: &str,
    expected_type: Option<&str>,
) -> IdResult<Option<Row>> {
    let uuid_shaped = is_canonical_uuid_v4(global_id);

    if uuid_shaped && ctx.public_id_enabled() {
        let resolver = GraphQLResolver::new(IdScheme::PublicId);
        if let Some(row) = resolver
            .get_node_from_global_id(ctx, global_id, expected_type)
            .await?
        {
            return Ok(Some(row));
        }
        tracing::debug!(global_id, "public id did not resolve, falling through");
    }

    if is_numeric(global_id) {
        return GraphQLResolver::new(IdScheme::Pk)
            .get_node_from_global_id(ctx, global_id, expected_type)
            .await;
    }

    match GraphQLResolver::new(IdScheme::Legacy)
        .get_node_from_global_id(ctx, global_id, expected_type)
        .await
    {
        Err(IdError::Resolution(ResolutionError::InvalidIdentifierFormat { .. }))
            if uuid_shaped && ctx.public_id_enabled() =>
        {
            Ok(None)
        }
        other => other,
    }
}

/// Primary key behind a global id of any shape, dispatched like
/// [`get_node_from_global_id`]
pub async fn get_pk_from_global_id(
    ctx: &ResolutionContext,
    global_id: &str,
    expected_type: Option<&str>,
) -> IdResult<i64> {
    let scheme = if is_canonical_uuid_v4(global_id) && ctx.public_id_enabled() {
        IdScheme::PublicId
    } else if is_numeric(global_id) {
        IdScheme::Pk
    } else {
        IdScheme::Legacy
    };
    GraphQLResolver::new(scheme)
        .get_pk_from_global_id(ctx, global_id, expected_type)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_global_id_shapes() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            GraphQLResolver::new(IdScheme::Legacy).to_global_id("Widget", &ExternalId::Legacy(42)),
            "V2lkZ2V0OjQy"
        );
        assert_eq!(
            GraphQLResolver::new(IdScheme::PublicId)
                .to_global_id("Widget", &ExternalId::PublicId(id)),
            id.to_string()
        );
        assert_eq!(
            GraphQLResolver::new(IdScheme::Pk).to_global_id("Gadget", &ExternalId::Pk(9)),
            "9"
        );
    }

    #[test]
    fn test_ensure_node() {
        let node = ModelDescriptor::new("catalog", "widget").with_node_type("Widget");
        assert_eq!(ensure_node(&node).unwrap(), "Widget");

        let hidden = ModelDescriptor::new("catalog", "hidden");
        assert!(ensure_node(&hidden).is_err());

        let plain = ModelDescriptor::new("catalog", "plain").with_graphql_type(
            crate::core::model::GraphQLType {
                name: "Plain".to_string(),
                interfaces: vec![],
            },
        );
        let err = ensure_node(&plain).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_MISMATCH");
    }

    #[test]
    fn test_ensure_expected() {
        assert!(ensure_expected("Widget", None).is_ok());
        assert!(ensure_expected("Widget", Some("Widget")).is_ok());
        assert!(ensure_expected("Widget", Some("Gadget")).is_err());
    }
}
