//! REST resolver strategies: URL path segment to primary key

use crate::core::error::{IdError, IdResult};
use crate::core::model::ModelDescriptor;
use crate::ids::context::ResolutionContext;
use crate::ids::format::{decode_global_id, is_numeric, parse_pk, parse_public_id};
use crate::ids::selector::IdScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestResolver {
    scheme: IdScheme,
}

impl RestResolver {
    pub fn new(scheme: IdScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> IdScheme {
        self.scheme
    }

    /// Turn an external id from a path segment into a primary key.
    ///
    /// Numeric schemes only parse; the surrounding query reports a missing
    /// row. The Legacy scheme also takes a base64 `TypeName:pk` global id,
    /// whose type must be the GraphQL type of `expected_model`. The Public-ID
    /// scheme looks the id up and, when `expected_model`
    /// is given, requires the entry to belong to it.
    pub async fn resolve_public_id_to_pk(
        &self,
        ctx: &ResolutionContext,
        external_id: &str,
        expected_model: Option<&ModelDescriptor>,
    ) -> IdResult<i64> {
        match self.scheme {
            IdScheme::Legacy if !is_numeric(external_id) => {
                let (type_name, id) = decode_global_id(external_id)?;
                if let Some(model) = expected_model {
                    if model.graphql_type_name() != Some(type_name.as_str()) {
                        return Err(IdError::type_mismatch(
                            model.graphql_type_name().unwrap_or(model.entity_type()),
                            type_name,
                        ));
                    }
                }
                parse_pk(&id)
            }
            IdScheme::Legacy | IdScheme::Pk => parse_pk(external_id),
            IdScheme::PublicId => {
                let public_id = parse_public_id(external_id)?;
                let entry = ctx
                    .mappings()
                    .get_by_public_id(&public_id)
                    .await?
                    .ok_or_else(|| {
                        IdError::not_found(
                            expected_model.map_or("public id", |m| m.entity_type()),
                            public_id,
                        )
                    })?;
                if let Some(model) = expected_model {
                    if entry.entity_type != model.entity_type() {
                        return Err(IdError::type_mismatch(
                            model.entity_type(),
                            entry.entity_type,
                        ));
                    }
                }
                Ok(entry.entity_row_id)
            }
        }
    }
}
