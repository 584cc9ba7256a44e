//! Id resolver strategies: row to external id and back

use crate::core::entity::Row;
use crate::core::error::{IdError, IdResult};
use crate::core::model::ModelDescriptor;
use crate::ids::context::ResolutionContext;
use crate::ids::format::{ExternalId, parse_pk, parse_public_id};
use crate::ids::selector::IdScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdResolver {
    scheme: IdScheme,
}

impl IdResolver {
    pub fn new(scheme: IdScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> IdScheme {
        self.scheme
    }

    /// External id of a row.
    ///
    /// Under the Public-ID scheme the mapping entry is created lazily when
    /// the row has none yet.
    pub async fn get_id_from_instance(&self, ctx: &ResolutionContext, row: &Row) -> IdResult<ExternalId> {
        match self.scheme {
            IdScheme::Legacy => Ok(ExternalId::Legacy(row.pk)),
            IdScheme::Pk => Ok(ExternalId::Pk(row.pk)),
            IdScheme::PublicId => {
                let entry = ctx.mappings().get_or_create(&row.entity_type, row.pk).await?;
                Ok(ExternalId::PublicId(entry.public_id))
            }
        }
    }

    /// Resolve an external id back to its row.
    ///
    /// - Legacy and Pk parse a numeric key, need `model` and fail with
    ///   `NotFound` when the row is absent.
    /// - Public-ID fails on a malformed UUID, and returns `None` when no
    ///   mapping entry exists or it belongs to another model than `model`.
    pub async fn resolve_id(
        &self,
        ctx: &ResolutionContext,
        external_id: &str,
        model: Option<&ModelDescriptor>,
    ) -> IdResult<Option<Row>> {
        match self.scheme {
            IdScheme::Legacy | IdScheme::Pk => {
                let model = model.ok_or_else(|| {
                    IdError::invalid_format(external_id, "numeric identifiers need an expected type")
                })?;
                let pk = parse_pk(external_id)?;
                match ctx.rows().get(model.entity_type(), pk).await? {
                    Some(row) => Ok(Some(row)),
                    None => Err(IdError::not_found(model.entity_type(), pk)),
                }
            }
            IdScheme::PublicId => {
                let public_id = parse_public_id(external_id)?;
                let Some(entry) = ctx.mappings().get_by_public_id(&public_id).await? else {
                    tracing::debug!(%public_id, "no mapping entry for public id");
                    return Ok(None);
                };
                if let Some(model) = model {
                    if entry.entity_type != model.entity_type() {
                        tracing::debug!(
                            %public_id,
                            expected = model.entity_type(),
                            actual = %entry.entity_type,
                            "public id belongs to another model"
                        );
                        return Ok(None);
                    }
                }
                Ok(ctx
                    .rows()
                    .get(&entry.entity_type, entry.entity_row_id)
                    .await?)
            }
        }
    }
}
