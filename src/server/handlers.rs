//! HTTP handlers for model rows addressed by external id
//!
//! Every `{id}` path segment may be a public id, a bare primary key or
//! anything else; the resolution context decides which scheme applies and
//! handlers only ever see a primary key or an [`IdError`].

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::core::entity::{AnnotatedRow, Row};
use crate::core::error::{IdError, IdResult};
use crate::core::model::ModelDescriptor;
use crate::core::query::{PaginatedResponse, PaginationMeta, QueryParams, RowQuery};
use crate::core::store::RowWriter;
use crate::ids::format::{ExternalId, parse_public_id};
use crate::ids::context::ResolutionContext;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ctx: ResolutionContext,
    pub writer: Arc<dyn RowWriter>,
}

impl AppState {
    pub fn new(ctx: ResolutionContext, writer: Arc<dyn RowWriter>) -> Self {
        Self { ctx, writer }
    }

    /// Model served under a REST plural
    fn model(&self, plural: &str) -> IdResult<Arc<ModelDescriptor>> {
        self.ctx
            .registry()
            .by_plural(plural)
            .cloned()
            .ok_or_else(|| IdError::not_found("resource", plural))
    }
}

/// A row as exposed over REST
#[derive(Debug, Serialize)]
pub struct RowResponse {
    /// External id under the model's active scheme
    pub id: ExternalId,
    pub pk: i64,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl RowResponse {
    fn new(id: ExternalId, row: Row) -> Self {
        Self {
            id,
            pk: row.pk,
            entity_type: row.entity_type,
            data: row.data,
            created_at: row.created_at,
        }
    }
}

/// External id for a row from an annotated query, falling back to the
/// resolver when the annotation is absent
async fn external_id(ctx: &ResolutionContext, annotated: &AnnotatedRow) -> IdResult<ExternalId> {
    match annotated.public_id {
        Some(public_id) => Ok(ExternalId::PublicId(public_id)),
        None => ctx.get_id_from_instance(&annotated.row).await,
    }
}

/// GET /{plural}
pub async fn list_rows(
    State(state): State<AppState>,
    Path(plural): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<Json<PaginatedResponse<RowResponse>>, IdError> {
    let model = state.model(&plural)?;
    let mut query = state.ctx.annotate(&model, RowQuery::all(model.entity_type()));

    if let Some(raw) = params.public_id.as_deref() {
        query = query.filter_public_id(parse_public_id(raw)?);
    }
    if let Some((field, direction)) = params.sort() {
        query = query.order_by(field, direction);
    }
    if let Err(e) = query.validate() {
        return Err(IdError::invalid_format(
            params.public_id.clone().or(params.sort.clone()).unwrap_or_default(),
            e.to_string(),
        ));
    }

    let page = params.page();
    let limit = params.limit();
    let total = state.ctx.rows().count(&query).await?;
    // pages past the end are empty, whatever their number
    let rows = match (page - 1).checked_mul(limit) {
        Some(offset) if offset < total => {
            state
                .ctx
                .rows()
                .fetch(&query.offset(offset).limit(limit))
                .await?
        }
        _ => Vec::new(),
    };

    tracing::debug!(model = model.entity_type(), page, limit, total, "listed rows");

    let mut data = Vec::with_capacity(rows.len());
    for annotated in rows {
        let id = external_id(&state.ctx, &annotated).await?;
        data.push(RowResponse::new(id, annotated.row));
    }

    Ok(Json(PaginatedResponse {
        data,
        pagination: PaginationMeta::new(page, limit, total),
    }))
}

/// GET /{plural}/{id}
pub async fn get_row(
    State(state): State<AppState>,
    Path((plural, raw_id)): Path<(String, String)>,
) -> Result<Json<RowResponse>, IdError> {
    let model = state.model(&plural)?;
    let pk = state.ctx.resolve_lookup(&model, &raw_id).await?;
    let row = state
        .ctx
        .rows()
        .get(model.entity_type(), pk)
        .await?
        .ok_or_else(|| IdError::not_found(model.entity_type(), &raw_id))?;
    let id = state.ctx.get_id_from_instance(&row).await?;
    Ok(Json(RowResponse::new(id, row)))
}

/// POST /{plural}
pub async fn create_row(
    State(state): State<AppState>,
    Path(plural): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, IdError> {
    let model = state.model(&plural)?;
    let row = state.writer.create(model.entity_type(), payload).await?;
    let id = state.ctx.get_id_from_instance(&row).await?;
    tracing::info!(model = model.entity_type(), pk = row.pk, %id, "row created");
    Ok((StatusCode::CREATED, Json(RowResponse::new(id, row))).into_response())
}

/// DELETE /{plural}/{id}
pub async fn delete_row(
    State(state): State<AppState>,
    Path((plural, raw_id)): Path<(String, String)>,
) -> Result<StatusCode, IdError> {
    let model = state.model(&plural)?;
    let pk = state.ctx.resolve_lookup(&model, &raw_id).await?;
    if !state.writer.delete(model.entity_type(), pk).await? {
        return Err(IdError::not_found(model.entity_type(), &raw_id));
    }
    tracing::info!(model = model.entity_type(), pk, "row deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "baseapp-ids"
    }))
}
