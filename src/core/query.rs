//! Row queries, query-string parameters and pagination utilities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Computed columns a query can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// The public id of each row, looked up from the mapping store in bulk
    PublicId,
}

/// Sortable columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Pk,
    /// Requires the [`Annotation::PublicId`] annotation
    PublicId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A lazily evaluated query over the rows of one entity type.
///
/// Annotations are evaluated by the store in one bulk lookup per query, so
/// callers can select, filter and sort on the external identifier without
/// per-row round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub entity_type: String,
    pub pks: Option<Vec<i64>>,
    pub public_id: Option<Uuid>,
    pub order: Option<(SortField, SortDirection)>,
    pub offset: usize,
    pub limit: Option<usize>,
    annotations: Vec<Annotation>,
}

impl RowQuery {
    /// All rows of an entity type, in primary key order
    pub fn all(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            pks: None,
            public_id: None,
            order: None,
            offset: 0,
            limit: None,
            annotations: Vec::new(),
        }
    }

    pub fn filter_pks(mut self, pks: impl IntoIterator<Item = i64>) -> Self {
        self.pks = Some(pks.into_iter().collect());
        self
    }

    /// Filter on the annotated public id
    pub fn filter_public_id(mut self, public_id: Uuid) -> Self {
        self.public_id = Some(public_id);
        self
    }

    pub fn order_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.order = Some((field, direction));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        if !self.annotations.contains(&annotation) {
            self.annotations.push(annotation);
        }
        self
    }

    pub fn is_annotated(&self, annotation: Annotation) -> bool {
        self.annotations.contains(&annotation)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Whether the query reads the public id column in a filter or sort
    pub fn references_public_id(&self) -> bool {
        self.public_id.is_some() || matches!(self.order, Some((SortField::PublicId, _)))
    }

    /// Reject queries that filter or sort on an annotation they do not carry
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.references_public_id() && !self.is_annotated(Annotation::PublicId) {
            anyhow::bail!(
                "query on {} references public_id without the public id annotation",
                self.entity_type
            );
        }
        Ok(())
    }
}

/// Query parameters for list endpoints
///
/// # Example
/// ```text
/// GET /widgets?page=2&limit=10
/// GET /widgets?sort=public_id:desc
/// GET /widgets?public_id=8b4b1a0e-2d3c-4a45-9c1e-0f6c2f9d7a10
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Page number (starts at 1)
    #[serde(default = "default_page")]
    pub page: usize,

    /// Number of items per page
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// `pk`, `pk:desc`, `public_id:asc`, ...
    pub sort: Option<String>,

    /// Exact match on the public id
    pub public_id: Option<String>,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            sort: None,
            public_id: None,
        }
    }
}

impl QueryParams {
    /// Get page number, ensuring minimum of 1
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    /// Get limit, ensuring it doesn't exceed the maximum
    pub fn limit(&self) -> usize {
        self.limit.clamp(1, 100)
    }

    /// Parse the sort expression. Unknown fields yield `None`.
    pub fn sort(&self) -> Option<(SortField, SortDirection)> {
        let raw = self.sort.as_deref()?;
        let (field, direction) = match raw.split_once(':') {
            Some((field, dir)) => (field, dir),
            None => (raw, "asc"),
        };
        let field = match field {
            "pk" | "id" => SortField::Pk,
            "public_id" => SortField::PublicId,
            _ => return None,
        };
        let direction = if direction.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Some((field, direction))
    }
}

/// Paginated response structure
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    /// The paginated data
    pub data: Vec<T>,

    /// Pagination metadata
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let limit = limit.max(1);
        let page = page.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        let start = (page - 1).saturating_mul(limit);

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: start.saturating_add(limit) < total,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_defaults() {
        let params = QueryParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 20);
        assert!(params.sort().is_none());
    }

    #[test]
    fn test_sort_parsing() {
        let params = QueryParams {
            sort: Some("public_id:desc".to_string()),
            ..Default::default()
        };
        assert_eq!(
            params.sort(),
            Some((SortField::PublicId, SortDirection::Desc))
        );

        let params = QueryParams {
            sort: Some("pk".to_string()),
            ..Default::default()
        };
        assert_eq!(params.sort(), Some((SortField::Pk, SortDirection::Asc)));

        let params = QueryParams {
            sort: Some("name:asc".to_string()),
            ..Default::default()
        };
        assert!(params.sort().is_none());
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(1, 20, 145);
        assert_eq!(meta.total_pages, 8);
        assert!(!meta.has_prev);
        assert!(meta.has_next);
    }

    #[test]
    fn test_pagination_meta_far_page() {
        let meta = PaginationMeta::new(usize::MAX, 100, 5);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
        assert_eq!(meta.total_pages, 1);
    }

    #[test]
    fn test_validate_requires_annotation_for_public_id_filter() {
        let query = RowQuery::all("catalog.widget").filter_public_id(Uuid::new_v4());
        assert!(query.validate().is_err());
        assert!(query.annotate(Annotation::PublicId).validate().is_ok());

        let sorted = RowQuery::all("catalog.widget").order_by(SortField::PublicId, SortDirection::Asc);
        assert!(sorted.validate().is_err());
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let query = RowQuery::all("catalog.widget")
            .annotate(Annotation::PublicId)
            .annotate(Annotation::PublicId);
        assert_eq!(query.annotations().len(), 1);
    }
}
