//! Queryset annotator strategies

use crate::core::model::ModelDescriptor;
use crate::core::query::{Annotation, RowQuery};
use crate::ids::selector::IdScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerysetAnnotator {
    scheme: IdScheme,
}

impl QuerysetAnnotator {
    pub fn new(scheme: IdScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> IdScheme {
        self.scheme
    }

    /// Add the external id column to a query over `model`.
    ///
    /// Legacy and Pk ids are the primary key itself, so the query is returned
    /// unchanged. Public-ID adds the correlated `public_id` lookup that the
    /// store evaluates in bulk.
    pub fn annotate(&self, model: &ModelDescriptor, query: RowQuery) -> RowQuery {
        match self.scheme {
            IdScheme::Legacy | IdScheme::Pk => query,
            IdScheme::PublicId => {
                debug_assert_eq!(query.entity_type, model.entity_type());
                query.annotate(Annotation::PublicId)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_schemes_are_noop() {
        let model = ModelDescriptor::new("catalog", "widget");
        let query = RowQuery::all("catalog.widget").limit(5);
        for scheme in [IdScheme::Legacy, IdScheme::Pk] {
            let annotated = QuerysetAnnotator::new(scheme).annotate(&model, query.clone());
            assert_eq!(annotated, query);
        }
    }

    #[test]
    fn test_public_id_adds_annotation() {
        let model = ModelDescriptor::new("catalog", "widget").with_public_id();
        let annotated = QuerysetAnnotator::new(IdScheme::PublicId)
            .annotate(&model, RowQuery::all("catalog.widget"));
        assert!(annotated.is_annotated(Annotation::PublicId));
    }
}
