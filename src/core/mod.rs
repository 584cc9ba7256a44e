//! Core module containing the fundamental types and traits of the crate

pub mod entity;
pub mod error;
pub mod mapping;
pub mod model;
pub mod query;
pub mod store;

pub use entity::{AnnotatedRow, Row};
pub use error::{IdError, IdResult, ResolutionError};
pub use mapping::{MappingEntry, MappingTable};
pub use model::{Eligibility, GraphQLType, ModelDescriptor, ModelRegistry, PkKind};
pub use query::{Annotation, RowQuery, SortDirection, SortField};
pub use store::{Datastore, PublicIdStore, RowStore, RowWriter};
