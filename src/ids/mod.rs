//! Identifier resolution: formats, strategy selection and the four
//! strategy families (id, GraphQL, REST, query annotation)

pub mod annotate;
pub mod context;
pub mod format;
pub mod graphql;
pub mod id_resolver;
pub mod rest;
pub mod selector;

pub use annotate::QuerysetAnnotator;
pub use context::ResolutionContext;
pub use format::ExternalId;
pub use graphql::GraphQLResolver;
pub use id_resolver::IdResolver;
pub use rest::RestResolver;
pub use selector::{IdScheme, StrategyBundle, select};
