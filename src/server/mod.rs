//! HTTP exposure: REST lookups by external id and, with the `graphql`
//! feature, a `node(id:)` endpoint

pub mod builder;
#[cfg(feature = "graphql")]
pub mod graphql;
pub mod handlers;
pub mod router;

pub use builder::ServerBuilder;
pub use handlers::AppState;
pub use router::build_routes;
