//! Typed error handling for identifier resolution
//!
//! Callers at the request boundary match on these variants to turn a failed
//! lookup into the right API response instead of dealing with a generic
//! `anyhow::Error`.
//!
//! # Error Categories
//!
//! - [`ResolutionError`]: an external identifier could not be turned into a row
//! - [`StorageError`]: the row store or the mapping store failed
//! - [`ConfigError`]: configuration parsing and model registration
//! - [`BackfillError`]: backfill batches that failed (logged, never fatal)
//!
//! # Example
//!
//! ```rust,ignore
//! match ctx.resolve_node(global_id, Some("Widget")).await {
//!     Ok(Some(row)) => println!("Found: {:?}", row),
//!     Ok(None) => println!("nothing behind {}", global_id),
//!     Err(IdError::Resolution(ResolutionError::TypeMismatch { expected, actual })) => {
//!         println!("expected {}, got {}", expected, actual);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The main error type of the crate
#[derive(Debug)]
pub enum IdError {
    /// Identifier parsing and lookup errors
    Resolution(ResolutionError),

    /// Row store or mapping store errors
    Storage(StorageError),

    /// Configuration errors
    Config(ConfigError),

    /// Backfill errors
    Backfill(BackfillError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::Resolution(e) => write!(f, "{}", e),
            IdError::Storage(e) => write!(f, "{}", e),
            IdError::Config(e) => write!(f, "{}", e),
            IdError::Backfill(e) => write!(f, "{}", e),
            IdError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for IdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IdError::Resolution(e) => Some(e),
            IdError::Storage(e) => Some(e),
            IdError::Config(e) => Some(e),
            IdError::Backfill(e) => Some(e),
            IdError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IdError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            IdError::Resolution(e) => e.status_code(),
            IdError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IdError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IdError::Backfill(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IdError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            IdError::Resolution(e) => e.error_code(),
            IdError::Storage(_) => "STORAGE_ERROR",
            IdError::Config(_) => "CONFIG_ERROR",
            IdError::Backfill(_) => "BACKFILL_ERROR",
            IdError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            IdError::Resolution(ResolutionError::NotFound { entity_type, id }) => {
                Some(serde_json::json!({
                    "entity_type": entity_type,
                    "id": id,
                }))
            }
            IdError::Resolution(ResolutionError::TypeMismatch { expected, actual }) => {
                Some(serde_json::json!({
                    "expected": expected,
                    "actual": actual,
                }))
            }
            IdError::Resolution(ResolutionError::InvalidIdentifierFormat { value, .. }) => {
                Some(serde_json::json!({ "value": value }))
            }
            _ => None,
        }
    }

    /// Shorthand for [`ResolutionError::InvalidIdentifierFormat`]
    pub fn invalid_format(value: impl Into<String>, reason: impl Into<String>) -> Self {
        IdError::Resolution(ResolutionError::InvalidIdentifierFormat {
            value: value.into(),
            reason: reason.into(),
        })
    }

    /// Shorthand for [`ResolutionError::NotFound`]
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        IdError::Resolution(ResolutionError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        })
    }

    /// Shorthand for [`ResolutionError::TypeMismatch`]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        IdError::Resolution(ResolutionError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        })
    }

    /// True for errors a client caused (bad id, missing row, wrong type)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for IdError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Errors raised while turning an external identifier back into a row
#[derive(Debug)]
pub enum ResolutionError {
    /// The string does not parse under any identifier scheme
    InvalidIdentifierFormat { value: String, reason: String },

    /// A well-formed identifier has no corresponding row
    NotFound { entity_type: String, id: String },

    /// The resolved row's type is not the one the caller expected
    TypeMismatch { expected: String, actual: String },

    /// A row claims a scheme its model does not support.
    ///
    /// Never expected in a correctly configured system.
    SchemaInconsistency {
        entity_type: String,
        scheme: String,
        message: String,
    },

    /// A type name or entity type that is not registered
    UnknownType { name: String },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::InvalidIdentifierFormat { value, reason } => {
                write!(f, "Invalid identifier '{}': {}", value, reason)
            }
            ResolutionError::NotFound { entity_type, id } => {
                write!(f, "{} with id '{}' not found", entity_type, id)
            }
            ResolutionError::TypeMismatch { expected, actual } => {
                write!(f, "Must receive a {} id, got {}", expected, actual)
            }
            ResolutionError::SchemaInconsistency {
                entity_type,
                scheme,
                message,
            } => {
                write!(
                    f,
                    "Schema inconsistency for {} under the {} scheme: {}",
                    entity_type, scheme, message
                )
            }
            ResolutionError::UnknownType { name } => {
                write!(f, "Unknown type: {}", name)
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

impl ResolutionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolutionError::InvalidIdentifierFormat { .. } => StatusCode::BAD_REQUEST,
            ResolutionError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResolutionError::TypeMismatch { .. } => StatusCode::BAD_REQUEST,
            ResolutionError::SchemaInconsistency { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ResolutionError::UnknownType { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ResolutionError::InvalidIdentifierFormat { .. } => "INVALID_IDENTIFIER_FORMAT",
            ResolutionError::NotFound { .. } => "NOT_FOUND",
            ResolutionError::TypeMismatch { .. } => "TYPE_MISMATCH",
            ResolutionError::SchemaInconsistency { .. } => "SCHEMA_INCONSISTENCY",
            ResolutionError::UnknownType { .. } => "UNKNOWN_TYPE",
        }
    }
}

impl From<ResolutionError> for IdError {
    fn from(err: ResolutionError) -> Self {
        IdError::Resolution(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to the row store and the mapping store
#[derive(Debug)]
pub enum StorageError {
    /// Connection error
    ConnectionError { backend: String, message: String },

    /// Query execution error
    QueryError { backend: String, message: String },

    /// Transaction error
    TransactionError { message: String },

    /// Data integrity error (e.g. a public id already used by another row)
    IntegrityError { message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionError { backend, message } => {
                write!(f, "Failed to connect to {}: {}", backend, message)
            }
            StorageError::QueryError { backend, message } => {
                write!(f, "{} query error: {}", backend, message)
            }
            StorageError::TransactionError { message } => {
                write!(f, "Transaction error: {}", message)
            }
            StorageError::IntegrityError { message } => {
                write!(f, "Data integrity error: {}", message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for IdError {
    fn from(err: StorageError) -> Self {
        IdError::Storage(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse configuration file
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Invalid value in configuration
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// Configuration file not found
    FileNotFound { path: String },

    /// IO error while reading configuration
    IoError { message: String },

    /// Two models registered under the same entity type or GraphQL type
    DuplicateModel { name: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::InvalidValue {
                field,
                value,
                message,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, message
                )
            }
            ConfigError::FileNotFound { path } => {
                write!(f, "Configuration file not found: {}", path)
            }
            ConfigError::IoError { message } => {
                write!(f, "IO error: {}", message)
            }
            ConfigError::DuplicateModel { name } => {
                write!(f, "Model '{}' is registered twice", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for IdError {
    fn from(err: ConfigError) -> Self {
        IdError::Config(err)
    }
}

// =============================================================================
// Backfill Errors
// =============================================================================

/// Errors raised by the backfill utility
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BackfillError {
    /// A batch failed to insert. Logged and collected; the job goes on.
    PartialBatchFailure {
        model: String,
        first_pk: i64,
        last_pk: i64,
        row_ids: Vec<i64>,
        message: String,
    },

    /// The model does not take part in the Public-ID scheme
    NotEligible { model: String },
}

impl fmt::Display for BackfillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackfillError::PartialBatchFailure {
                model,
                first_pk,
                last_pk,
                row_ids,
                message,
            } => {
                write!(
                    f,
                    "Backfill batch {}..={} of {} failed ({} rows): {}",
                    first_pk,
                    last_pk,
                    model,
                    row_ids.len(),
                    message
                )
            }
            BackfillError::NotEligible { model } => {
                write!(f, "Model {} is not eligible for public ids", model)
            }
        }
    }
}

impl std::error::Error for BackfillError {}

impl From<BackfillError> for IdError {
    fn from(err: BackfillError) -> Self {
        IdError::Backfill(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<std::io::Error> for IdError {
    fn from(err: std::io::Error) -> Self {
        IdError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for IdError {
    fn from(err: serde_yaml::Error) -> Self {
        IdError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

/// Store traits speak `anyhow`; typed errors raised inside a store survive
/// the round trip, anything else is a storage failure.
impl From<anyhow::Error> for IdError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<IdError>() {
            Ok(id_err) => id_err,
            Err(err) => IdError::Storage(StorageError::QueryError {
                backend: "store".to_string(),
                message: format!("{:#}", err),
            }),
        }
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for identifier operations
pub type IdResult<T> = Result<T, IdError>;
