//! Shapes of external identifiers
//!
//! Three shapes reach the resolvers, from GraphQL global ids and from REST
//! path segments alike:
//!
//! - a canonical lowercase UUIDv4 (Public-ID scheme)
//! - a bare decimal integer (Pk scheme, needs a type hint)
//! - a base64 `TypeName:pk` blob (legacy GraphQL global id)

use crate::core::error::{IdError, IdResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// An entity's identity as exposed outside the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalId {
    /// Raw numeric primary key
    Legacy(i64),
    /// Explicit, typed numeric primary key
    Pk(i64),
    /// Opaque public UUID from the mapping store
    PublicId(Uuid),
}

impl ExternalId {
    /// The numeric primary key, when the id carries one
    pub fn as_pk(&self) -> Option<i64> {
        match self {
            ExternalId::Legacy(pk) | ExternalId::Pk(pk) => Some(*pk),
            ExternalId::PublicId(_) => None,
        }
    }

    pub fn as_public_id(&self) -> Option<Uuid> {
        match self {
            ExternalId::PublicId(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalId::Legacy(pk) | ExternalId::Pk(pk) => write!(f, "{}", pk),
            ExternalId::PublicId(id) => write!(f, "{}", id.as_hyphenated()),
        }
    }
}

impl Serialize for ExternalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExternalId::Legacy(pk) | ExternalId::Pk(pk) => serializer.serialize_i64(*pk),
            ExternalId::PublicId(_) => serializer.collect_str(self),
        }
    }
}

fn uuid_v4_regex() -> &'static Regex {
    static UUID_V4: OnceLock<Regex> = OnceLock::new();
    UUID_V4.get_or_init(|| {
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
            .expect("UUID v4 pattern is valid")
    })
}

/// Whether `raw` is a canonical lowercase, hyphenated UUIDv4
pub fn is_canonical_uuid_v4(raw: &str) -> bool {
    uuid_v4_regex().is_match(raw)
}

/// Whether `raw` is a non-empty string of ASCII digits
pub fn is_numeric(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a public id. Any syntactically valid UUID is accepted here; the
/// canonical-form check only decides routing in the dispatchers.
pub fn parse_public_id(raw: &str) -> IdResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| IdError::invalid_format(raw, format!("not a valid UUID: {}", e)))
}

/// Parse a numeric primary key
pub fn parse_pk(raw: &str) -> IdResult<i64> {
    if !is_numeric(raw) {
        return Err(IdError::invalid_format(raw, "not a numeric primary key"));
    }
    raw.parse::<i64>()
        .map_err(|e| IdError::invalid_format(raw, format!("primary key out of range: {}", e)))
}

/// Encode a legacy global id: base64 of `TypeName:id`
pub fn encode_global_id(type_name: &str, id: &str) -> String {
    STANDARD.encode(format!("{}:{}", type_name, id))
}

/// Decode a legacy global id into `(type_name, id)`
pub fn decode_global_id(global_id: &str) -> IdResult<(String, String)> {
    let bytes = STANDARD
        .decode(global_id)
        .map_err(|e| IdError::invalid_format(global_id, format!("not a base64 global id: {}", e)))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| IdError::invalid_format(global_id, "global id is not valid UTF-8"))?;
    match decoded.split_once(':') {
        Some((type_name, id)) if !type_name.is_empty() && !id.is_empty() => {
            Ok((type_name.to_string(), id.to_string()))
        }
        _ => Err(IdError::invalid_format(
            global_id,
            "global id must decode to TypeName:id",
        )),
    }
}
