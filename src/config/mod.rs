//! Configuration loading and management

pub mod flags;

pub use flags::{ENABLE_PUBLIC_ID_LOGIC, FeatureFlags, RuntimeFlags, StaticFlags};

use crate::core::error::{ConfigError, IdError, IdResult};
use crate::core::model::{Eligibility, GraphQLType, ModelDescriptor, ModelRegistry, PkKind};
use serde::{Deserialize, Serialize};

/// Configuration for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub app_label: String,
    pub model_name: String,

    /// Plural used in REST paths (defaults to `{model_name}s`)
    #[serde(default)]
    pub plural: Option<String>,

    /// GraphQL type name, if the model is exposed over GraphQL
    #[serde(default)]
    pub graphql_type: Option<String>,

    /// Interfaces the GraphQL type implements (defaults to `["Node"]`)
    #[serde(default)]
    pub interfaces: Option<Vec<String>>,

    #[serde(default)]
    pub pk: PkKind,

    /// Identifier schemes the model declares itself eligible for
    #[serde(default)]
    pub schemes: Vec<Eligibility>,

    /// Database table (defaults to `{app_label}_{model_name}`)
    #[serde(default)]
    pub db_table: Option<String>,
}

impl ModelConfig {
    pub fn to_descriptor(&self) -> ModelDescriptor {
        let mut descriptor =
            ModelDescriptor::new(&self.app_label, &self.model_name).with_pk_kind(self.pk);
        for scheme in &self.schemes {
            descriptor = descriptor.with_eligibility(*scheme);
        }
        if let Some(plural) = &self.plural {
            descriptor = descriptor.with_plural(plural);
        }
        if let Some(table) = &self.db_table {
            descriptor = descriptor.with_db_table(table);
        }
        if let Some(name) = &self.graphql_type {
            let graphql = match &self.interfaces {
                Some(interfaces) => GraphQLType {
                    name: name.clone(),
                    interfaces: interfaces.clone(),
                },
                None => GraphQLType::node(name),
            };
            descriptor = descriptor.with_graphql_type(graphql);
        }
        descriptor
    }
}

/// Backfill defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub dry_run: bool,
}

fn default_batch_size() -> usize {
    1000
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            dry_run: false,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdsConfig {
    /// Initial value of the `ENABLE_PUBLIC_ID_LOGIC` flag
    #[serde(default)]
    pub enable_public_id_logic: bool,

    #[serde(default)]
    pub backfill: BackfillConfig,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl IdsConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> IdResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.to_string(),
                }
            } else {
                ConfigError::IoError {
                    message: e.to_string(),
                }
            }
        })?;
        serde_yaml::from_str::<Self>(&content)
            .map_err(|e| {
                IdError::from(ConfigError::ParseError {
                    file: Some(path.to_string()),
                    message: e.to_string(),
                })
            })
            .and_then(Self::validated)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> IdResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validated()
    }

    /// Apply `ENABLE_PUBLIC_ID_LOGIC` from the environment, if set
    pub fn with_env_overrides(self) -> IdResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source
    pub fn with_overrides<F>(mut self, lookup: F) -> IdResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENABLE_PUBLIC_ID_LOGIC) {
            self.enable_public_id_logic =
                flags::parse_flag_value(&raw).ok_or_else(|| ConfigError::InvalidValue {
                    field: ENABLE_PUBLIC_ID_LOGIC.to_string(),
                    value: raw.clone(),
                    message: "expected a boolean".to_string(),
                })?;
        }
        Ok(self)
    }

    fn validated(self) -> IdResult<Self> {
        if self.backfill.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backfill.batch_size".to_string(),
                value: "0".to_string(),
                message: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(self)
    }

    /// Register every configured model
    pub fn build_registry(&self) -> IdResult<ModelRegistry> {
        let mut registry = ModelRegistry::new();
        for model in &self.models {
            registry.register(model.to_descriptor())?;
        }
        Ok(registry)
    }

    /// Runtime flags seeded from this configuration
    pub fn runtime_flags(&self) -> RuntimeFlags {
        RuntimeFlags::new(self.enable_public_id_logic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
enable_public_id_logic: true
backfill:
  batch_size: 500
models:
  - app_label: catalog
    model_name: widget
    graphql_type: Widget
    schemes: [public_id]
  - app_label: catalog
    model_name: gadget
    graphql_type: Gadget
    pk: explicit
    schemes: [pk]
  - app_label: legacy
    model_name: thing
    graphql_type: Thing
    interfaces: []
"#;

    #[test]
    fn test_yaml_parsing() {
        let config = IdsConfig::from_yaml_str(YAML).unwrap();
        assert!(config.enable_public_id_logic);
        assert_eq!(config.backfill.batch_size, 500);
        assert!(!config.backfill.dry_run);
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.models[1].pk, PkKind::Explicit);
    }

    #[test]
    fn test_build_registry() {
        let registry = IdsConfig::from_yaml_str(YAML)
            .unwrap()
            .build_registry()
            .unwrap();
        let widget = registry.by_graphql_type("Widget").unwrap();
        assert!(widget.tracks_public_ids());
        assert!(widget.graphql().unwrap().implements_node());

        let thing = registry.get("legacy.thing").unwrap();
        assert!(!thing.graphql().unwrap().implements_node());
        assert!(registry.get("catalog.gadget").unwrap().is_pk_eligible());
    }

    #[test]
    fn test_defaults() {
        let config = IdsConfig::from_yaml_str("{}").unwrap();
        assert!(!config.enable_public_id_logic);
        assert_eq!(config.backfill.batch_size, 1000);
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = IdsConfig::from_yaml_str("backfill:\n  batch_size: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() {
        let config = IdsConfig::default()
            .with_overrides(|key| (key == ENABLE_PUBLIC_ID_LOGIC).then(|| "yes".to_string()))
            .unwrap();
        assert!(config.enable_public_id_logic);
        assert!(config.runtime_flags().public_id_enabled());

        let invalid = IdsConfig::default().with_overrides(|_| Some("perhaps".to_string()));
        assert!(invalid.is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = IdsConfig::from_yaml_file("/nonexistent/ids.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
