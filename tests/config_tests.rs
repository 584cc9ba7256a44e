//! Configuration loading from files and the environment

use baseapp_ids::core::error::ConfigError;
use baseapp_ids::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"
enable_public_id_logic: false
backfill:
  batch_size: 250
  dry_run: true
models:
  - app_label: Catalog
    model_name: Widget
    plural: widgets
    graphql_type: Widget
    db_table: widgets
    schemes: [public_id]
"#,
    );

    let config = IdsConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.backfill.batch_size, 250);
    assert!(config.backfill.dry_run);

    let registry = config.build_registry().unwrap();
    let widget = registry.get("catalog.widget").unwrap();
    assert_eq!(widget.db_table(), "widgets");
    assert_eq!(widget.plural(), "widgets");
    assert!(widget.tracks_public_ids());
    assert!(registry.by_app_model("Catalog", "Widget").is_some());
}

#[test]
fn test_malformed_file_reports_path() {
    let file = write_config("models: [ {");
    let path = file.path().to_str().unwrap().to_string();

    let err = IdsConfig::from_yaml_file(&path).unwrap_err();
    match err {
        IdError::Config(ConfigError::ParseError { file, .. }) => assert_eq!(file, Some(path)),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_duplicate_models_rejected() {
    let config = IdsConfig::from_yaml_str(
        r#"
models:
  - app_label: catalog
    model_name: widget
  - app_label: catalog
    model_name: widget
"#,
    )
    .unwrap();
    assert!(matches!(
        config.build_registry(),
        Err(IdError::Config(ConfigError::DuplicateModel { .. }))
    ));
}

#[test]
fn test_flag_override_and_runtime_toggle() {
    let config = IdsConfig::default()
        .with_overrides(|key| (key == ENABLE_PUBLIC_ID_LOGIC).then(|| "1".to_string()))
        .unwrap();
    let flags = config.runtime_flags();
    assert!(flags.public_id_enabled());

    let shared = flags.clone();
    shared.set_public_id(false);
    assert!(!flags.public_id_enabled());
}

#[test]
fn test_unknown_scheme_is_a_parse_error() {
    let result = IdsConfig::from_yaml_str(
        r#"
models:
  - app_label: catalog
    model_name: widget
    schemes: [hashid]
"#,
    );
    assert!(matches!(
        result,
        Err(IdError::Config(ConfigError::ParseError { .. }))
    ));
}
