use std::path::PathBuf;

use cellql::config::CellqlConfig;
use cellql::dialect::{dialect_for, DialectKind};
use cellql::Validator;

fn demo_config() -> CellqlConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demo/cellql.toml");
    CellqlConfig::from_file(path).unwrap()
}

#[test]
fn datasources_override_global_defaults() {
    let config = demo_config();

    let fallback = config.for_datasource("unlisted");
    assert_eq!(fallback.dialect, DialectKind::Postgres);
    assert_eq!(fallback.compiler.lookup.max_depth, 8);
    assert!(fallback.compiler.sort.concurrent);

    let reporting = config.for_datasource("reporting");
    assert_eq!(reporting.dialect, DialectKind::MsSql);
    assert_eq!(dialect_for(reporting.dialect).quote_ident("x"), "[x]");
    assert_eq!(reporting.compiler.lookup.max_depth, 8);

    // a datasource compiler table replaces the global one wholesale
    let warehouse = config.for_datasource("warehouse");
    assert_eq!(warehouse.dialect, DialectKind::DuckDb);
    assert!(!warehouse.compiler.aggregation.median_skip_nulls);
    assert_eq!(warehouse.compiler.lookup.max_depth, 16);
}

#[test]
fn validator_follows_datasource_config() {
    let config = demo_config();
    let validator = Validator::from_config(&config.for_datasource("reporting"));
    let registry = cellql::registry::MetadataRegistry::load_from_dir(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demo"),
    )
    .unwrap();
    validator.validate_registry(&registry).unwrap();
}

#[test]
fn unreadable_config_is_a_config_error() {
    let err = CellqlConfig::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, cellql::CellqlError::Config(_)));
    let err = CellqlConfig::from_toml("[defaults]\ndialect = \"oracle\"").unwrap_err();
    assert!(err.to_string().contains("failed to parse config"));
}
