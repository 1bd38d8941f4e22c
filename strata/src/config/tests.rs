use crate::config::{
    ConfigBuilder, ConfigFormat, ConfigLoader, DecayConfig, LogLevel, StrataConfig, validation,
};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = StrataConfig::default();
    assert_eq!(config.search.bm25.k1, 1.2);
    assert_eq!(config.search.bm25.b, 0.75);
    assert_eq!(config.episodic.gap_window, Duration::from_secs(1800));
    assert_eq!(config.maintenance.cleanup_threshold, 0.2);
    assert_eq!(config.logging.level, LogLevel::Info);
    assert!(config.storage.max_records_per_tenant.is_none());
    assert!(validation::validate_config(&config).is_ok());
}

#[test]
fn test_config_builder() {
    let config = ConfigBuilder::new()
        .with_bm25(1.5, 0.6)
        .with_ranker_weights(0.7, 0.3)
        .with_episode_gap(Duration::from_secs(600))
        .with_cleanup_threshold(0.15)
        .with_max_records_per_tenant(1_000)
        .with_log_level(LogLevel::Debug)
        .build()
        .unwrap();

    assert_eq!(config.search.bm25.k1, 1.5);
    assert_eq!(config.search.ranker.bm25_weight, 0.7);
    assert_eq!(config.episodic.gap_window, Duration::from_secs(600));
    assert_eq!(config.maintenance.cleanup_threshold, 0.15);
    assert_eq!(config.storage.max_records_per_tenant, Some(1_000));
    assert_eq!(config.logging.level, LogLevel::Debug);
}

#[test]
fn test_validation_rejects_bad_values() {
    assert!(ConfigBuilder::new().with_bm25(1.2, 1.5).build().is_err());
    assert!(ConfigBuilder::new().with_ranker_weights(0.0, 0.0).build().is_err());
    assert!(ConfigBuilder::new().with_ranker_weights(-1.0, 1.0).build().is_err());
    assert!(ConfigBuilder::new().with_episode_gap(Duration::ZERO).build().is_err());
    assert!(ConfigBuilder::new().with_cleanup_threshold(1.2).build().is_err());
    assert!(ConfigBuilder::new().with_batch_size(0).build().is_err());
    assert!(ConfigBuilder::new().with_max_records_per_tenant(0).build().is_err());

    let decay = DecayConfig {
        episodic_rate: -0.1,
        ..Default::default()
    };
    assert!(ConfigBuilder::new().with_decay(decay).build().is_err());
}

#[test]
fn test_load_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strata.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
[search.bm25]
k1 = 2.0

[episodic]
gap_window = "45m"

[maintenance]
cleanup_threshold = 0.3

[logging]
level = "warn"
"#
    )
    .unwrap();

    let config = ConfigLoader::new()
        .load_file(&path)
        .unwrap()
        .extract()
        .unwrap();

    assert_eq!(config.search.bm25.k1, 2.0);
    // Untouched values keep their defaults
    assert_eq!(config.search.bm25.b, 0.75);
    assert_eq!(config.episodic.gap_window, Duration::from_secs(45 * 60));
    assert_eq!(config.maintenance.cleanup_threshold, 0.3);
    assert_eq!(config.logging.level, LogLevel::Warn);
}

#[test]
fn test_load_invalid_file_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strata.json");
    std::fs::write(&path, r#"{ "search": { "bm25": { "b": 3.0 } } }"#).unwrap();

    let mut loader = ConfigLoader::new();
    loader.load_file(&path).unwrap();
    assert!(loader.extract().is_err());
}

#[test]
fn test_missing_and_unsupported_files() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ConfigLoader::new().load_file(dir.path().join("nope.toml")).is_err());

    let ini = dir.path().join("strata.ini");
    std::fs::write(&ini, "k1=2").unwrap();
    assert!(ConfigLoader::new().load_file(&ini).is_err());
}

#[test]
fn test_project_file_discovery_order() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(ConfigLoader::project_config_file(dir.path()), None);

    std::fs::create_dir(dir.path().join(".strata")).unwrap();
    let nested = dir.path().join(".strata/config.yaml");
    std::fs::write(&nested, "search:\n  default_limit: 7\n").unwrap();
    assert_eq!(ConfigLoader::project_config_file(dir.path()), Some(nested));

    // a top-level strata file wins over .strata/
    let top = dir.path().join("strata.json");
    std::fs::write(&top, r#"{ "search": { "default_limit": 4 } }"#).unwrap();
    assert_eq!(ConfigLoader::project_config_file(dir.path()), Some(top.clone()));

    let mut loader = ConfigLoader::new();
    loader.load_files_from(dir.path()).unwrap();
    assert_eq!(loader.loaded_files().last(), Some(&top));
    assert_eq!(loader.extract().unwrap().search.default_limit, 4);
}

#[test]
fn test_later_layers_override_earlier_ones() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.toml");
    std::fs::write(&base, "[search]\ndefault_limit = 3\n\n[logging]\nlevel = \"warn\"\n").unwrap();
    let overlay = dir.path().join("overlay.yml");
    std::fs::write(&overlay, "search:\n  default_limit: 9\n").unwrap();

    let mut loader = ConfigLoader::new();
    loader.load_file(&base).unwrap().load_file(&overlay).unwrap();
    let config = loader.extract().unwrap();
    assert_eq!(config.search.default_limit, 9);
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(loader.loaded_files(), [base, overlay]);
}

#[test]
fn test_format_from_extension() {
    use std::path::Path;
    assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), Some(ConfigFormat::Toml));
    assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), Some(ConfigFormat::Yaml));
    assert_eq!(ConfigFormat::from_path(Path::new("a.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("a.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("strata")), None);
}
