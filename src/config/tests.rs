use super::*;
use tempfile::TempDir;

#[test]
fn defaults_when_config_file_missing() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let config = Config::load(temp_dir.path()).expect("Failed to load config");

    assert_eq!(config.data_dir, temp_dir.path());
    assert!(config.embedder_enabled);
    assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    assert_eq!(config.fts_candidate_cap, DEFAULT_FTS_CANDIDATE_CAP);
    assert!((config.hybrid_alpha - DEFAULT_HYBRID_ALPHA).abs() < f64::EPSILON);
    assert!(!config.strict_ingest);
}

#[test]
fn save_and_load_roundtrip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        embedder_enabled: false,
        cache_capacity: 64,
        fts_candidate_cap: 10,
        hybrid_alpha: 0.5,
        hybrid_threshold: 0.3,
        strict_ingest: true,
    };
    config.save().expect("Failed to save config");

    let loaded = Config::load(temp_dir.path()).expect("Failed to load config");
    assert_eq!(loaded, config);
}

#[test]
fn partial_config_file_takes_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "embedder_enabled = false\n",
    )
    .expect("Failed to write config");

    let config = Config::load(temp_dir.path()).expect("Failed to load config");

    assert!(!config.embedder_enabled);
    assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
}

#[test]
fn rejects_out_of_range_alpha() {
    let config = Config {
        hybrid_alpha: 1.5,
        ..Config::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidHybridAlpha(_))
    ));
}

#[test]
fn rejects_zero_cache_capacity() {
    let config = Config {
        cache_capacity: 0,
        ..Config::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidCacheCapacity(0))
    ));
}

#[test]
fn rejects_excessive_candidate_cap() {
    let config = Config {
        fts_candidate_cap: 1000,
        ..Config::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidFtsCandidateCap(1000))
    ));
}

#[test]
fn invalid_config_file_fails_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    std::fs::write(temp_dir.path().join("config.toml"), "hybrid_alpha = 7.0\n")
        .expect("Failed to write config");

    assert!(Config::load(temp_dir.path()).is_err());
}
