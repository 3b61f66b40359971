//! Integration tests for reforge-config

use reforge_config::*;
use std::io::Write;

fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_settings_from_json_file() {
    let file = write_temp(
        ".json",
        r#"{"project_env_id": 7, "namespace": "billing", "on_no_default": "ignore"}"#,
    );

    let settings = SettingsService::builder()
        .add_file(file.path().to_str().unwrap(), FileFormat::Json)
        .build()
        .unwrap()
        .into_settings();

    assert_eq!(settings.project_env_id, 7);
    assert_eq!(settings.namespace.as_deref(), Some("billing"));
    assert_eq!(settings.on_no_default, OnNoDefault::Ignore);
    assert_eq!(settings.logger_key.as_deref(), Some(DEFAULT_LOGGER_KEY));
}

#[test]
fn test_settings_from_toml_file() {
    let file = write_temp(
        ".toml",
        r#"
            project_env_id = 12
            logger_key = "log-levels.backend"
            default_log_level = "error"
        "#,
    );

    let path = file.path().to_str().unwrap();
    let loader = SettingsLoader::auto(path).unwrap();
    let manager = SettingsManager::new();
    manager.merge_value(loader.load_file(path).unwrap()).unwrap();

    let settings = manager.resolver_settings().unwrap();
    assert_eq!(settings.project_env_id, 12);
    assert_eq!(settings.logger_key.as_deref(), Some("log-levels.backend"));
    assert_eq!(settings.default_log_level, "ERROR");
}

#[test]
fn test_settings_from_env_prefix() {
    unsafe {
        std::env::set_var("REFORGEITEST_PROJECT_ENV_ID", "99");
        std::env::set_var("REFORGEITEST_ON_NO_DEFAULT", "warn");
    }

    let settings = SettingsService::builder()
        .with_prefix("REFORGEITEST")
        .load_env()
        .build()
        .unwrap()
        .into_settings();

    assert_eq!(settings.project_env_id, 99);
    assert_eq!(settings.on_no_default, OnNoDefault::Warn);

    unsafe {
        std::env::remove_var("REFORGEITEST_PROJECT_ENV_ID");
        std::env::remove_var("REFORGEITEST_ON_NO_DEFAULT");
    }
}

#[test]
fn test_env_layer_overrides_file() {
    let file = write_temp(".json", r#"{"namespace": "from-file"}"#);

    unsafe {
        std::env::set_var("REFORGELAYER_NAMESPACE", "from-env");
    }

    let settings = SettingsService::builder()
        .with_prefix("REFORGELAYER")
        .add_file(file.path().to_str().unwrap(), FileFormat::Json)
        .load_env()
        .build()
        .unwrap()
        .into_settings();

    assert_eq!(settings.namespace.as_deref(), Some("from-env"));

    unsafe {
        std::env::remove_var("REFORGELAYER_NAMESPACE");
    }
}

#[test]
fn test_env_loader_exact_lookup() {
    unsafe {
        std::env::set_var("reforge_mixed_Case_Var", "exact");
    }

    let loader = EnvLoader::new(Some(ENV_PREFIX.to_string()));
    assert_eq!(loader.lookup("reforge_mixed_Case_Var").as_deref(), Some("exact"));

    unsafe {
        std::env::remove_var("reforge_mixed_Case_Var");
    }
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::ValidationError("namespace cannot be empty".to_string());
    assert!(err.to_string().contains("namespace cannot be empty"));
}
