//! File-backed configuration and secrets loading.

use std::fs;
use std::time::Duration;

use footprint::config::{ApiKeySource, Config, Secrets};
use footprint::{Gateway, GatewayBuilder};

#[test]
fn load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
            [gemini]
            api_key_env = "FOOTPRINT_KEY"

            [queue]
            min_gap_ms = 1000
        "#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.gemini.api_key_env, "FOOTPRINT_KEY");
    assert_eq!(config.queue.min_gap_ms, 1000);
    assert_eq!(config.cache.ttl_secs, 4 * 3600);
}

#[test]
fn malformed_config_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[queue\nmin_gap_ms = ").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();

    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn gateway_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
            [gemini]
            endpoint = "http://localhost:9999/generate"

            [queue]
            max_concurrent = 3
            min_gap_ms = 50
        "#,
    )
    .unwrap();
    let config = Config::load(Some(&path)).unwrap();

    let gateway: Gateway = GatewayBuilder::from_config(&config).build().unwrap();

    assert_eq!(gateway.endpoint(), "http://localhost:9999/generate");
    assert_eq!(gateway.queue().max_concurrent(), 3);
    assert_eq!(gateway.queue().min_gap(), Duration::from_millis(50));
}

#[cfg(unix)]
#[test]
fn secrets_with_private_permissions_load() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.toml");
    fs::write(&path, "[gemini]\napi_key = \"from-file\"\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

    let secrets = Secrets::load_from_file(&path).unwrap();

    assert_eq!(
        secrets.api_key_source("GEMINI_API_KEY"),
        ApiKeySource::Static("from-file".into())
    );
}

#[cfg(unix)]
#[test]
fn secrets_readable_by_others_are_rejected() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.toml");
    fs::write(&path, "[gemini]\napi_key = \"leaky\"\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    let err = Secrets::load_from_file(&path).unwrap_err();

    assert!(err.to_string().contains("insecure permissions"));
}
