#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;

use infinimesh_config::{
    Config, ConfigError, Profile, load_config_from, profile_to_sync_config, resolve_token,
    save_config_to,
};
use infinimesh_core::TlsVerification;

const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
output = "json"
timeout = 12

[profiles.lab]
endpoint = "https://api.lab.example.com"
token = "plain-token"
namespace = "infinimesh"

[profiles.prod]
endpoint = "https://api.example.com"
ca_cert = "/etc/infinimesh/ca.pem"
timeout = 60
"#;

fn write_sample(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    path
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(cfg.default_profile.as_deref(), Some("default"));
    assert_eq!(cfg.defaults.output, "table");
    assert_eq!(cfg.defaults.timeout, 30);
    assert!(cfg.profiles.is_empty());
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&write_sample(&dir)).unwrap();

    assert_eq!(cfg.profile_name(None), "lab");
    assert_eq!(cfg.defaults.output, "json");
    assert_eq!(cfg.defaults.color, "auto");
    assert_eq!(cfg.defaults.timeout, 12);

    let lab = cfg.profile("lab").unwrap();
    assert_eq!(lab.endpoint, "https://api.lab.example.com");
    assert_eq!(lab.namespace.as_deref(), Some("infinimesh"));
    assert!(matches!(
        cfg.profile("staging"),
        Err(ConfigError::UnknownProfile { .. })
    ));
}

#[test]
fn profile_translates_to_sync_config() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&write_sample(&dir)).unwrap();

    let lab = profile_to_sync_config(cfg.profile("lab").unwrap(), "lab", &cfg.defaults).unwrap();
    assert_eq!(lab.url.as_str(), "https://api.lab.example.com/");
    assert_eq!(lab.tls, TlsVerification::SystemDefaults);
    assert_eq!(lab.timeout, Duration::from_secs(12));
    assert_eq!(lab.account_token.expose_secret(), "plain-token");
}

#[test]
fn profile_without_any_token_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&write_sample(&dir)).unwrap();

    let err = profile_to_sync_config(
        cfg.profile("prod").unwrap(),
        "infinimesh-config-test-prod",
        &cfg.defaults,
    )
    .unwrap_err();
    assert!(
        matches!(err, ConfigError::NoCredentials { ref profile } if profile == "infinimesh-config-test-prod")
    );
}

#[test]
fn unset_token_env_falls_through_to_plaintext() {
    let profile = Profile {
        endpoint: "https://gw".into(),
        token: Some("fallback".into()),
        token_env: Some("INFINIMESH_CONFIG_TEST_UNSET_VARIABLE".into()),
        ..Profile::default()
    };

    let token = resolve_token(&profile, "infinimesh-config-test-fallback").unwrap();
    assert_eq!(token.expose_secret(), "fallback");
}

#[test]
fn saved_config_round_trips_through_loader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::default();
    cfg.default_profile = Some("edge".into());
    cfg.profiles.insert(
        "edge".into(),
        Profile {
            endpoint: "http://localhost:8000".into(),
            insecure: Some(true),
            ..Profile::default()
        },
    );
    save_config_to(&cfg, &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[profiles.edge]"));
    assert!(!written.contains("token"));

    let loaded = load_config_from(&path).unwrap();
    let edge = loaded.profile("edge").unwrap();
    assert_eq!(edge.insecure, Some(true));
    assert_eq!(
        infinimesh_config::profile_tls(edge, &loaded.defaults),
        TlsVerification::DangerAcceptInvalid
    );
}
