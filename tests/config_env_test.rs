//! Environment-variable configuration loading. Serialized because the
//! process environment is shared across the test runner's threads.

use serial_test::serial;

use discourse_digest::config::{Config, ConfigError};

fn clear_env() {
    for name in [
        "SITE_URL",
        "LATEST_LIMIT",
        "FETCH_CONCURRENCY",
        "HUMANIZE",
        "EXCLUDE_CATEGORIES",
        "AI_API_KEY",
        "SCROLL_ENABLED",
    ] {
        std::env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_from_env_requires_site_url() {
    clear_env();
    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "SITE_URL"));
}

#[test]
#[serial]
fn test_from_env_applies_defaults_and_overrides() {
    clear_env();
    std::env::set_var("SITE_URL", "https://forum.example.com/");
    std::env::set_var("LATEST_LIMIT", "7");
    std::env::set_var("EXCLUDE_CATEGORIES", "Meta, Lounge");
    std::env::set_var("SCROLL_ENABLED", "true");

    let config = Config::from_env().expect("config should load");
    // Trailing slash is normalized away.
    assert_eq!(config.site_url, "https://forum.example.com");
    assert_eq!(config.latest_limit, 7);
    assert_eq!(config.hot_limit, 10); // default
    assert_eq!(
        config.exclude_categories,
        vec!["Meta".to_string(), "Lounge".to_string()]
    );
    assert!(config.scroll_enabled);
    assert!(config.validate().is_ok());
    clear_env();
}

#[test]
#[serial]
fn test_from_env_rejects_bad_boolean() {
    clear_env();
    std::env::set_var("SITE_URL", "https://forum.example.com");
    std::env::set_var("HUMANIZE", "maybe");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::ParseBool { name, .. } if name == "HUMANIZE"));
    clear_env();
}
