//! News API key resolution: ENV → TOML

use envo_ov::config::{resolve_news_api_key, ProvidersConfig, NEWS_API_KEY_ENV};
use serial_test::serial;

fn toml_key(key: Option<&str>) -> ProvidersConfig {
    ProvidersConfig {
        news_api_key: key.map(str::to_string),
        ..ProvidersConfig::default()
    }
}

#[test]
#[serial(news_key_env)]
fn test_env_key_wins_over_toml() {
    std::env::set_var(NEWS_API_KEY_ENV, "env-key");
    let resolved = resolve_news_api_key(&toml_key(Some("toml-key")));
    std::env::remove_var(NEWS_API_KEY_ENV);

    assert_eq!(resolved.as_deref(), Some("env-key"));
}

#[test]
#[serial(news_key_env)]
fn test_toml_key_used_when_env_unset() {
    std::env::remove_var(NEWS_API_KEY_ENV);
    let resolved = resolve_news_api_key(&toml_key(Some("toml-key")));
    assert_eq!(resolved.as_deref(), Some("toml-key"));
}

#[test]
#[serial(news_key_env)]
fn test_blank_keys_are_ignored() {
    std::env::set_var(NEWS_API_KEY_ENV, "   ");
    let resolved = resolve_news_api_key(&toml_key(Some("")));
    std::env::remove_var(NEWS_API_KEY_ENV);

    assert!(resolved.is_none());
}

#[test]
#[serial(news_key_env)]
fn test_no_key_anywhere() {
    std::env::remove_var(NEWS_API_KEY_ENV);
    assert!(resolve_news_api_key(&toml_key(None)).is_none());
}
