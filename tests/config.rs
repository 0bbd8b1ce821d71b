use assert_matches::assert_matches;

use pokedex_cache::config::{CatalogConfig, DEFAULT_BASE_URL, DEFAULT_CATALOG_SIZE};
use pokedex_cache::error::PokedexError;

#[test]
fn defaults_target_first_generation() {
    let config = CatalogConfig::default().validate().unwrap();
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.catalog_size, DEFAULT_CATALOG_SIZE);
    assert_eq!(config.preferred_version, "red");
    assert_eq!(config.timeout_secs, 30);
}

#[test]
fn trailing_slash_is_trimmed() {
    let config = CatalogConfig {
        base_url: "http://localhost:8080/api/v2/".to_string(),
        ..CatalogConfig::default()
    }
    .validate()
    .unwrap();
    assert_eq!(config.base_url, "http://localhost:8080/api/v2");
}

#[test]
fn non_http_base_url_is_rejected() {
    let err = CatalogConfig {
        base_url: "ftp://pokeapi.co".to_string(),
        ..CatalogConfig::default()
    }
    .validate()
    .unwrap_err();
    assert_matches!(err, PokedexError::Config(_));
}

#[test]
fn catalog_size_must_be_positive() {
    let err = CatalogConfig {
        catalog_size: 0,
        ..CatalogConfig::default()
    }
    .validate()
    .unwrap_err();
    assert_matches!(err, PokedexError::Config(message) if message.contains("catalog size"));
}

#[test]
fn zero_timeout_is_rejected() {
    let err = CatalogConfig {
        timeout_secs: 0,
        ..CatalogConfig::default()
    }
    .validate()
    .unwrap_err();
    assert_matches!(err, PokedexError::Config(_));
}
