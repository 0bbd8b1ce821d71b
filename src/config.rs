use serde::{Deserialize, Serialize};

use crate::error::PokedexError;

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";
pub const DEFAULT_CATALOG_SIZE: i64 = 151;
pub const DEFAULT_PREFERRED_VERSION: &str = "red";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Knobs for the catalog client and the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_catalog_size")]
    pub catalog_size: i64,
    #[serde(default = "default_preferred_version")]
    pub preferred_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            catalog_size: default_catalog_size(),
            preferred_version: default_preferred_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    pub fn validate(self) -> Result<Self, PokedexError> {
        if self.catalog_size <= 0 {
            return Err(PokedexError::Config(format!(
                "catalog size must be positive, got {}",
                self.catalog_size
            )));
        }
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(PokedexError::Config(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(PokedexError::Config("timeout must be non-zero".to_string()));
        }
        Ok(Self { base_url, ..self })
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_catalog_size() -> i64 {
    DEFAULT_CATALOG_SIZE
}

fn default_preferred_version() -> String {
    DEFAULT_PREFERRED_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
