use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum PokedexError {
    #[error("catalog host unreachable: {0}")]
    #[diagnostic(help("check the network connection and the --base-url value"))]
    Connection(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("failed to decode catalog response: {0}")]
    CatalogDecode(String),

    #[error("cache storage error: {0}")]
    Storage(String),

    #[error("item not cached locally: {0}")]
    NotCached(i64),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PokedexError {
    /// Connectivity failures get a friendlier message at the UI boundary.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PokedexError::Connection(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            PokedexError::Connection(err.to_string())
        } else if err.is_decode() {
            PokedexError::CatalogDecode(err.to_string())
        } else {
            PokedexError::CatalogHttp(err.to_string())
        }
    }
}

pub(crate) fn storage(err: rusqlite::Error) -> PokedexError {
    PokedexError::Storage(err.to_string())
}
