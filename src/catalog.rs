use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::config::CatalogConfig;
use crate::domain::ItemId;
use crate::error::PokedexError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NamedResource {
    #[serde(default)]
    pub name: String,
}

impl NamedResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPage {
    #[serde(default)]
    pub results: Vec<NamedResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemDetail {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sprites: Sprites,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Sprites {
    #[serde(default)]
    pub other: OtherSprites,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OtherSprites {
    #[serde(default, rename = "official-artwork")]
    pub official_artwork: Artwork,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Artwork {
    #[serde(default)]
    pub front_default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeSlot {
    #[serde(default, rename = "type")]
    pub kind: NamedResource,
}

impl ItemDetail {
    pub fn new(id: i64, name: &str, image: &str, types: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            sprites: Sprites {
                other: OtherSprites {
                    official_artwork: Artwork {
                        front_default: Some(image.to_string()),
                    },
                },
            },
            types: types
                .iter()
                .map(|name| TypeSlot {
                    kind: NamedResource::new(*name),
                })
                .collect(),
        }
    }

    pub fn image(&self) -> &str {
        self.sprites
            .other
            .official_artwork
            .front_default
            .as_deref()
            .unwrap_or_default()
    }

    /// Type names in listing order, without duplicates or blanks.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.types.len());
        for slot in &self.types {
            let name = slot.kind.name.trim();
            if !name.is_empty() && !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SpeciesDetail {
    #[serde(default)]
    pub evolves_from_species: Option<NamedResource>,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlavorTextEntry {
    #[serde(default)]
    pub flavor_text: String,
    #[serde(default)]
    pub version: NamedResource,
}

impl SpeciesDetail {
    /// First description tagged with `version`; empty when none matches.
    pub fn description_for(&self, version: &str) -> String {
        self.flavor_text_entries
            .iter()
            .find(|entry| entry.version.name == version)
            .map(|entry| entry.flavor_text.clone())
            .unwrap_or_default()
    }

    pub fn evolves_from_name(&self) -> Option<&str> {
        self.evolves_from_species
            .as_ref()
            .map(|from| from.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Read-only view of the remote catalog.
pub trait CatalogClient: Send + Sync {
    fn list_items(
        &self,
        offset: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<String>, PokedexError>> + Send;

    fn fetch_item(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<ItemDetail, PokedexError>> + Send;

    fn fetch_species(
        &self,
        id: ItemId,
    ) -> impl Future<Output = Result<SpeciesDetail, PokedexError>> + Send;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    base_url: String,
}

impl CatalogHttpClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, PokedexError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pokedex-cache/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PokedexError::Config(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| PokedexError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn list_url(&self, offset: i64, limit: i64) -> String {
        format!("{}/pokemon?offset={offset}&limit={limit}", self.base_url)
    }

    pub fn item_url(&self, name: &str) -> String {
        format!("{}/pokemon/{name}", self.base_url)
    }

    pub fn species_url(&self, id: ItemId) -> String {
        format!("{}/pokemon-species/{id}", self.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, PokedexError> {
        debug!(%url, "catalog request");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(PokedexError::from_reqwest)?;
        let response = Self::handle_status(response).await?;
        response.json().await.map_err(PokedexError::from_reqwest)
    }

    async fn handle_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PokedexError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(PokedexError::CatalogStatus { status, message })
    }
}

impl CatalogClient for CatalogHttpClient {
    async fn list_items(&self, offset: i64, limit: i64) -> Result<Vec<String>, PokedexError> {
        let page: ItemPage = self.get_json(&self.list_url(offset, limit)).await?;
        Ok(page
            .results
            .into_iter()
            .map(|entry| entry.name)
            .filter(|name| !name.is_empty())
            .collect())
    }

    async fn fetch_item(&self, name: &str) -> Result<ItemDetail, PokedexError> {
        self.get_json(&self.item_url(name)).await
    }

    async fn fetch_species(&self, id: ItemId) -> Result<SpeciesDetail, PokedexError> {
        self.get_json(&self.species_url(id)).await
    }
}
