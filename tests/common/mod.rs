#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use pokedex_cache::catalog::{
    CatalogClient, FlavorTextEntry, ItemDetail, NamedResource, SpeciesDetail,
};
use pokedex_cache::config::CatalogConfig;
use pokedex_cache::domain::{Item, ItemId};
use pokedex_cache::error::PokedexError;
use pokedex_cache::store::Store;

#[derive(Default)]
pub struct Calls {
    pub list: Vec<(i64, i64)>,
    pub items: Vec<String>,
    pub species: Vec<ItemId>,
}

#[derive(Default)]
pub struct MockCatalog {
    pub names: Vec<String>,
    pub details: HashMap<String, ItemDetail>,
    pub species: HashMap<i64, SpeciesDetail>,
    pub failing_items: Vec<String>,
    pub list_error: Option<PokedexError>,
    pub species_error: Option<PokedexError>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Calls>,
}

impl MockCatalog {
    /// `types` is a comma-separated list, e.g. `"grass,poison"`.
    pub fn with_items(items: &[(i64, &str, &str)]) -> Self {
        let mut mock = Self::default();
        for (id, name, types) in items {
            let types: Vec<&str> = types.split(',').collect();
            mock.names.push(name.to_string());
            mock.details.insert(
                name.to_string(),
                ItemDetail::new(*id, name, &format!("https://img/{id}.png"), &types),
            );
        }
        mock
    }

    pub fn with_species(mut self, id: i64, species: SpeciesDetail) -> Self {
        self.species.insert(id, species);
        self
    }

    pub fn list_calls(&self) -> Vec<(i64, i64)> {
        self.calls.lock().unwrap().list.clone()
    }

    pub fn item_calls(&self) -> usize {
        self.calls.lock().unwrap().items.len()
    }

    pub fn species_calls(&self) -> usize {
        self.calls.lock().unwrap().species.len()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl CatalogClient for MockCatalog {
    async fn list_items(&self, offset: i64, limit: i64) -> Result<Vec<String>, PokedexError> {
        self.calls.lock().unwrap().list.push((offset, limit));
        self.pause().await;
        if let Some(err) = &self.list_error {
            return Err(err.clone());
        }
        Ok(self
            .names
            .iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn fetch_item(&self, name: &str) -> Result<ItemDetail, PokedexError> {
        self.calls.lock().unwrap().items.push(name.to_string());
        self.pause().await;
        if self.failing_items.iter().any(|failing| failing == name) {
            return Err(PokedexError::CatalogStatus {
                status: 500,
                message: format!("{name} unavailable"),
            });
        }
        self.details.get(name).cloned().ok_or(PokedexError::CatalogStatus {
            status: 404,
            message: name.to_string(),
        })
    }

    async fn fetch_species(&self, id: ItemId) -> Result<SpeciesDetail, PokedexError> {
        self.calls.lock().unwrap().species.push(id);
        self.pause().await;
        if let Some(err) = &self.species_error {
            return Err(err.clone());
        }
        Ok(self.species.get(&id.get()).cloned().unwrap_or_default())
    }
}

pub fn species(evolves_from: Option<&str>, entries: &[(&str, &str)]) -> SpeciesDetail {
    SpeciesDetail {
        evolves_from_species: evolves_from.map(NamedResource::new),
        flavor_text_entries: entries
            .iter()
            .map(|(version, text)| FlavorTextEntry {
                flavor_text: text.to_string(),
                version: NamedResource::new(*version),
            })
            .collect(),
    }
}

pub fn config(catalog_size: i64) -> CatalogConfig {
    CatalogConfig {
        catalog_size,
        ..CatalogConfig::default()
    }
}

pub fn seed_item(store: &Store, id: i64, name: &str, types: &[&str]) {
    let item = Item {
        id: ItemId(id),
        name: name.to_string(),
        image: format!("https://img/{id}.png"),
    };
    let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    store.insert_item_with_types(&item, &types).unwrap();
}
