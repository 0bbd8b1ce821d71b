//! Display-ready views over the cache plus the intents the UI can fire.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::warn;

use crate::catalog::CatalogClient;
use crate::domain::{
    CapturedItem, Item, ItemId, ItemWithTypes, PocketId, SpeciesWithEvolvesFrom, TypeWithItems,
};
use crate::error::PokedexError;
use crate::event::EventChannel;
use crate::live::Subscription;
use crate::sync::{SyncReport, Synchronizer};

pub const CONNECTION_FAILED: &str = "Connection Failed";
pub const CAPTURE_FAILED: &str = "capture pokemon failed";
pub const RELEASE_FAILED: &str = "release pokemon failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionView {
    pub type_name: String,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PocketItemView {
    pub pocket_id: PocketId,
    pub item_id: ItemId,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailView {
    pub id: ItemId,
    pub name: String,
    pub image: String,
    pub types: Vec<String>,
    pub evolves_from: Option<ItemView>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum DetailState {
    Loading,
    Success(DetailView),
    Error(String),
}

/// Uppercases the first character, leaving the rest untouched.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn user_message(err: &PokedexError) -> String {
    if err.is_connectivity() {
        CONNECTION_FAILED.to_string()
    } else {
        err.to_string()
    }
}

fn item_view(item: &Item) -> ItemView {
    ItemView {
        id: item.id,
        name: capitalize(&item.name),
        image: item.image.clone(),
    }
}

pub fn project_collections(types: &Vec<TypeWithItems>) -> Vec<CollectionView> {
    types
        .iter()
        .map(|group| CollectionView {
            type_name: capitalize(&group.type_name),
            items: group.items.iter().map(item_view).collect(),
        })
        .collect()
}

pub fn project_pocket(captures: &Vec<CapturedItem>) -> Vec<PocketItemView> {
    captures
        .iter()
        .map(|captured| PocketItemView {
            pocket_id: captured.pocket_id,
            item_id: captured.item_id,
            name: capitalize(&captured.name),
            image: captured.image.clone(),
        })
        .collect()
}

pub fn project_detail(item: &ItemWithTypes, species: Option<&SpeciesWithEvolvesFrom>) -> DetailView {
    DetailView {
        id: item.item.id,
        name: capitalize(&item.item.name),
        image: item.item.image.clone(),
        types: item.types.iter().map(|name| capitalize(name)).collect(),
        evolves_from: species.and_then(|s| s.evolves_from.as_ref()).map(item_view),
        description: species
            .map(|s| s.species.description.clone())
            .unwrap_or_default(),
    }
}

/// A live query mapped through a pure projection.
pub struct Projection<T, U> {
    source: Subscription<T>,
    project: fn(&T) -> U,
}

impl<T, U> Projection<T, U> {
    pub fn new(source: Subscription<T>, project: fn(&T) -> U) -> Self {
        Self { source, project }
    }

    pub fn current(&self) -> U {
        (self.project)(&self.source.current())
    }

    /// Current value first, then one value per relevant cache write.
    pub async fn next(&mut self) -> Option<U> {
        let snapshot = self.source.next().await?;
        Some((self.project)(&snapshot))
    }
}

/// State holder for the list screen: grouped collections, the pocket, and
/// the sync/capture/release intents.
pub struct HomeProjector<C: CatalogClient> {
    sync: Arc<Synchronizer<C>>,
    errors: EventChannel<String>,
    scroll_to_first: EventChannel<()>,
}

impl<C: CatalogClient> HomeProjector<C> {
    pub fn new(sync: Arc<Synchronizer<C>>) -> Self {
        Self {
            sync,
            errors: EventChannel::new(),
            scroll_to_first: EventChannel::new(),
        }
    }

    pub fn errors(&self) -> &EventChannel<String> {
        &self.errors
    }

    pub fn scroll_to_first(&self) -> &EventChannel<()> {
        &self.scroll_to_first
    }

    pub fn collections(
        &self,
    ) -> Result<Projection<Vec<TypeWithItems>, Vec<CollectionView>>, PokedexError> {
        match self.sync.store().subscribe_types_with_items() {
            Ok(source) => Ok(Projection::new(source, project_collections)),
            Err(err) => {
                self.errors.publish(user_message(&err));
                Err(err)
            }
        }
    }

    pub fn pocket_items(
        &self,
    ) -> Result<Projection<Vec<CapturedItem>, Vec<PocketItemView>>, PokedexError> {
        match self.sync.store().subscribe_recent_captures() {
            Ok(source) => Ok(Projection::new(source, project_pocket)),
            Err(err) => {
                self.errors.publish(user_message(&err));
                Err(err)
            }
        }
    }

    /// Runs a bulk sync; failures become an error event.
    pub async fn refresh(&self) -> Option<SyncReport> {
        match self.sync.bulk_sync().await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(error = %err, "catalog sync failed");
                self.errors.publish(user_message(&err));
                None
            }
        }
    }

    pub fn capture(&self, item_id: ItemId) -> Option<PocketId> {
        match self.sync.capture(item_id) {
            Ok(pocket_id) => {
                self.scroll_to_first.publish(());
                Some(pocket_id)
            }
            Err(err) => {
                warn!(error = %err, item = %item_id, "capture failed");
                self.errors.publish(CAPTURE_FAILED.to_string());
                None
            }
        }
    }

    pub fn release(&self, pocket_id: PocketId) {
        if let Err(err) = self.sync.release(pocket_id) {
            warn!(error = %err, pocket = %pocket_id, "release failed");
            self.errors.publish(RELEASE_FAILED.to_string());
        }
    }
}

/// State holder for one item's detail page.
pub struct DetailProjector<C: CatalogClient> {
    sync: Arc<Synchronizer<C>>,
    item_id: ItemId,
    state: watch::Sender<DetailState>,
    errors: EventChannel<String>,
}

impl<C: CatalogClient> DetailProjector<C> {
    pub fn new(sync: Arc<Synchronizer<C>>, item_id: ItemId) -> Self {
        let (state, _) = watch::channel(DetailState::Loading);
        Self {
            sync,
            item_id,
            state,
            errors: EventChannel::new(),
        }
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn state(&self) -> DetailState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.state.subscribe()
    }

    pub fn errors(&self) -> &EventChannel<String> {
        &self.errors
    }

    /// Reads the cached detail, completing species data on a miss.
    ///
    /// Only a missing item yields `Error`. A failed species fetch publishes
    /// an error event and still shows the cached item without species data.
    pub async fn load(&self) -> DetailState {
        let state = match self.read_with_backfill().await {
            Ok(view) => DetailState::Success(view),
            Err(err) => {
                warn!(error = %err, item = %self.item_id, "detail load failed");
                let message = user_message(&err);
                self.errors.publish(message.clone());
                DetailState::Error(message)
            }
        };
        self.state.send_replace(state.clone());
        state
    }

    async fn read_with_backfill(&self) -> Result<DetailView, PokedexError> {
        let store = self.sync.store();
        let item = store
            .item_with_types(self.item_id)?
            .ok_or(PokedexError::NotCached(self.item_id.get()))?;

        if let Some(species) = store.species_with_evolves_from(self.item_id)? {
            return Ok(project_detail(&item, Some(&species)));
        }

        let species = match self.sync.complete_species(self.item_id).await {
            Ok(()) => store.species_with_evolves_from(self.item_id)?,
            Err(err) => {
                warn!(error = %err, item = %self.item_id, "species completion failed");
                self.errors.publish(user_message(&err));
                None
            }
        };
        Ok(project_detail(&item, species.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_only_touches_first_letter() {
        assert_eq!(capitalize("mr-mime"), "Mr-mime");
        assert_eq!(capitalize("Fire"), "Fire");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn connectivity_errors_get_friendly_message() {
        let err = PokedexError::Connection("dns error".to_string());
        assert_eq!(user_message(&err), CONNECTION_FAILED);
        let err = PokedexError::CatalogStatus {
            status: 500,
            message: "oops".to_string(),
        };
        assert_eq!(user_message(&err), "catalog returned status 500: oops");
    }

    #[test]
    fn detail_without_species_has_empty_description() {
        let item = ItemWithTypes {
            item: Item {
                id: ItemId(4),
                name: "charmander".to_string(),
                image: "img".to_string(),
            },
            types: vec!["fire".to_string()],
        };
        let view = project_detail(&item, None);
        assert_eq!(view.name, "Charmander");
        assert_eq!(view.types, vec!["Fire"]);
        assert_eq!(view.evolves_from, None);
        assert_eq!(view.description, "");
    }
}
