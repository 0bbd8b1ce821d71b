use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{CatalogClient, ItemDetail};
use crate::config::CatalogConfig;
use crate::domain::{Item, ItemId, PocketId, Species};
use crate::error::PokedexError;
use crate::single_flight::SingleFlight;
use crate::store::{PocketEntry, Store};

/// What one bulk-sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Names returned by the list call.
    pub requested: usize,
    /// Names skipped because an item with that name was already cached.
    pub skipped: usize,
    /// Items fetched and written.
    pub stored: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.requested == 0
    }
}

/// Reconciles the local cache with the remote catalog.
pub struct Synchronizer<C: CatalogClient> {
    store: Store,
    client: C,
    config: CatalogConfig,
    bulk: SingleFlight<(), SyncReport>,
    species: SingleFlight<ItemId, ()>,
}

impl<C: CatalogClient> Synchronizer<C> {
    pub fn new(store: Store, client: C, config: CatalogConfig) -> Self {
        Self {
            store,
            client,
            config,
            bulk: SingleFlight::new(),
            species: SingleFlight::new(),
        }
    }

    pub fn shared(store: Store, client: C, config: CatalogConfig) -> Arc<Self> {
        Arc::new(Self::new(store, client, config))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Brings the cache up to `catalog_size` items. Overlapping calls share
    /// one pass.
    pub async fn bulk_sync(&self) -> Result<SyncReport, PokedexError> {
        self.bulk.run((), || self.bulk_sync_pass()).await
    }

    async fn bulk_sync_pass(&self) -> Result<SyncReport, PokedexError> {
        let last_id = self.store.last_item_id()?.map(ItemId::get).unwrap_or(0);
        if last_id >= self.config.catalog_size {
            debug!(last_id, "cache already holds the full catalog");
            return Ok(SyncReport::default());
        }

        let limit = self.config.catalog_size - last_id;
        info!(offset = last_id, limit, "syncing catalog");
        let names = self.client.list_items(last_id, limit).await?;

        let mut pending = Vec::with_capacity(names.len());
        for name in &names {
            if self.store.item_id_by_name(name)?.is_none() {
                pending.push(name.as_str());
            }
        }
        let skipped = names.len() - pending.len();

        let fetches: Vec<_> = pending
            .iter()
            .map(|name| self.client.fetch_item(name))
            .collect();
        let details = try_join_all(fetches).await?;

        let store = self.store.clone();
        let stored = blocking(move || {
            for detail in &details {
                store_detail(&store, detail)?;
            }
            Ok(details.len())
        })
        .await?;

        let report = SyncReport {
            requested: names.len(),
            skipped,
            stored,
        };
        info!(
            requested = report.requested,
            skipped = report.skipped,
            stored = report.stored,
            "catalog sync finished"
        );
        Ok(report)
    }

    /// Fetches species data for `id` unless it is already cached.
    pub async fn complete_species(&self, id: ItemId) -> Result<(), PokedexError> {
        if self.store.species(id)?.is_some() {
            return Ok(());
        }
        self.species.run(id, || self.fetch_species(id)).await
    }

    async fn fetch_species(&self, id: ItemId) -> Result<(), PokedexError> {
        // A joiner that lost a leader race may get here after the row landed.
        if self.store.species(id)?.is_some() {
            return Ok(());
        }
        let detail = self.client.fetch_species(id).await?;
        let evolves_from = match detail.evolves_from_name() {
            Some(name) => self.store.item_id_by_name(name)?,
            None => None,
        };
        let species = Species {
            item_id: id,
            evolves_from,
            description: detail.description_for(&self.config.preferred_version),
        };
        debug!(item = %id, evolves_from = ?species.evolves_from, "caching species");
        let store = self.store.clone();
        blocking(move || store.insert_species(&species)).await?;
        Ok(())
    }

    /// Adds `item_id` to the pocket and returns the new entry's id.
    pub fn capture(&self, item_id: ItemId) -> Result<PocketId, PokedexError> {
        let entry = PocketEntry {
            id: None,
            item_id,
            captured_at_ms: Utc::now().timestamp_millis(),
        };
        let pocket_id = self.store.insert_pocket(&entry)?;
        info!(item = %item_id, pocket = %pocket_id, "captured");
        Ok(pocket_id)
    }

    /// Removes a pocket entry. Releasing an unknown id is not an error.
    pub fn release(&self, pocket_id: PocketId) -> Result<(), PokedexError> {
        let removed = self.store.delete_pocket(pocket_id)?;
        info!(pocket = %pocket_id, removed, "released");
        Ok(())
    }
}

fn store_detail(store: &Store, detail: &ItemDetail) -> Result<(), PokedexError> {
    let item = Item {
        id: ItemId(detail.id),
        name: detail.name.clone(),
        image: detail.image().to_string(),
    };
    store.insert_item_with_types(&item, &detail.type_names())
}

/// Runs cache writes on the blocking pool so disk I/O stays off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, PokedexError>
where
    F: FnOnce() -> Result<T, PokedexError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| PokedexError::Storage(format!("cache writer task failed: {err}")))?
}
