use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::domain::{
    CapturedItem, Item, ItemId, ItemWithTypes, PocketId, Species, SpeciesWithEvolvesFrom,
    TypeWithItems,
};
use crate::error::{PokedexError, storage};
use crate::live::{LiveQuery, Subscription, Table};

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    item_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    image TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_items_name ON items (name);

CREATE TABLE IF NOT EXISTS types (
    type_name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS item_types (
    type_name TEXT NOT NULL,
    item_id INTEGER NOT NULL,
    PRIMARY KEY (type_name, item_id)
);
CREATE INDEX IF NOT EXISTS idx_item_types_item_id ON item_types (item_id);

CREATE TABLE IF NOT EXISTS species (
    item_id INTEGER PRIMARY KEY,
    evolves_from_id INTEGER,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pocket (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL,
    captured_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pocket_captured_at ON pocket (captured_at);
"#;

const DROP_ALL: &str = r#"
DROP TABLE IF EXISTS items;
DROP TABLE IF EXISTS types;
DROP TABLE IF EXISTS item_types;
DROP TABLE IF EXISTS species;
DROP TABLE IF EXISTS pocket;
"#;

const TYPES_WITH_ITEMS_READS: &[Table] = &[Table::Items, Table::Types, Table::ItemTypes];
const RECENT_CAPTURES_READS: &[Table] = &[Table::Items, Table::Pocket];

/// A pocket row as stored, used when the caller controls the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PocketEntry {
    pub id: Option<PocketId>,
    pub item_id: ItemId,
    pub captured_at_ms: i64,
}

/// SQLite-backed cache shared by the synchronizer and the projectors.
///
/// Cloning is cheap; all clones share one connection and one set of live
/// queries. No lock is held outside a single method call.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Mutex<Connection>,
    path: Option<Utf8PathBuf>,
    types_with_items: LiveQuery<Vec<TypeWithItems>>,
    recent_captures: LiveQuery<Vec<CapturedItem>>,
}

impl Store {
    pub fn open(path: &Utf8Path) -> Result<Self, PokedexError> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| PokedexError::Storage(err.to_string()))?;
            }
        }
        let conn = Connection::open(path.as_std_path()).map_err(storage)?;
        info!(path = %path, "opened cache");
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    pub fn open_default() -> Result<Self, PokedexError> {
        Self::open(&Self::default_path()?)
    }

    pub fn open_in_memory() -> Result<Self, PokedexError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::from_connection(conn, None)
    }

    pub fn default_path() -> Result<Utf8PathBuf, PokedexError> {
        let dirs = ProjectDirs::from("", "", "pokedex").ok_or_else(|| {
            PokedexError::Storage("unable to resolve data directory".to_string())
        })?;
        Utf8PathBuf::from_path_buf(dirs.data_dir().join("pokedex.db"))
            .map_err(|_| PokedexError::Storage("invalid data directory path".to_string()))
    }

    fn from_connection(conn: Connection, path: Option<Utf8PathBuf>) -> Result<Self, PokedexError> {
        prepare_schema(&conn).map_err(storage)?;
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                path,
                types_with_items: LiveQuery::new(
                    "types_with_items",
                    TYPES_WITH_ITEMS_READS,
                    query_types_with_items,
                ),
                recent_captures: LiveQuery::new(
                    "recent_captures",
                    RECENT_CAPTURES_READS,
                    query_recent_captures,
                ),
            }),
        })
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        self.inner.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PokedexError> {
        self.inner
            .conn
            .lock()
            .map_err(|_| PokedexError::Storage("cache connection poisoned".to_string()))
    }

    fn notify(&self, conn: &Connection, touched: &[Table]) {
        self.inner.types_with_items.on_write(conn, touched);
        self.inner.recent_captures.on_write(conn, touched);
    }

    pub fn last_item_id(&self) -> Result<Option<ItemId>, PokedexError> {
        let conn = self.lock()?;
        conn.query_row("SELECT MAX(item_id) FROM items", [], |row| {
            row.get::<_, Option<i64>>(0)
        })
        .map(|id| id.map(ItemId))
        .map_err(storage)
    }

    pub fn item_id_by_name(&self, name: &str) -> Result<Option<ItemId>, PokedexError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT item_id FROM items WHERE name = ?1 LIMIT 1",
            params![name],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|id| id.map(ItemId))
        .map_err(storage)
    }

    pub fn item(&self, id: ItemId) -> Result<Option<Item>, PokedexError> {
        let conn = self.lock()?;
        read_item(&conn, id).map_err(storage)
    }

    /// Writes an item with its types and associations in one transaction.
    /// The item row is replaced; type and association rows are kept if present.
    pub fn insert_item_with_types(&self, item: &Item, types: &[String]) -> Result<(), PokedexError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage)?;
        tx.execute(
            "INSERT OR REPLACE INTO items (item_id, name, image) VALUES (?1, ?2, ?3)",
            params![item.id.get(), item.name, item.image],
        )
        .map_err(storage)?;
        for type_name in types {
            tx.execute(
                "INSERT OR IGNORE INTO types (type_name) VALUES (?1)",
                params![type_name],
            )
            .map_err(storage)?;
            tx.execute(
                "INSERT OR IGNORE INTO item_types (type_name, item_id) VALUES (?1, ?2)",
                params![type_name, item.id.get()],
            )
            .map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        debug!(item = %item.id, name = %item.name, types = types.len(), "cached item");
        self.notify(&conn, &[Table::Items, Table::Types, Table::ItemTypes]);
        Ok(())
    }

    pub fn item_with_types(&self, id: ItemId) -> Result<Option<ItemWithTypes>, PokedexError> {
        let conn = self.lock()?;
        let Some(item) = read_item(&conn, id).map_err(storage)? else {
            return Ok(None);
        };
        let mut stmt = conn
            .prepare("SELECT type_name FROM item_types WHERE item_id = ?1 ORDER BY type_name")
            .map_err(storage)?;
        let types = stmt
            .query_map(params![id.get()], |row| row.get::<_, String>(0))
            .map_err(storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage)?;
        Ok(Some(ItemWithTypes { item, types }))
    }

    pub fn species(&self, id: ItemId) -> Result<Option<Species>, PokedexError> {
        let conn = self.lock()?;
        read_species(&conn, id).map_err(storage)
    }

    pub fn insert_species(&self, species: &Species) -> Result<(), PokedexError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO species (item_id, evolves_from_id, description)
             VALUES (?1, ?2, ?3)",
            params![
                species.item_id.get(),
                species.evolves_from.map(ItemId::get),
                species.description
            ],
        )
        .map_err(storage)?;
        self.notify(&conn, &[Table::Species]);
        Ok(())
    }

    pub fn species_with_evolves_from(
        &self,
        id: ItemId,
    ) -> Result<Option<SpeciesWithEvolvesFrom>, PokedexError> {
        let conn = self.lock()?;
        let Some(species) = read_species(&conn, id).map_err(storage)? else {
            return Ok(None);
        };
        let evolves_from = match species.evolves_from {
            Some(from) => read_item(&conn, from).map_err(storage)?,
            None => None,
        };
        Ok(Some(SpeciesWithEvolvesFrom {
            species,
            evolves_from,
        }))
    }

    /// Inserts a pocket row, replacing any row that already uses `entry.id`.
    pub fn insert_pocket(&self, entry: &PocketEntry) -> Result<PocketId, PokedexError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO pocket (id, item_id, captured_at) VALUES (?1, ?2, ?3)",
            params![
                entry.id.map(PocketId::get),
                entry.item_id.get(),
                entry.captured_at_ms
            ],
        )
        .map_err(storage)?;
        let id = PocketId(conn.last_insert_rowid());
        self.notify(&conn, &[Table::Pocket]);
        Ok(id)
    }

    /// Returns whether a row was removed.
    pub fn delete_pocket(&self, id: PocketId) -> Result<bool, PokedexError> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM pocket WHERE id = ?1", params![id.get()])
            .map_err(storage)?;
        if removed > 0 {
            self.notify(&conn, &[Table::Pocket]);
        }
        Ok(removed > 0)
    }

    pub fn pocket_entries(&self) -> Result<Vec<PocketEntry>, PokedexError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, item_id, captured_at FROM pocket ORDER BY id")
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PocketEntry {
                    id: Some(PocketId(row.get(0)?)),
                    item_id: ItemId(row.get(1)?),
                    captured_at_ms: row.get(2)?,
                })
            })
            .map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }

    pub fn types_with_items(&self) -> Result<Vec<TypeWithItems>, PokedexError> {
        let conn = self.lock()?;
        query_types_with_items(&conn).map_err(storage)
    }

    pub fn recent_captures(&self) -> Result<Vec<CapturedItem>, PokedexError> {
        let conn = self.lock()?;
        query_recent_captures(&conn).map_err(storage)
    }

    pub fn subscribe_types_with_items(
        &self,
    ) -> Result<Subscription<Vec<TypeWithItems>>, PokedexError> {
        let conn = self.lock()?;
        self.inner.types_with_items.subscribe(&conn).map_err(storage)
    }

    pub fn subscribe_recent_captures(
        &self,
    ) -> Result<Subscription<Vec<CapturedItem>>, PokedexError> {
        let conn = self.lock()?;
        self.inner.recent_captures.subscribe(&conn).map_err(storage)
    }

    pub fn count(&self, table: Table) -> Result<i64, PokedexError> {
        let sql = match table {
            Table::Items => "SELECT COUNT(*) FROM items",
            Table::Types => "SELECT COUNT(*) FROM types",
            Table::ItemTypes => "SELECT COUNT(*) FROM item_types",
            Table::Species => "SELECT COUNT(*) FROM species",
            Table::Pocket => "SELECT COUNT(*) FROM pocket",
        };
        let conn = self.lock()?;
        conn.query_row(sql, [], |row| row.get(0)).map_err(storage)
    }
}

/// Recreates every table when the stored schema version differs.
fn prepare_schema(conn: &Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version != SCHEMA_VERSION {
        if version != 0 {
            info!(found = version, expected = SCHEMA_VERSION, "schema mismatch, recreating cache");
        }
        conn.execute_batch(DROP_ALL)?;
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

fn read_item(conn: &Connection, id: ItemId) -> rusqlite::Result<Option<Item>> {
    conn.query_row(
        "SELECT item_id, name, image FROM items WHERE item_id = ?1",
        params![id.get()],
        |row| {
            Ok(Item {
                id: ItemId(row.get(0)?),
                name: row.get(1)?,
                image: row.get(2)?,
            })
        },
    )
    .optional()
}

fn read_species(conn: &Connection, id: ItemId) -> rusqlite::Result<Option<Species>> {
    conn.query_row(
        "SELECT item_id, evolves_from_id, description FROM species WHERE item_id = ?1",
        params![id.get()],
        |row| {
            Ok(Species {
                item_id: ItemId(row.get(0)?),
                evolves_from: row.get::<_, Option<i64>>(1)?.map(ItemId),
                description: row.get(2)?,
            })
        },
    )
    .optional()
}

fn query_types_with_items(conn: &Connection) -> rusqlite::Result<Vec<TypeWithItems>> {
    let mut stmt = conn.prepare(
        "SELECT t.type_name, i.item_id, i.name, i.image
         FROM types t
         LEFT JOIN item_types it ON it.type_name = t.type_name
         LEFT JOIN items i ON i.item_id = it.item_id
         ORDER BY t.type_name ASC, i.item_id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        let type_name: String = row.get(0)?;
        let id: Option<i64> = row.get(1)?;
        let item = match id {
            Some(id) => Some(Item {
                id: ItemId(id),
                name: row.get(2)?,
                image: row.get(3)?,
            }),
            None => None,
        };
        Ok((type_name, item))
    })?;

    let mut grouped: Vec<TypeWithItems> = Vec::new();
    for row in rows {
        let (type_name, item) = row?;
        if grouped.last().map(|group| group.type_name != type_name).unwrap_or(true) {
            grouped.push(TypeWithItems {
                type_name,
                items: Vec::new(),
            });
        }
        if let (Some(item), Some(group)) = (item, grouped.last_mut()) {
            group.items.push(item);
        }
    }
    Ok(grouped)
}

fn query_recent_captures(conn: &Connection) -> rusqlite::Result<Vec<CapturedItem>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, i.item_id, i.name, i.image
         FROM pocket p
         JOIN items i ON i.item_id = p.item_id
         ORDER BY p.captured_at DESC, p.id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CapturedItem {
            pocket_id: PocketId(row.get(0)?),
            item_id: ItemId(row.get(1)?),
            name: row.get(2)?,
            image: row.get(3)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_reports_schema_version() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn last_item_id_is_none_when_empty() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.last_item_id().unwrap(), None);
    }
}
