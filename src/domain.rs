use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PokedexError;

/// Catalog-assigned item id. Stable across syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub i64);

impl ItemId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = PokedexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(PokedexError::Config(format!("invalid item id: {value}"))),
        }
    }
}

/// Identity of a pocket entry. Distinct from the captured item's id so the
/// same item can be captured more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PocketId(pub i64);

impl PocketId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PocketId {
    type Err = PokedexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(PokedexError::Config(format!("invalid pocket id: {value}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Species {
    pub item_id: ItemId,
    pub evolves_from: Option<ItemId>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeWithItems {
    pub type_name: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemWithTypes {
    pub item: Item,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesWithEvolvesFrom {
    pub species: Species,
    pub evolves_from: Option<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedItem {
    pub pocket_id: PocketId,
    pub item_id: ItemId,
    pub name: String,
    pub image: String,
}
