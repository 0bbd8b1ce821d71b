use assert_matches::assert_matches;

use pokedex_cache::domain::{ItemId, PocketId};
use pokedex_cache::error::PokedexError;

#[test]
fn parse_item_id_valid() {
    let id: ItemId = " 25 ".parse().unwrap();
    assert_eq!(id, ItemId(25));
    assert_eq!(id.to_string(), "25");
}

#[test]
fn parse_item_id_rejects_zero_and_text() {
    assert_matches!("0".parse::<ItemId>(), Err(PokedexError::Config(_)));
    assert_matches!("pikachu".parse::<ItemId>(), Err(PokedexError::Config(_)));
}

#[test]
fn parse_pocket_id() {
    assert_eq!("7".parse::<PocketId>().unwrap(), PocketId(7));
    assert_matches!("-1".parse::<PocketId>(), Err(PokedexError::Config(_)));
}

#[test]
fn ids_serialize_as_plain_numbers() {
    assert_eq!(serde_json::to_string(&ItemId(4)).unwrap(), "4");
    assert_eq!(serde_json::from_str::<PocketId>("9").unwrap(), PocketId(9));
}
