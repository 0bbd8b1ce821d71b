use std::io::{self, Write};

use std::time::Duration;

use serde::Serialize;

use crate::domain::PocketId;
use crate::projector::{CollectionView, DetailState, PocketItemView};
use crate::sync::SyncReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Acknowledges `sync --watch` before the loop starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchAck {
    pub watching: bool,
    pub period_secs: u64,
}

impl WatchAck {
    pub fn new(period: Duration) -> Self {
        Self {
            watching: true,
            period_secs: period.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseAck {
    pub released: PocketId,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn render_sync(report: &SyncReport) -> String {
        if report.is_noop() {
            return "cache already up to date".to_string();
        }
        format!(
            "synced: {} listed, {} already cached, {} stored",
            report.requested, report.skipped, report.stored
        )
    }

    pub fn render_collections(collections: &[CollectionView]) -> String {
        let mut out = String::new();
        for collection in collections {
            out.push_str(&format!("{} ({})\n", collection.type_name, collection.items.len()));
            for item in &collection.items {
                out.push_str(&format!("  #{:<4} {}\n", item.id.get(), item.name));
            }
        }
        out
    }

    pub fn render_pocket(items: &[PocketItemView]) -> String {
        if items.is_empty() {
            return "pocket is empty\n".to_string();
        }
        items
            .iter()
            .map(|item| format!("[{}] #{} {}\n", item.pocket_id, item.item_id, item.name))
            .collect()
    }

    pub fn render_detail(state: &DetailState) -> String {
        match state {
            DetailState::Loading => "loading...\n".to_string(),
            DetailState::Error(message) => format!("error: {message}\n"),
            DetailState::Success(view) => {
                let mut out = format!("#{} {}\n", view.id, view.name);
                if !view.types.is_empty() {
                    out.push_str(&format!("types: {}\n", view.types.join(", ")));
                }
                if let Some(from) = &view.evolves_from {
                    out.push_str(&format!("evolves from: #{} {}\n", from.id, from.name));
                }
                if !view.description.is_empty() {
                    let description = view.description.split_whitespace().collect::<Vec<_>>();
                    out.push_str(&format!("{}\n", description.join(" ")));
                }
                out.push_str(&format!("image: {}\n", view.image));
                out
            }
        }
    }

    pub fn print(text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(text.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, PocketId};
    use crate::projector::{DetailView, ItemView};

    #[test]
    fn detail_text_collapses_form_feeds() {
        let state = DetailState::Success(DetailView {
            id: ItemId(2),
            name: "Ivysaur".to_string(),
            image: "img".to_string(),
            types: vec!["Grass".to_string()],
            evolves_from: Some(ItemView {
                id: ItemId(1),
                name: "Bulbasaur".to_string(),
                image: "img1".to_string(),
            }),
            description: "When the\nbulb on\u{c}its back".to_string(),
        });
        let text = TextOutput::render_detail(&state);
        assert!(text.contains("evolves from: #1 Bulbasaur"));
        assert!(text.contains("When the bulb on its back"));
    }

    #[test]
    fn empty_pocket_has_placeholder() {
        assert_eq!(TextOutput::render_pocket(&[]), "pocket is empty\n");
        let items = [PocketItemView {
            pocket_id: PocketId(3),
            item_id: ItemId(25),
            name: "Pikachu".to_string(),
            image: String::new(),
        }];
        assert_eq!(TextOutput::render_pocket(&items), "[3] #25 Pikachu\n");
    }

    #[test]
    fn acknowledgements_serialize_as_objects() {
        let release = serde_json::to_value(ReleaseAck { released: PocketId(7) }).unwrap();
        assert_eq!(release, serde_json::json!({ "released": 7 }));
        let watch = serde_json::to_value(WatchAck::new(Duration::from_secs(60))).unwrap();
        assert_eq!(watch, serde_json::json!({ "watching": true, "period_secs": 60 }));
    }
}
