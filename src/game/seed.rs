//! Content loaders for the game catalog.
//!
//! The built-in catalog is compiled from `data/content/*.json`. Operators can
//! override it with either a directory holding the same six section files or
//! a single JSON document containing the whole [`Catalog`].

use std::fs;
use std::path::Path;

use log::info;
use serde::de::DeserializeOwned;

use crate::game::catalog::Catalog;
use crate::game::errors::{GameError, GameResult};

const ECONOMY_JSON: &str = include_str!("../../data/content/economy.json");
const ITEMS_JSON: &str = include_str!("../../data/content/items.json");
const PROGRESSION_JSON: &str = include_str!("../../data/content/progression.json");
const GANGS_JSON: &str = include_str!("../../data/content/gangs.json");
const MONETIZATION_JSON: &str = include_str!("../../data/content/monetization.json");
const EVENTS_JSON: &str = include_str!("../../data/content/events.json");

fn parse_section<T: DeserializeOwned>(name: &str, contents: &str) -> GameResult<T> {
    serde_json::from_str(contents).map_err(|e| GameError::Content(format!("Failed to parse {}: {}", name, e)))
}

fn assemble(read: impl Fn(&str) -> GameResult<String>) -> GameResult<Catalog> {
    let catalog = Catalog {
        economy: parse_section("economy.json", &read("economy.json")?)?,
        items: parse_section("items.json", &read("items.json")?)?,
        progression: parse_section("progression.json", &read("progression.json")?)?,
        gangs: parse_section("gangs.json", &read("gangs.json")?)?,
        monetization: parse_section("monetization.json", &read("monetization.json")?)?,
        events: parse_section("events.json", &read("events.json")?)?,
    };
    catalog.validate()?;
    Ok(catalog)
}

/// The catalog shipped with the binary.
pub fn load_builtin() -> GameResult<Catalog> {
    assemble(|name| {
        let text = match name {
            "economy.json" => ECONOMY_JSON,
            "items.json" => ITEMS_JSON,
            "progression.json" => PROGRESSION_JSON,
            "gangs.json" => GANGS_JSON,
            "monetization.json" => MONETIZATION_JSON,
            "events.json" => EVENTS_JSON,
            other => return Err(GameError::Content(format!("unknown section {}", other))),
        };
        Ok(text.to_string())
    })
}

/// Load a catalog from a directory of section files or from one JSON document.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> GameResult<Catalog> {
    let path = path.as_ref();
    let catalog = if path.is_dir() {
        assemble(|name| Ok(fs::read_to_string(path.join(name))?))?
    } else {
        let contents = fs::read_to_string(path)?;
        let catalog: Catalog = parse_section(&path.display().to_string(), &contents)?;
        catalog.validate()?;
        catalog
    };
    info!(
        "Loaded game content from {} ({} businesses, {} items, {} cases)",
        path.display(),
        catalog.economy.businesses.len(),
        catalog.items.items.len(),
        catalog.items.cases.len()
    );
    Ok(catalog)
}

/// Resolve the configured content source, falling back to the built-in catalog.
pub fn load_catalog(content_file: Option<&str>) -> GameResult<Catalog> {
    match content_file {
        Some(path) if !path.trim().is_empty() => load_from_path(path),
        _ => load_builtin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_catalog_is_consistent() {
        let catalog = load_builtin().expect("builtin content");
        assert_eq!(catalog.economy.businesses.len(), 10);
        assert_eq!(catalog.gangs.territories.len(), 10);
        assert_eq!(catalog.talents().count(), 12);
        assert!(catalog.case("case_basic").is_ok());
        assert!(catalog.package("season_1_premium").is_ok());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_from_path("/nonexistent/content.json");
        assert!(matches!(result, Err(GameError::Io(_))));
    }

    #[test]
    fn whole_catalog_file_round_trips() {
        let tmp = TempDir::new().unwrap();
        let builtin = load_builtin().unwrap();
        let path = tmp.path().join("content.json");
        fs::write(&path, serde_json::to_string(&builtin).unwrap()).unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(loaded.items.items.len(), builtin.items.items.len());
    }

    #[test]
    fn dangling_loot_reference_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = load_builtin().unwrap();
        catalog.items.cases[0].loot[0].item_id = "no_such_item".into();
        let path = tmp.path().join("broken.json");
        fs::write(&path, serde_json::to_string(&catalog).unwrap()).unwrap();
        assert!(matches!(load_from_path(&path), Err(GameError::Content(_))));
    }
}
