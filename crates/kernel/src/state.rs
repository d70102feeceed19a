use crate::document::DocumentError;
use mapvc_common::{CustomAsset, Element, Link, Tile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// Full content of a map document as the host reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapState {
    #[serde(default)]
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub custom_assets: Vec<CustomAsset>,
}

impl MapState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all categories.
    pub fn item_count(&self) -> usize {
        self.tiles.len() + self.elements.len() + self.links.len() + self.custom_assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Check that ids are unique within each category. Tiles are keyed by
    /// position.
    pub fn validate(&self) -> Result<(), DocumentError> {
        first_duplicate(self.tiles.iter().map(|t| t.pos()))
            .map_or(Ok(()), |pos| Err(DocumentError::duplicate("tile", pos)))?;
        first_duplicate(self.elements.iter().map(|e| &e.id))
            .map_or(Ok(()), |id| Err(DocumentError::duplicate("element", id)))?;
        first_duplicate(self.links.iter().map(|l| &l.id))
            .map_or(Ok(()), |id| Err(DocumentError::duplicate("link", id)))?;
        first_duplicate(self.custom_assets.iter().map(|a| &a.id))
            .map_or(Ok(()), |id| Err(DocumentError::duplicate("custom asset", id)))?;
        Ok(())
    }
}

fn first_duplicate<T: Eq + Hash>(items: impl Iterator<Item = T>) -> Option<T> {
    let mut seen = HashSet::new();
    for item in items {
        if seen.contains(&item) {
            return Some(item);
        }
        seen.insert(item);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use mapvc_common::{Endpoint, TilePos};

    fn sample() -> MapState {
        MapState {
            tiles: vec![Tile::new(TilePos::new(0, 0, 0), "grass")],
            elements: vec![
                Element::new("a", "button", DVec2::ZERO),
                Element::new("b", "counter", DVec2::new(3.0, 0.0)),
            ],
            links: vec![Link::new("w", Endpoint::new("a", "pressed"), Endpoint::new("b", "increment"))],
            custom_assets: Vec::new(),
        }
    }

    #[test]
    fn empty_state_is_valid() {
        let state = MapState::new();
        assert!(state.is_empty());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn item_count_sums_categories() {
        assert_eq!(sample().item_count(), 4);
    }

    #[test]
    fn duplicate_element_rejected() {
        let mut state = sample();
        state.elements.push(Element::new("a", "button", DVec2::ONE));
        match state.validate() {
            Err(DocumentError::DuplicateId { kind, id }) => {
                assert_eq!(kind, "element");
                assert_eq!(id, "a");
            }
            other => panic!("expected DuplicateId, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_tile_position_rejected() {
        let mut state = sample();
        state.tiles.push(Tile::new(TilePos::new(0, 0, 0), "stone"));
        assert!(state.validate().is_err());
    }

    #[test]
    fn same_id_in_different_categories_is_fine() {
        let mut state = sample();
        state.links[0].id = "a".into();
        assert!(state.validate().is_ok());
    }

    #[test]
    fn serializes_with_host_field_names() {
        let v = serde_json::to_value(sample()).unwrap();
        assert!(v.get("customAssets").is_some());
        assert!(v.get("tiles").is_some());
    }
}
