use crate::state::MapState;
use indexmap::IndexMap;
use mapvc_common::{AssetId, CustomAsset, Element, ElementId, Link, LinkId, Tile, TilePos};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Errors raised by live-document primitives.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("host rejected {op}: {reason}")]
    Rejected { op: String, reason: String },
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocumentError {
    pub fn rejected(op: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::Rejected {
            op: op.to_string(),
            reason: reason.into(),
        }
    }

    pub fn duplicate(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::DuplicateId {
            kind,
            id: id.to_string(),
        }
    }
}

/// The host's live map document.
///
/// Removal primitives are idempotent: removing something that is not there
/// succeeds. What creation does with an id that already exists is up to the
/// host.
pub trait LiveDocument {
    /// Read the full current content. Must not mutate the document.
    fn capture(&self) -> Result<MapState, DocumentError>;

    fn remove_element(&mut self, id: &ElementId) -> Result<(), DocumentError>;
    fn remove_tile(&mut self, pos: TilePos) -> Result<(), DocumentError>;
    fn remove_link(&mut self, id: &LinkId) -> Result<(), DocumentError>;
    fn remove_custom_asset(&mut self, id: &AssetId) -> Result<(), DocumentError>;

    fn create_custom_asset(&mut self, asset: &CustomAsset) -> Result<(), DocumentError>;
    fn create_element(&mut self, element: &Element) -> Result<(), DocumentError>;
    fn create_tile(&mut self, tile: &Tile) -> Result<(), DocumentError>;
    fn create_link(&mut self, link: &Link) -> Result<(), DocumentError>;
}

/// A record of every primitive call a [`MapDocument`] accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    ElementRemoved(ElementId),
    TileRemoved(TilePos),
    LinkRemoved(LinkId),
    AssetRemoved(AssetId),
    AssetCreated(AssetId),
    ElementCreated(ElementId),
    TileCreated(TilePos),
    LinkCreated(LinkId),
}

impl DocumentEvent {
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            Self::ElementRemoved(_) | Self::TileRemoved(_) | Self::LinkRemoved(_) | Self::AssetRemoved(_)
        )
    }
}

/// In-memory host document.
///
/// Records keep insertion order, like the host's own collections, so a
/// capture taken after replaying a state lists records in the order they
/// were created. Links may only be created between elements that exist.
#[derive(Debug, Clone, Default)]
pub struct MapDocument {
    tiles: IndexMap<TilePos, Tile>,
    elements: IndexMap<ElementId, Element>,
    links: IndexMap<LinkId, Link>,
    custom_assets: IndexMap<AssetId, CustomAsset>,
    events: Vec<DocumentEvent>,
    rejecting: bool,
}

impl MapDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document holding `state`. No events are recorded.
    pub fn from_state(state: MapState) -> Result<Self, DocumentError> {
        state.validate()?;
        let mut doc = Self::new();
        for asset in state.custom_assets {
            doc.custom_assets.insert(asset.id.clone(), asset);
        }
        for element in state.elements {
            doc.elements.insert(element.id.clone(), element);
        }
        for tile in state.tiles {
            doc.tiles.insert(tile.pos(), tile);
        }
        for link in state.links {
            doc.links.insert(link.id.clone(), link);
        }
        Ok(doc)
    }

    /// Load a document from a JSON file. A missing file is an empty document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "document file missing, starting empty");
            return Ok(Self::new());
        }
        let state: MapState = serde_json::from_reader(std::fs::File::open(path)?)?;
        Self::from_state(state)
    }

    /// Write the current content to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.state())?;
        debug!(path = %path.display(), items = self.item_count(), "document saved");
        Ok(())
    }

    /// Current content as a value.
    pub fn state(&self) -> MapState {
        MapState {
            tiles: self.tiles.values().cloned().collect(),
            elements: self.elements.values().cloned().collect(),
            links: self.links.values().cloned().collect(),
            custom_assets: self.custom_assets.values().cloned().collect(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.tiles.len() + self.elements.len() + self.links.len() + self.custom_assets.len()
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.tiles.get(&pos)
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn custom_asset(&self, id: &AssetId) -> Option<&CustomAsset> {
        self.custom_assets.get(id)
    }

    /// Make every mutating primitive fail, as a host that lost its
    /// connection would.
    pub fn set_rejecting(&mut self, rejecting: bool) {
        self.rejecting = rejecting;
    }

    /// Drain and return the primitive-call log.
    pub fn drain_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only access to the primitive-call log.
    pub fn events(&self) -> &[DocumentEvent] {
        &self.events
    }

    fn check(&self, op: impl fmt::Display) -> Result<(), DocumentError> {
        if self.rejecting {
            return Err(DocumentError::rejected(op, "document is not accepting changes"));
        }
        Ok(())
    }
}

impl LiveDocument for MapDocument {
    fn capture(&self) -> Result<MapState, DocumentError> {
        Ok(self.state())
    }

    fn remove_element(&mut self, id: &ElementId) -> Result<(), DocumentError> {
        self.check(format_args!("remove element {id}"))?;
        if self.elements.shift_remove(id).is_some() {
            self.events.push(DocumentEvent::ElementRemoved(id.clone()));
        }
        Ok(())
    }

    fn remove_tile(&mut self, pos: TilePos) -> Result<(), DocumentError> {
        self.check(format_args!("remove tile {pos}"))?;
        if self.tiles.shift_remove(&pos).is_some() {
            self.events.push(DocumentEvent::TileRemoved(pos));
        }
        Ok(())
    }

    fn remove_link(&mut self, id: &LinkId) -> Result<(), DocumentError> {
        self.check(format_args!("remove link {id}"))?;
        if self.links.shift_remove(id).is_some() {
            self.events.push(DocumentEvent::LinkRemoved(id.clone()));
        }
        Ok(())
    }

    fn remove_custom_asset(&mut self, id: &AssetId) -> Result<(), DocumentError> {
        self.check(format_args!("remove custom asset {id}"))?;
        if self.custom_assets.shift_remove(id).is_some() {
            self.events.push(DocumentEvent::AssetRemoved(id.clone()));
        }
        Ok(())
    }

    fn create_custom_asset(&mut self, asset: &CustomAsset) -> Result<(), DocumentError> {
        self.check(format_args!("create custom asset {}", asset.id))?;
        self.custom_assets.insert(asset.id.clone(), asset.clone());
        self.events.push(DocumentEvent::AssetCreated(asset.id.clone()));
        Ok(())
    }

    fn create_element(&mut self, element: &Element) -> Result<(), DocumentError> {
        self.check(format_args!("create element {}", element.id))?;
        self.elements.insert(element.id.clone(), element.clone());
        self.events.push(DocumentEvent::ElementCreated(element.id.clone()));
        Ok(())
    }

    fn create_tile(&mut self, tile: &Tile) -> Result<(), DocumentError> {
        let pos = tile.pos();
        self.check(format_args!("create tile {pos}"))?;
        self.tiles.insert(pos, tile.clone());
        self.events.push(DocumentEvent::TileCreated(pos));
        Ok(())
    }

    fn create_link(&mut self, link: &Link) -> Result<(), DocumentError> {
        self.check(format_args!("create link {}", link.id))?;
        for endpoint in [&link.start, &link.end] {
            if !self.elements.contains_key(&endpoint.element) {
                return Err(DocumentError::rejected(
                    format_args!("create link {}", link.id),
                    format!("endpoint element {} does not exist", endpoint.element),
                ));
            }
        }
        self.links.insert(link.id.clone(), link.clone());
        self.events.push(DocumentEvent::LinkCreated(link.id.clone()));
        Ok(())
    }
}
