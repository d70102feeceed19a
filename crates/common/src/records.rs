use crate::types::{AssetId, ElementId, LinkId, TilePos};
use glam::DVec2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A terrain tile. Only the position is interpreted; every other field the
/// host attaches, terrain included, is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub depth: i32,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Tile {
    pub fn new(pos: TilePos, terrain: impl Into<String>) -> Self {
        let mut attributes = Map::new();
        attributes.insert("terrain".to_owned(), Value::String(terrain.into()));
        Self {
            x: pos.x,
            y: pos.y,
            depth: pos.depth,
            attributes,
        }
    }

    pub fn pos(&self) -> TilePos {
        TilePos::new(self.x, self.y, self.depth)
    }
}

/// A placed element (a "device" on the host map).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    pub type_id: String,
    /// Serialized option payload, stored exactly as the host produced it.
    pub options: String,
    /// Host coordinates, kept at full double precision.
    pub position: DVec2,
}

impl Element {
    pub fn new(id: impl Into<ElementId>, type_id: impl Into<String>, position: DVec2) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            options: "{}".into(),
            position,
        }
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }
}

/// One end of a link: an element and the named connection point on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub element: ElementId,
    pub connection: String,
}

impl Endpoint {
    pub fn new(element: impl Into<ElementId>, connection: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            connection: connection.into(),
        }
    }
}

/// A connector ("wire") between two elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub start: Endpoint,
    pub end: Endpoint,
}

impl Link {
    pub fn new(id: impl Into<LinkId>, start: Endpoint, end: Endpoint) -> Self {
        Self {
            id: id.into(),
            start,
            end,
        }
    }
}

/// A user-supplied asset with its embedded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAsset {
    pub id: AssetId,
    #[serde(default)]
    pub name: String,
    pub data: Value,
}

impl CustomAsset {
    pub fn new(id: impl Into<AssetId>, name: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data,
        }
    }
}
