use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of the abbreviated id shown in histories.
pub const SHORT_ID_LEN: usize = 7;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Host-assigned identifier of a placed element.
    ElementId
}

string_id! {
    /// Host-assigned identifier of a link between two elements.
    LinkId
}

string_id! {
    /// Host-assigned identifier of a custom asset.
    AssetId
}

string_id! {
    /// Identifier of a commit. Unique within a project.
    CommitId
}

string_id! {
    /// Identifier of a stash entry.
    StashId
}

impl CommitId {
    /// Generate a fresh commit id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Abbreviated form used in history listings.
    pub fn short(&self) -> &str {
        truncate(&self.0, SHORT_ID_LEN)
    }
}

impl StashId {
    /// Generate a fresh stash id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

fn truncate(s: &str, len: usize) -> &str {
    match s.char_indices().nth(len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Grid position of a terrain tile. Tiles have no id of their own; the
/// position is their identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
    pub depth: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32, depth: i32) -> Self {
        Self { x, y, depth }
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, depth {})", self.x, self.y, self.depth)
    }
}
