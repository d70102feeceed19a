//! Shared identifiers and map record types.
//!
//! Records mirror what the host map exposes: terrain tiles, placed elements,
//! links between elements, and custom assets. Fields this crate does not
//! interpret are kept opaque so they survive a capture/apply round trip.

pub mod records;
pub mod types;

pub use records::{CustomAsset, Element, Endpoint, Link, Tile};
pub use types::{AssetId, CommitId, ElementId, LinkId, SHORT_ID_LEN, StashId, TilePos};
