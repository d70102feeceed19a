//! Live document kernel: the contract mapvc uses to read and rewrite a host
//! map, plus an in-memory host implementation.
//!
//! # Invariants
//! - Capturing never mutates the document.
//! - Removal primitives are idempotent.
//! - All mutations flow through the explicit primitives of [`LiveDocument`].

pub mod document;
pub mod state;

pub use document::{DocumentError, DocumentEvent, LiveDocument, MapDocument};
pub use state::MapState;
