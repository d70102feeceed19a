//! Developer tooling: commit graph for history views, project inspector.
//!
//! # Invariants
//! - Tools only read project data; nothing here writes to a store.

pub mod graph;
pub mod inspector;

pub use graph::{CommitGraph, GraphNode};
pub use inspector::{BranchSummary, ProjectInspector, ProjectSummary};
