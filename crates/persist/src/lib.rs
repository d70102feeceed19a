//! Persistence: snapshots, the project/branch/commit model, and project
//! storage over a string key-value store.
//!
//! # Invariants
//! - Snapshots are immutable once stored in a commit or stash entry.
//! - A branch's history is append-only; commits are never edited.
//! - A project's current branch always exists, and every head resolves to a
//!   commit in its own branch's history.
//! - Applying a snapshot removes everything before creating anything.

pub mod kv;
pub mod project;
pub mod snapshot;
pub mod store;

pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use project::{Branch, Commit, MAIN_BRANCH, ModelError, Project, StashEntry};
pub use snapshot::{ApplyReport, ItemFailure, Snapshot, SyncOp, SyncPlan};
pub use store::{DEFAULT_PREFIX, ProjectStore, StoreError};
