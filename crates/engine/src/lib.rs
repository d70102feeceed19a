//! Versioning engine: commits, checkout, branches and stash over a live map
//! document, with one project selected at a time.
//!
//! # Invariants
//! - A failed operation writes nothing: the project record is saved once, at
//!   the end, and only when every step before it succeeded.
//! - Checkout and branch switch never create commits.
//! - The live document is only overwritten by checkout, branch switch,
//!   project selection and stash pop.
//! - Every mutating operation emits exactly one notice.

pub mod config;
pub mod engine;
pub mod error;
pub mod notify;

pub use config::{EngineConfig, SwitchPolicy};
pub use engine::{ProjectStatus, VersionControl};
pub use error::{SyncFailure, VcError};
pub use notify::{Notice, NoticeKind, Notifier, RecordingNotifier, TracingNotifier};
