use mapvc_common::CommitId;
use mapvc_kernel::DocumentError;
use mapvc_persist::{ApplyReport, ModelError, StoreError};

/// Why the live document could not be brought in line with a stored state.
#[derive(Debug, thiserror::Error)]
pub enum SyncFailure {
    #[error("could not read the live document: {0}")]
    Capture(#[from] DocumentError),
    #[error("document update incomplete: {report}")]
    Apply { report: ApplyReport },
}

/// Errors from versioning operations. All of them are recoverable: the
/// operation did not happen and the user is told why.
#[derive(Debug, thiserror::Error)]
pub enum VcError {
    #[error("No project selected")]
    NoProjectSelected,
    #[error("Project not found: {0}")]
    ProjectNotFound(String),
    #[error("Project already exists: {0}")]
    ProjectAlreadyExists(String),
    #[error("Commit not found: {0}")]
    CommitNotFound(CommitId),
    #[error("Branch not found: {0}")]
    BranchNotFound(String),
    #[error("Branch already exists: {0}")]
    BranchAlreadyExists(String),
    #[error("No stash entries")]
    EmptyStash,
    #[error("Invalid stash index {index} (stash has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Invalid {what}: name must not be empty")]
    InvalidName { what: &'static str },
    #[error("Project data is inconsistent: {0}")]
    Inconsistent(ModelError),
    #[error("Storage failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("Live document sync failed: {0}")]
    DocumentSync(#[from] SyncFailure),
}

impl From<ModelError> for VcError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::BranchNotFound(name) => Self::BranchNotFound(name),
            ModelError::BranchAlreadyExists(name) => Self::BranchAlreadyExists(name),
            ModelError::CommitNotFound(id) => Self::CommitNotFound(id),
            other => Self::Inconsistent(other),
        }
    }
}

impl From<DocumentError> for VcError {
    fn from(err: DocumentError) -> Self {
        Self::DocumentSync(SyncFailure::Capture(err))
    }
}
