//! Project, branch, commit and stash records.
//!
//! Commits are stored once per project in a table keyed by id. A branch is
//! an ordered list of commit ids plus a head pointer, so forking a branch
//! copies ids rather than commit payloads. Each branch still enumerates its
//! own complete history.

use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use mapvc_common::{CommitId, StashId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Name of the branch every project starts with.
pub const MAIN_BRANCH: &str = "main";

/// Violations of the project model's invariants.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("branch not found: {0}")]
    BranchNotFound(String),
    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),
    #[error("commit not found: {0}")]
    CommitNotFound(CommitId),
    #[error("commit id already used: {0}")]
    CommitExists(CommitId),
    #[error("corrupt project record: {0}")]
    Corrupt(String),
}

/// A named, timestamped snapshot linked to the commit that was head when it
/// was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub parent: Option<CommitId>,
    pub state: Snapshot,
}

impl Commit {
    pub fn new(message: impl Into<String>, parent: Option<CommitId>, state: Snapshot) -> Self {
        Self {
            id: CommitId::generate(),
            message: message.into(),
            timestamp: Utc::now(),
            parent,
            state,
        }
    }
}

/// An uncommitted snapshot put aside by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashEntry {
    pub id: StashId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub state: Snapshot,
}

impl StashEntry {
    pub fn new(message: impl Into<String>, state: Snapshot) -> Self {
        Self {
            id: StashId::generate(),
            message: message.into(),
            timestamp: Utc::now(),
            state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    name: String,
    commits: Vec<CommitId>,
    head: Option<CommitId>,
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commits: Vec::new(),
            head: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Commit ids in the order they were added.
    pub fn commit_ids(&self) -> &[CommitId] {
        &self.commits
    }

    pub fn head(&self) -> Option<&CommitId> {
        self.head.as_ref()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn contains(&self, id: &CommitId) -> bool {
        self.commits.contains(id)
    }
}

/// The root of all versioning state for one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    name: String,
    current_branch: String,
    branches: IndexMap<String, Branch>,
    #[serde(default)]
    commits: BTreeMap<CommitId, Commit>,
    #[serde(default)]
    stash: Vec<StashEntry>,
}

impl Project {
    /// A fresh project with an empty `main` branch and an empty stash.
    pub fn new(name: impl Into<String>) -> Self {
        let mut branches = IndexMap::new();
        branches.insert(MAIN_BRANCH.to_owned(), Branch::new(MAIN_BRANCH));
        Self {
            name: name.into(),
            current_branch: MAIN_BRANCH.to_owned(),
            branches,
            commits: BTreeMap::new(),
            stash: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_branch_name(&self) -> &str {
        &self.current_branch
    }

    pub fn current_branch(&self) -> Result<&Branch, ModelError> {
        self.branch(&self.current_branch)
    }

    pub fn branch(&self, name: &str) -> Result<&Branch, ModelError> {
        self.branches
            .get(name)
            .ok_or_else(|| ModelError::BranchNotFound(name.to_owned()))
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// Branch names in creation order.
    pub fn branch_names(&self) -> impl Iterator<Item = &str> {
        self.branches.keys().map(String::as_str)
    }

    pub fn commit(&self, id: &CommitId) -> Option<&Commit> {
        self.commits.get(id)
    }

    /// Full history of a branch, oldest first.
    pub fn branch_log(&self, name: &str) -> Result<Vec<&Commit>, ModelError> {
        let branch = self.branch(name)?;
        branch
            .commits
            .iter()
            .map(|id| {
                self.commits
                    .get(id)
                    .ok_or_else(|| ModelError::CommitNotFound(id.clone()))
            })
            .collect()
    }

    /// Look up a commit that belongs to the current branch.
    pub fn find_in_current(&self, id: &CommitId) -> Result<&Commit, ModelError> {
        let branch = self.current_branch()?;
        if !branch.contains(id) {
            return Err(ModelError::CommitNotFound(id.clone()));
        }
        self.commit(id)
            .ok_or_else(|| ModelError::CommitNotFound(id.clone()))
    }

    /// The commit the current branch's head points at, if any.
    pub fn head_commit(&self) -> Result<Option<&Commit>, ModelError> {
        let branch = self.current_branch()?;
        Ok(branch.head.as_ref().and_then(|id| self.commits.get(id)))
    }

    /// Append a commit to the current branch and move its head there.
    pub fn record_commit(&mut self, commit: Commit) -> Result<&Commit, ModelError> {
        if self.commits.contains_key(&commit.id) {
            return Err(ModelError::CommitExists(commit.id));
        }
        let branch = self
            .branches
            .get_mut(&self.current_branch)
            .ok_or_else(|| ModelError::BranchNotFound(self.current_branch.clone()))?;
        let id = commit.id.clone();
        branch.commits.push(id.clone());
        branch.head = Some(id.clone());
        Ok(self.commits.entry(id).or_insert(commit))
    }

    /// Point the current branch's head at one of its commits.
    pub fn move_head(&mut self, id: &CommitId) -> Result<(), ModelError> {
        let branch = self
            .branches
            .get_mut(&self.current_branch)
            .ok_or_else(|| ModelError::BranchNotFound(self.current_branch.clone()))?;
        if !branch.commits.contains(id) {
            return Err(ModelError::CommitNotFound(id.clone()));
        }
        branch.head = Some(id.clone());
        Ok(())
    }

    /// Create `name` as a copy of the current branch's history and head.
    /// The current branch does not change.
    pub fn fork_branch(&mut self, name: &str) -> Result<&Branch, ModelError> {
        if self.branches.contains_key(name) {
            return Err(ModelError::BranchAlreadyExists(name.to_owned()));
        }
        let source = self.current_branch()?;
        let fork = Branch {
            name: name.to_owned(),
            commits: source.commits.clone(),
            head: source.head.clone(),
        };
        Ok(self.branches.entry(name.to_owned()).or_insert(fork))
    }

    pub fn set_current_branch(&mut self, name: &str) -> Result<&Branch, ModelError> {
        if !self.branches.contains_key(name) {
            return Err(ModelError::BranchNotFound(name.to_owned()));
        }
        self.current_branch = name.to_owned();
        self.branch(name)
    }

    /// Stash entries, most recent first.
    pub fn stash(&self) -> &[StashEntry] {
        &self.stash
    }

    pub fn push_stash(&mut self, entry: StashEntry) {
        self.stash.insert(0, entry);
    }

    /// Remove and return the most recent stash entry.
    pub fn pop_stash(&mut self) -> Option<StashEntry> {
        if self.stash.is_empty() {
            return None;
        }
        Some(self.stash.remove(0))
    }

    pub fn remove_stash(&mut self, index: usize) -> Option<StashEntry> {
        if index >= self.stash.len() {
            return None;
        }
        Some(self.stash.remove(index))
    }

    /// Check the structural invariants of a record read from storage.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.branches.contains_key(&self.current_branch) {
            return Err(ModelError::Corrupt(format!(
                "current branch {} does not exist",
                self.current_branch
            )));
        }
        if !self.branches.contains_key(MAIN_BRANCH) {
            return Err(ModelError::Corrupt("missing main branch".into()));
        }
        for (key, branch) in &self.branches {
            if key != &branch.name {
                return Err(ModelError::Corrupt(format!(
                    "branch {} stored under key {key}",
                    branch.name
                )));
            }
            let mut seen = HashSet::new();
            for id in &branch.commits {
                if !self.commits.contains_key(id) {
                    return Err(ModelError::Corrupt(format!(
                        "branch {key} references missing commit {id}"
                    )));
                }
                if !seen.insert(id) {
                    return Err(ModelError::Corrupt(format!(
                        "branch {key} lists commit {id} twice"
                    )));
                }
            }
            if let Some(head) = &branch.head {
                if !seen.contains(head) {
                    return Err(ModelError::Corrupt(format!(
                        "branch {key} head {head} is not in its history"
                    )));
                }
            }
        }
        Ok(())
    }
}
