use mapvc_common::CommitId;
use mapvc_persist::Project;
use std::fmt;

/// Project inspector for developer tooling.
///
/// Read-only queries against a stored project for debugging and the CLI.
pub struct ProjectInspector;

impl ProjectInspector {
    /// Produce a summary of the project's versioning state.
    pub fn summary(project: &Project) -> ProjectSummary {
        let branches = project
            .branch_names()
            .filter_map(|name| project.branch(name).ok())
            .map(|branch| BranchSummary {
                name: branch.name().to_owned(),
                commits: branch.len(),
                head: branch.head().cloned(),
            })
            .collect();
        ProjectSummary {
            name: project.name().to_owned(),
            current_branch: project.current_branch_name().to_owned(),
            branches,
            stash_count: project.stash().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSummary {
    pub name: String,
    pub commits: usize,
    pub head: Option<CommitId>,
}

/// Summary of a project for the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub name: String,
    pub current_branch: String,
    pub branches: Vec<BranchSummary>,
    pub stash_count: usize,
}

impl ProjectSummary {
    pub fn current(&self) -> Option<&BranchSummary> {
        self.branches.iter().find(|b| b.name == self.current_branch)
    }

    /// Commits on the current branch.
    pub fn commit_count(&self) -> usize {
        self.current().map_or(0, |b| b.commits)
    }
}

impl fmt::Display for ProjectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Project: {} branch={} commits={} stash={} branches={}",
            self.name,
            self.current_branch,
            self.commit_count(),
            self.stash_count,
            self.branches.len()
        )
    }
}

impl fmt::Display for BranchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.head {
            Some(head) => write!(f, "{} ({} commits, head {})", self.name, self.commits, head.short()),
            None => write!(f, "{} (empty)", self.name),
        }
    }
}
