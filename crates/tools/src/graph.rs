use chrono::{DateTime, Utc};
use mapvc_common::CommitId;
use mapvc_persist::Commit;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// One commit as shown in the history view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: CommitId,
    pub short_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_head: bool,
    pub parent: Option<CommitId>,
    /// Commits in the same input whose parent is this one, oldest first.
    pub children: Vec<CommitId>,
}

/// Display model of a branch history. Building it never touches the project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitGraph {
    nodes: Vec<GraphNode>,
}

impl CommitGraph {
    /// Build the graph from commits given oldest first (as a branch log is).
    /// Nodes come out newest first, in exact reverse of the input order;
    /// timestamps are not consulted.
    pub fn build<'a>(
        commits: impl IntoIterator<Item = &'a Commit>,
        head: Option<&CommitId>,
    ) -> Self {
        let commits: Vec<&Commit> = commits.into_iter().collect();

        let mut children: HashMap<&CommitId, Vec<CommitId>> = HashMap::new();
        for commit in &commits {
            if let Some(parent) = &commit.parent {
                children.entry(parent).or_default().push(commit.id.clone());
            }
        }

        let nodes: Vec<GraphNode> = commits
            .iter()
            .rev()
            .map(|commit| GraphNode {
                id: commit.id.clone(),
                short_id: commit.id.short().to_owned(),
                message: commit.message.clone(),
                timestamp: commit.timestamp,
                is_head: head == Some(&commit.id),
                parent: commit.parent.clone(),
                children: children.remove(&commit.id).unwrap_or_default(),
            })
            .collect();

        debug!(nodes = nodes.len(), "commit graph built");
        Self { nodes }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn head(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.is_head)
    }

    /// Text rendering with one rail, newest at the top. A node whose parent
    /// is not the node drawn below it names its parent explicitly.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CommitGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return writeln!(f, "(no commits)");
        }

        for (i, node) in self.nodes.iter().enumerate() {
            let below = self.nodes.get(i + 1);
            let head = if node.is_head { " (HEAD)" } else { "" };
            let rail = if below.is_some() { "│" } else { " " };

            writeln!(f, "● {}{head} {}", node.short_id, node.message)?;
            writeln!(f, "{rail}   {}", node.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
            if let Some(parent) = &node.parent {
                if below.map(|b| &b.id) != Some(parent) {
                    writeln!(f, "{rail}   parent {}", parent.short())?;
                }
            }
            if below.is_some() {
                writeln!(f, "│")?;
            }
        }
        Ok(())
    }
}
