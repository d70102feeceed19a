use crate::config::{EngineConfig, SwitchPolicy};
use crate::error::{SyncFailure, VcError};
use crate::notify::{Notice, Notifier, TracingNotifier};
use mapvc_common::{CommitId, StashId};
use mapvc_kernel::LiveDocument;
use mapvc_persist::{
    ApplyReport, Commit, KeyValueStore, Project, ProjectStore, Snapshot, StashEntry, StoreError,
    SyncPlan,
};
use std::fmt;
use tracing::{debug, info, warn};

/// Where the selected project stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStatus {
    pub project: String,
    pub branch: String,
    pub head: Option<CommitId>,
    pub head_message: Option<String>,
    pub commit_count: usize,
    pub branch_count: usize,
    pub stash_count: usize,
    /// Whether the live document differs from the head state (or from an
    /// empty map when the branch has no head).
    pub dirty: bool,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Project: {}", self.project)?;
        writeln!(f, "Branch:  {}", self.branch)?;
        match (&self.head, &self.head_message) {
            (Some(id), Some(message)) => writeln!(f, "HEAD:    {} {message}", id.short())?,
            _ => writeln!(f, "HEAD:    (no commits)")?,
        }
        writeln!(f, "Commits: {}", self.commit_count)?;
        writeln!(f, "Stashed: {}", self.stash_count)?;
        write!(
            f,
            "Working map: {}",
            if self.dirty { "modified" } else { "clean" }
        )
    }
}

/// The versioning engine.
///
/// Owns the project store, a handle to the live document, and the notifier.
/// Every operation reloads the project, changes an in-memory copy, and
/// writes it back once at the end; an error anywhere drops the copy, so a
/// failed operation never leaves a partial commit or stash entry behind.
/// Each mutating operation reports its outcome through the notifier.
pub struct VersionControl<S, D, N = TracingNotifier> {
    store: ProjectStore<S>,
    document: D,
    notifier: N,
    config: EngineConfig,
}

impl<S: KeyValueStore, D: LiveDocument, N: Notifier> VersionControl<S, D, N> {
    pub fn new(kv: S, document: D, notifier: N, config: EngineConfig) -> Self {
        let store = ProjectStore::with_prefix(kv, config.key_prefix.clone());
        Self {
            store,
            document,
            notifier,
            config,
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn store(&self) -> &ProjectStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ProjectStore<S> {
        &mut self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, D, N) {
        (self.store.into_inner(), self.document, self.notifier)
    }

    // --- Projects ---

    /// Register a new project, make it current, and persist it.
    pub fn create_project(&mut self, name: &str) -> Result<(), VcError> {
        let result = self.try_create_project(name.trim());
        self.announce(result, |_| format!("Created project: {}", name.trim()))
    }

    /// Make a registered project current and load its head state into the
    /// live document. Returns the head that was applied, if any.
    pub fn select_project(&mut self, name: &str) -> Result<Option<CommitId>, VcError> {
        let result = self.try_select_project(name);
        self.announce(result, |_| format!("Switched to: {name}"))
    }

    pub fn list_projects(&self) -> Result<Vec<String>, VcError> {
        Ok(self.store.list_projects()?)
    }

    /// The current project as stored.
    pub fn current_project(&self) -> Result<Project, VcError> {
        let name = self.require_project()?;
        Ok(self.store.load_project(&name)?)
    }

    /// Delete the current project and everything stored for it.
    pub fn delete_project(&mut self) -> Result<String, VcError> {
        let result = self.try_delete_project();
        self.announce(result, |name| format!("Deleted project: {name}"))
    }

    // --- Commits ---

    /// Snapshot the live document onto the current branch. An empty message
    /// falls back to the configured default.
    pub fn commit(&mut self, message: &str) -> Result<CommitId, VcError> {
        let result = self.try_commit(message);
        self.announce_with(result)
    }

    /// Replace the live document with a commit of the current branch and
    /// move the head there. No new commit is created.
    pub fn checkout(&mut self, id: &CommitId) -> Result<(), VcError> {
        let result = self.try_checkout(id);
        self.announce_with(result)
    }

    /// What checking out `id` would do to the live document, without doing it.
    pub fn plan_checkout(&self, id: &CommitId) -> Result<SyncPlan, VcError> {
        let project = self.current_project()?;
        let commit = project.find_in_current(id)?;
        let current = self.document.capture()?;
        Ok(SyncPlan::between(&current, commit.state.state()))
    }

    /// History of the current branch, oldest first.
    pub fn log(&self) -> Result<Vec<Commit>, VcError> {
        let project = self.current_project()?;
        let log = project.branch_log(project.current_branch_name())?;
        Ok(log.into_iter().cloned().collect())
    }

    // --- Branches ---

    /// Fork the current branch under `name`. The current branch is unchanged.
    pub fn create_branch(&mut self, name: &str) -> Result<(), VcError> {
        let result = self.try_create_branch(name.trim());
        self.announce(result, |_| format!("Created branch: {}", name.trim()))
    }

    /// Make `name` the current branch and load its head, if it has one. An
    /// empty branch leaves the live document as it is.
    pub fn switch_branch(&mut self, name: &str) -> Result<(), VcError> {
        let result = self.try_switch_branch(name);
        self.announce(result, |_| format!("Switched to branch: {name}"))
    }

    pub fn list_branches(&self) -> Result<Vec<String>, VcError> {
        let project = self.current_project()?;
        Ok(project.branch_names().map(str::to_owned).collect())
    }

    // --- Stash ---

    /// Put the live document on top of the stash.
    pub fn stash_save(&mut self, message: &str) -> Result<StashId, VcError> {
        let result = self.try_stash_save(message);
        self.announce_with(result)
    }

    /// Remove the most recent stash entry and load it into the live document.
    pub fn stash_pop(&mut self) -> Result<StashEntry, VcError> {
        let result = self.try_stash_pop();
        self.announce(result, |entry| format!("Applied stash: {}", entry.message))
    }

    /// Drop one stash entry without applying it.
    pub fn delete_stash(&mut self, index: usize) -> Result<StashEntry, VcError> {
        let result = self.try_delete_stash(index);
        self.announce(result, |entry| format!("Deleted stash: {}", entry.message))
    }

    /// Stash entries, most recent first.
    pub fn stash_list(&self) -> Result<Vec<StashEntry>, VcError> {
        Ok(self.current_project()?.stash().to_vec())
    }

    pub fn status(&self) -> Result<ProjectStatus, VcError> {
        let project = self.current_project()?;
        let branch = project.current_branch()?;
        let head = project.head_commit()?;
        let dirty = self.is_dirty(head.map(|c| &c.state))?;
        Ok(ProjectStatus {
            project: project.name().to_owned(),
            branch: branch.name().to_owned(),
            head: head.map(|c| c.id.clone()),
            head_message: head.map(|c| c.message.clone()),
            commit_count: branch.len(),
            branch_count: project.branch_names().count(),
            stash_count: project.stash().len(),
            dirty,
        })
    }

    // --- Operation bodies ---

    fn try_create_project(&mut self, name: &str) -> Result<(), VcError> {
        if name.is_empty() {
            return Err(VcError::InvalidName { what: "project name" });
        }
        if self.store.list_projects()?.iter().any(|n| n == name) {
            return Err(VcError::ProjectAlreadyExists(name.to_owned()));
        }
        let project = self.store.load_project(name)?;
        self.store.register_project(&project)?;
        Ok(())
    }

    fn try_select_project(&mut self, name: &str) -> Result<Option<CommitId>, VcError> {
        if !self.store.list_projects()?.iter().any(|n| n == name) {
            return Err(VcError::ProjectNotFound(name.to_owned()));
        }
        let project = self.store.load_project(name)?;
        let head = project.head_commit()?;
        if let Some(commit) = head {
            self.replay(&commit.state)?;
        }
        self.store.set_current_project_name(name)?;
        info!(project = name, branch = project.current_branch_name(), "project selected");
        Ok(head.map(|c| c.id.clone()))
    }

    fn try_delete_project(&mut self) -> Result<String, VcError> {
        let name = self.require_project()?;
        self.store.delete_project(&name)?;
        Ok(name)
    }

    fn try_commit(&mut self, message: &str) -> Result<(CommitId, String), VcError> {
        let name = self.require_project()?;
        let mut project = self.store.load_project(&name)?;
        let state = Snapshot::capture(&self.document)?;
        let parent = project.current_branch()?.head().cloned();
        let message = or_default(message, &self.config.default_commit_message);

        let commit = project.record_commit(Commit::new(message, parent, state))?;
        let id = commit.id.clone();
        let text = format!("Committed: {}", commit.message);
        self.store.save_project(&project)?;
        info!(
            project = %name,
            branch = project.current_branch_name(),
            commit = id.short(),
            "committed"
        );
        Ok((id, text))
    }

    fn try_checkout(&mut self, id: &CommitId) -> Result<((), String), VcError> {
        let name = self.require_project()?;
        let mut project = self.store.load_project(&name)?;
        let commit = project.find_in_current(id)?;
        let (state, message) = (commit.state.clone(), commit.message.clone());

        self.before_switch(&mut project, "checkout")?;
        self.replay(&state)?;
        project.move_head(id)?;
        self.store.save_project(&project)?;
        info!(project = %name, commit = id.short(), "checked out");
        Ok(((), format!("Checked out: {message}")))
    }

    fn try_create_branch(&mut self, branch: &str) -> Result<(), VcError> {
        if branch.is_empty() {
            return Err(VcError::InvalidName { what: "branch name" });
        }
        let name = self.require_project()?;
        let mut project = self.store.load_project(&name)?;
        let fork = project.fork_branch(branch)?;
        debug!(branch, commits = fork.len(), "branch forked");
        self.store.save_project(&project)?;
        Ok(())
    }

    fn try_switch_branch(&mut self, branch: &str) -> Result<(), VcError> {
        let name = self.require_project()?;
        let mut project = self.store.load_project(&name)?;
        let target = project
            .branch(branch)?
            .head()
            .and_then(|id| project.commit(id))
            .map(|c| c.state.clone());
        // Empty target branch: the document is not overwritten.
        if let Some(state) = &target {
            self.before_switch(&mut project, "branch switch")?;
            project.set_current_branch(branch)?;
            self.replay(state)?;
        } else {
            project.set_current_branch(branch)?;
        }
        self.store.save_project(&project)?;
        info!(project = %name, branch, "switched branch");
        Ok(())
    }

    fn try_stash_save(&mut self, message: &str) -> Result<(StashId, String), VcError> {
        let name = self.require_project()?;
        let mut project = self.store.load_project(&name)?;
        let state = Snapshot::capture(&self.document)?;
        let message = or_default(message, &self.config.default_stash_message);
        let entry = StashEntry::new(message, state);
        let id = entry.id.clone();
        let text = format!("Stashed: {}", entry.message);
        project.push_stash(entry);
        self.store.save_project(&project)?;
        debug!(project = %name, depth = project.stash().len(), "stashed");
        Ok((id, text))
    }

    fn try_stash_pop(&mut self) -> Result<StashEntry, VcError> {
        let name = self.require_project()?;
        let mut project = self.store.load_project(&name)?;
        let entry = project.pop_stash().ok_or(VcError::EmptyStash)?;
        self.before_switch(&mut project, "stash pop")?;
        self.replay(&entry.state)?;
        self.store.save_project(&project)?;
        Ok(entry)
    }

    fn try_delete_stash(&mut self, index: usize) -> Result<StashEntry, VcError> {
        let name = self.require_project()?;
        let mut project = self.store.load_project(&name)?;
        let len = project.stash().len();
        let entry = project
            .remove_stash(index)
            .ok_or(VcError::IndexOutOfRange { index, len })?;
        self.store.save_project(&project)?;
        Ok(entry)
    }

    // --- Helpers ---

    fn require_project(&self) -> Result<String, VcError> {
        self.store
            .current_project_name()?
            .ok_or(VcError::NoProjectSelected)
    }

    /// Apply a stored state to the live document. Any refused primitive call
    /// fails the whole operation so the caller skips its metadata write.
    fn replay(&mut self, snapshot: &Snapshot) -> Result<ApplyReport, VcError> {
        let report = snapshot.apply(&mut self.document)?;
        if !report.is_clean() {
            return Err(SyncFailure::Apply { report }.into());
        }
        debug!(removed = report.removed, created = report.created, "state applied");
        Ok(report)
    }

    fn is_dirty(&self, head: Option<&Snapshot>) -> Result<bool, VcError> {
        let live = Snapshot::capture(&self.document)?;
        let live = live.digest().map_err(StoreError::from)?;
        let base = match head {
            Some(state) => state.digest(),
            None => Snapshot::default().digest(),
        }
        .map_err(StoreError::from)?;
        Ok(live != base)
    }

    /// Hook run before an operation overwrites the live document.
    fn before_switch(&mut self, project: &mut Project, operation: &str) -> Result<(), VcError> {
        match self.config.switch_policy {
            SwitchPolicy::Discard => Ok(()),
            SwitchPolicy::AutoStash => {
                let head = project.head_commit()?.map(|c| c.state.clone());
                if !self.is_dirty(head.as_ref())? {
                    return Ok(());
                }
                let state = Snapshot::capture(&self.document)?;
                project.push_stash(StashEntry::new(format!("auto-stash before {operation}"), state));
                info!(project = project.name(), operation, "unsaved edits auto-stashed");
                Ok(())
            }
        }
    }

    fn announce<T>(
        &self,
        result: Result<T, VcError>,
        describe: impl FnOnce(&T) -> String,
    ) -> Result<T, VcError> {
        match result {
            Ok(value) => {
                self.notifier.notify(Notice::success(describe(&value)));
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "operation failed");
                self.notifier.notify(Notice::error(err.to_string()));
                Err(err)
            }
        }
    }

    fn announce_with<T>(&self, result: Result<(T, String), VcError>) -> Result<T, VcError> {
        self.announce(result, |(_, text)| text.clone())
            .map(|(value, _)| value)
    }
}

fn or_default<'a>(message: &'a str, default: &'a str) -> &'a str {
    let trimmed = message.trim();
    if trimmed.is_empty() { default } else { trimmed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NoticeKind, RecordingNotifier};
    use glam::DVec2;
    use mapvc_common::{Element, ElementId, Endpoint, Link, Tile, TilePos};
    use mapvc_kernel::MapDocument;
    use mapvc_persist::{MAIN_BRANCH, MemoryStore};

    type Vc = VersionControl<MemoryStore, MapDocument, RecordingNotifier>;

    fn engine_with(config: EngineConfig) -> Vc {
        VersionControl::new(
            MemoryStore::new(),
            MapDocument::new(),
            RecordingNotifier::new(),
            config,
        )
    }

    fn engine() -> Vc {
        engine_with(EngineConfig::default())
    }

    fn project(name: &str) -> Vc {
        let mut vc = engine();
        vc.create_project(name).unwrap();
        vc
    }

    fn place(vc: &mut Vc, id: &str) {
        vc.document_mut()
            .create_element(&Element::new(id, "button", DVec2::new(1.0, 2.0)))
            .unwrap();
    }

    fn has(vc: &Vc, id: &str) -> bool {
        vc.document().element(&ElementId::from(id)).is_some()
    }

    #[test]
    fn operations_without_project_fail_and_write_nothing() {
        let mut vc = engine();
        place(&mut vc, "a");

        assert!(matches!(vc.commit("x"), Err(VcError::NoProjectSelected)));
        assert!(matches!(
            vc.checkout(&CommitId::from("abc")),
            Err(VcError::NoProjectSelected)
        ));
        assert!(matches!(vc.create_branch("b"), Err(VcError::NoProjectSelected)));
        assert!(matches!(vc.switch_branch("main"), Err(VcError::NoProjectSelected)));
        assert!(matches!(vc.stash_save(""), Err(VcError::NoProjectSelected)));
        assert!(matches!(vc.stash_pop(), Err(VcError::NoProjectSelected)));
        assert!(matches!(vc.delete_stash(0), Err(VcError::NoProjectSelected)));
        assert!(matches!(vc.delete_project(), Err(VcError::NoProjectSelected)));

        assert!(vc.store().kv().is_empty());
        assert!(has(&vc, "a"));
        let notices = vc.notifier().notices();
        assert_eq!(notices.len(), 8);
        assert!(notices.iter().all(|n| n.kind == NoticeKind::Error && n.text == "No project selected"));
    }

    #[test]
    fn commits_chain_parents_in_order() {
        let mut vc = project("Demo");
        let mut ids = Vec::new();
        for i in 0..5 {
            place(&mut vc, &format!("e{i}"));
            ids.push(vc.commit(&format!("commit {i}")).unwrap());
        }

        let log = vc.log().unwrap();
        assert_eq!(log.len(), 5);
        assert_eq!(log[0].parent, None);
        for (prev, commit) in log.iter().zip(log.iter().skip(1)) {
            assert_eq!(commit.parent.as_ref(), Some(&prev.id));
        }
        let status = vc.status().unwrap();
        assert_eq!(status.head.as_ref(), ids.last());
        assert_eq!(status.commit_count, 5);
    }

    #[test]
    fn empty_commit_message_uses_default() {
        let mut vc = project("Demo");
        vc.commit("   ").unwrap();
        assert_eq!(vc.log().unwrap()[0].message, "Untitled commit");
        assert_eq!(
            vc.notifier().last(),
            Some(Notice::success("Committed: Untitled commit"))
        );
    }

    #[test]
    fn checkout_restores_committed_state() {
        let mut vc = project("Demo");
        place(&mut vc, "a");
        let first = vc.commit("first").unwrap();
        place(&mut vc, "b");
        vc.commit("second").unwrap();

        vc.checkout(&first).unwrap();

        let log = vc.log().unwrap();
        assert_eq!(log.len(), 2, "checkout must not create a commit");
        let live = Snapshot::capture(vc.document()).unwrap();
        assert_eq!(live, log[0].state);
        assert!(!has(&vc, "b"));
        assert_eq!(vc.status().unwrap().head, Some(first));
        assert_eq!(vc.notifier().last(), Some(Notice::success("Checked out: first")));
    }

    #[test]
    fn checkout_discards_unsaved_edits_by_default() {
        let mut vc = project("Demo");
        let first = vc.commit("empty").unwrap();
        place(&mut vc, "unsaved");
        vc.checkout(&first).unwrap();
        assert!(!has(&vc, "unsaved"));
        assert!(vc.stash_list().unwrap().is_empty());
    }

    #[test]
    fn checkout_unknown_commit_leaves_everything_alone() {
        let mut vc = project("Demo");
        place(&mut vc, "a");
        let head = vc.commit("init").unwrap();
        place(&mut vc, "b");
        vc.document_mut().drain_events();

        let err = vc.checkout(&CommitId::from("missing")).unwrap_err();
        assert!(matches!(err, VcError::CommitNotFound(_)));
        assert!(vc.document().events().is_empty());
        assert!(has(&vc, "b"));
        assert_eq!(vc.status().unwrap().head, Some(head));
    }

    #[test]
    fn new_commit_after_checkout_parents_on_checked_out_commit() {
        let mut vc = project("Demo");
        let first = vc.commit("one").unwrap();
        vc.commit("two").unwrap();
        vc.checkout(&first).unwrap();
        vc.commit("three").unwrap();

        let log = vc.log().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].parent, Some(first));
    }

    #[test]
    fn fork_keeps_history_at_fork_time() {
        let mut vc = project("Demo");
        vc.commit("one").unwrap();
        let fork_head = vc.commit("two").unwrap();
        vc.create_branch("feature").unwrap();
        vc.commit("three on main").unwrap();

        vc.switch_branch("feature").unwrap();
        let status = vc.status().unwrap();
        assert_eq!(status.branch, "feature");
        assert_eq!(status.head, Some(fork_head));
        assert_eq!(status.commit_count, 2);
    }

    #[test]
    fn create_branch_does_not_switch() {
        let mut vc = project("Demo");
        vc.create_branch("feature").unwrap();
        assert_eq!(vc.status().unwrap().branch, MAIN_BRANCH);
        assert_eq!(vc.list_branches().unwrap(), [MAIN_BRANCH, "feature"]);
    }

    #[test]
    fn duplicate_or_empty_branch_name_rejected() {
        let mut vc = project("Demo");
        vc.create_branch("feature").unwrap();
        assert!(matches!(
            vc.create_branch("feature"),
            Err(VcError::BranchAlreadyExists(_))
        ));
        assert!(matches!(
            vc.create_branch(MAIN_BRANCH),
            Err(VcError::BranchAlreadyExists(_))
        ));
        assert!(matches!(vc.create_branch(" "), Err(VcError::InvalidName { .. })));
        assert_eq!(vc.list_branches().unwrap().len(), 2);
    }

    #[test]
    fn switch_to_missing_branch_fails() {
        let mut vc = project("Demo");
        assert!(matches!(
            vc.switch_branch("nope"),
            Err(VcError::BranchNotFound(_))
        ));
        assert_eq!(vc.status().unwrap().branch, MAIN_BRANCH);
    }

    #[test]
    fn switch_to_empty_branch_leaves_document() {
        let mut vc = project("Demo");
        vc.create_branch("scratch").unwrap();
        place(&mut vc, "a");
        vc.document_mut().drain_events();

        vc.switch_branch("scratch").unwrap();
        assert!(has(&vc, "a"));
        assert!(vc.document().events().is_empty());
        assert_eq!(vc.status().unwrap().branch, "scratch");
    }

    #[test]
    fn stash_save_then_pop_restores_document() {
        let mut vc = project("Demo");
        vc.commit("base").unwrap();
        place(&mut vc, "wip");
        let saved = Snapshot::capture(vc.document()).unwrap();

        vc.stash_save("").unwrap();
        assert_eq!(vc.stash_list().unwrap()[0].message, "WIP");
        vc.document_mut().remove_element(&"wip".into()).unwrap();
        place(&mut vc, "other");

        let popped = vc.stash_pop().unwrap();
        assert_eq!(popped.message, "WIP");
        assert_eq!(Snapshot::capture(vc.document()).unwrap(), saved);
        assert!(vc.stash_list().unwrap().is_empty());
        assert_eq!(vc.notifier().last(), Some(Notice::success("Applied stash: WIP")));
    }

    #[test]
    fn stash_is_a_stack() {
        let mut vc = project("Demo");
        vc.stash_save("first").unwrap();
        vc.stash_save("second").unwrap();
        assert_eq!(vc.stash_pop().unwrap().message, "second");
        assert_eq!(vc.stash_pop().unwrap().message, "first");
    }

    #[test]
    fn stash_pop_on_empty_stash_fails() {
        let mut vc = project("Demo");
        assert!(matches!(vc.stash_pop(), Err(VcError::EmptyStash)));
        assert_eq!(vc.notifier().last(), Some(Notice::error("No stash entries")));
    }

    #[test]
    fn delete_stash_out_of_range_leaves_stash() {
        let mut vc = project("Demo");
        vc.stash_save("keep").unwrap();
        for index in [1, 2, usize::MAX] {
            assert!(matches!(
                vc.delete_stash(index),
                Err(VcError::IndexOutOfRange { len: 1, .. })
            ));
        }
        assert_eq!(vc.stash_list().unwrap().len(), 1);
    }

    #[test]
    fn delete_stash_removes_without_applying() {
        let mut vc = project("Demo");
        vc.stash_save("older").unwrap();
        place(&mut vc, "a");
        vc.stash_save("newer").unwrap();
        vc.document_mut().drain_events();

        let removed = vc.delete_stash(1).unwrap();
        assert_eq!(removed.message, "older");
        let remaining = vc.stash_list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "newer");
        assert!(vc.document().events().is_empty());
    }

    /// init on main, fork feature, commit on feature, switch back.
    #[test]
    fn branch_workflow_example() {
        let mut vc = project("Demo");
        place(&mut vc, "base");
        vc.commit("init").unwrap();
        let init_state = Snapshot::capture(vc.document()).unwrap();

        vc.create_branch("feature").unwrap();
        vc.switch_branch("feature").unwrap();
        place(&mut vc, "extra");
        vc.commit("feature work").unwrap();

        let project = vc.current_project().unwrap();
        let main_log = project.branch_log(MAIN_BRANCH).unwrap();
        let feature_log = project.branch_log("feature").unwrap();
        let messages = |log: &[&Commit]| log.iter().map(|c| c.message.clone()).collect::<Vec<_>>();
        assert_eq!(messages(&main_log), ["init"]);
        assert_eq!(messages(&feature_log), ["init", "feature work"]);
        assert_ne!(
            project.branch(MAIN_BRANCH).unwrap().head(),
            project.branch("feature").unwrap().head()
        );

        vc.switch_branch(MAIN_BRANCH).unwrap();
        assert_eq!(Snapshot::capture(vc.document()).unwrap(), init_state);
        assert!(!has(&vc, "extra"));
    }

    #[test]
    fn links_survive_branch_round_trip() {
        let mut vc = project("Demo");
        place(&mut vc, "a");
        place(&mut vc, "b");
        vc.document_mut()
            .create_link(&Link::new("w", Endpoint::new("a", "out"), Endpoint::new("b", "in")))
            .unwrap();
        vc.document_mut()
            .create_tile(&Tile::new(TilePos::new(1, 1, 0), "grass"))
            .unwrap();
        let id = vc.commit("wired").unwrap();
        let committed = Snapshot::capture(vc.document()).unwrap();

        vc.document_mut().remove_link(&"w".into()).unwrap();
        vc.document_mut().remove_element(&"a".into()).unwrap();
        vc.checkout(&id).unwrap();
        assert_eq!(Snapshot::capture(vc.document()).unwrap(), committed);
    }

    #[test]
    fn delete_project_example() {
        let mut vc = project("Demo");
        vc.commit("init").unwrap();
        assert_eq!(vc.delete_project().unwrap(), "Demo");

        assert!(vc.list_projects().unwrap().is_empty());
        assert!(matches!(vc.commit("x"), Err(VcError::NoProjectSelected)));
        let fresh = vc.store().load_project("Demo").unwrap();
        assert_eq!(fresh, Project::new("Demo"));
    }

    #[test]
    fn create_project_rejects_duplicates_and_empty_names() {
        let mut vc = project("Demo");
        assert!(matches!(
            vc.create_project("Demo"),
            Err(VcError::ProjectAlreadyExists(_))
        ));
        assert!(matches!(vc.create_project(""), Err(VcError::InvalidName { .. })));
        assert_eq!(vc.list_projects().unwrap(), ["Demo"]);
    }

    #[test]
    fn select_project_loads_its_head() {
        let mut vc = project("One");
        place(&mut vc, "from-one");
        vc.commit("one").unwrap();

        vc.create_project("Two").unwrap();
        vc.document_mut().remove_element(&"from-one".into()).unwrap();
        place(&mut vc, "from-two");
        vc.commit("two").unwrap();

        let head = vc.select_project("One").unwrap();
        assert!(head.is_some());
        assert!(has(&vc, "from-one"));
        assert!(!has(&vc, "from-two"));
        assert_eq!(vc.current_project().unwrap().name(), "One");
        assert_eq!(vc.notifier().last(), Some(Notice::success("Switched to: One")));
    }

    #[test]
    fn select_unknown_project_fails() {
        let mut vc = project("Demo");
        assert!(matches!(
            vc.select_project("Ghost"),
            Err(VcError::ProjectNotFound(_))
        ));
        assert_eq!(vc.current_project().unwrap().name(), "Demo");
    }

    #[test]
    fn persistence_failure_leaves_no_partial_commit() {
        let mut vc = project("Demo");
        vc.commit("fits").unwrap();
        let used = vc.store().kv().used_bytes();
        vc.store_mut().kv_mut().set_quota(Some(used));

        place(&mut vc, "big");
        let err = vc.commit("too big").unwrap_err();
        assert!(matches!(err, VcError::Persistence(StoreError::QuotaExceeded { .. })));

        vc.store_mut().kv_mut().set_quota(None);
        assert_eq!(vc.log().unwrap().len(), 1);
        assert_eq!(vc.notifier().last().map(|n| n.kind), Some(NoticeKind::Error));
    }

    #[test]
    fn document_failure_keeps_head() {
        let mut vc = project("Demo");
        let first = vc.commit("first").unwrap();
        place(&mut vc, "a");
        let second = vc.commit("second").unwrap();

        vc.document_mut().set_rejecting(true);
        let err = vc.checkout(&first).unwrap_err();
        assert!(matches!(err, VcError::DocumentSync(SyncFailure::Apply { .. })));
        assert_eq!(vc.status().unwrap().head, Some(second));
    }

    #[test]
    fn failed_stash_pop_keeps_stored_entry() {
        let mut vc = project("Demo");
        vc.stash_save("keep me").unwrap();
        place(&mut vc, "a");
        vc.document_mut().set_rejecting(true);

        assert!(vc.stash_pop().is_err());
        assert_eq!(vc.stash_list().unwrap().len(), 1);
    }

    #[test]
    fn fractional_positions_survive_commit_and_checkout() {
        let mut vc = project("Demo");
        let position = DVec2::new(1234567.89, 0.1);
        vc.document_mut()
            .create_element(&Element::new("far", "sign", position))
            .unwrap();
        let id = vc.commit("far away").unwrap();

        vc.document_mut().remove_element(&"far".into()).unwrap();
        vc.checkout(&id).unwrap();

        let restored = vc.document().element(&ElementId::from("far")).unwrap();
        assert_eq!(restored.position, position);
    }

    #[test]
    fn failed_create_project_writes_nothing() {
        let mut vc = project("Demo");
        let before = vc.store().kv().entries().clone();
        // Enough for the longer registry, not for the new record.
        let used = vc.store().kv().used_bytes();
        vc.store_mut().kv_mut().set_quota(Some(used + 20));

        let err = vc.create_project("Other").unwrap_err();
        assert!(matches!(err, VcError::Persistence(StoreError::QuotaExceeded { .. })));
        assert_eq!(vc.store().kv().entries(), &before);
        assert_eq!(vc.current_project().unwrap().name(), "Demo");
    }

    #[test]
    fn auto_stash_skips_switch_to_empty_branch() {
        let mut vc = engine_with(EngineConfig {
            switch_policy: SwitchPolicy::AutoStash,
            ..EngineConfig::default()
        });
        vc.create_project("Demo").unwrap();
        vc.create_branch("scratch").unwrap();
        place(&mut vc, "unsaved");

        vc.switch_branch("scratch").unwrap();
        assert!(has(&vc, "unsaved"));
        assert!(vc.stash_list().unwrap().is_empty());
        assert_eq!(vc.status().unwrap().branch, "scratch");
    }

    #[test]
    fn auto_stash_policy_saves_unsaved_edits() {
        let mut vc = engine_with(EngineConfig {
            switch_policy: SwitchPolicy::AutoStash,
            ..EngineConfig::default()
        });
        vc.create_project("Demo").unwrap();
        let first = vc.commit("empty").unwrap();

        // Clean document: nothing to stash.
        vc.checkout(&first).unwrap();
        assert!(vc.stash_list().unwrap().is_empty());

        place(&mut vc, "unsaved");
        vc.checkout(&first).unwrap();
        assert!(!has(&vc, "unsaved"));
        let stash = vc.stash_list().unwrap();
        assert_eq!(stash.len(), 1);
        assert_eq!(stash[0].message, "auto-stash before checkout");

        vc.stash_pop().unwrap();
        assert!(has(&vc, "unsaved"));
    }

    #[test]
    fn status_reports_dirty_document() {
        let mut vc = project("Demo");
        assert!(!vc.status().unwrap().dirty);
        place(&mut vc, "a");
        assert!(vc.status().unwrap().dirty);
        vc.commit("a").unwrap();
        let status = vc.status().unwrap();
        assert!(!status.dirty);
        assert!(status.to_string().contains("Working map: clean"));
    }

    #[test]
    fn plan_checkout_does_not_touch_document() {
        let mut vc = project("Demo");
        place(&mut vc, "a");
        let id = vc.commit("a").unwrap();
        place(&mut vc, "b");
        vc.document_mut().drain_events();

        let plan = vc.plan_checkout(&id).unwrap();
        assert_eq!(plan.removals().len(), 2);
        assert_eq!(plan.creations().len(), 1);
        assert!(vc.document().events().is_empty());
        assert!(has(&vc, "b"));
    }
}
