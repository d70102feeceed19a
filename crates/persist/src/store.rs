//! Project persistence over a string key-value store.
//!
//! Key layout, all values JSON:
//! ```text
//! <prefix>current_project   - name of the selected project (string)
//! <prefix>projects          - registry of project names (array)
//! <prefix>project_<name>    - full project record
//! ```

use crate::kv::KeyValueStore;
use crate::project::{ModelError, Project};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "mapvc_";

/// Errors from persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("stored value under {key} could not be decoded: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("stored project under {key} is invalid: {source}")]
    InvalidRecord { key: String, source: ModelError },
    #[error("quota exceeded writing {key}: needs {needed} bytes, quota is {quota}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Typed access to projects and the project registry.
#[derive(Debug)]
pub struct ProjectStore<S> {
    kv: S,
    prefix: String,
}

impl<S: KeyValueStore> ProjectStore<S> {
    pub fn new(kv: S) -> Self {
        Self::with_prefix(kv, DEFAULT_PREFIX)
    }

    pub fn with_prefix(kv: S, prefix: impl Into<String>) -> Self {
        Self {
            kv,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    pub fn kv_mut(&mut self) -> &mut S {
        &mut self.kv
    }

    pub fn into_inner(self) -> S {
        self.kv
    }

    pub fn current_project_key(&self) -> String {
        format!("{}current_project", self.prefix)
    }

    pub fn projects_key(&self) -> String {
        format!("{}projects", self.prefix)
    }

    pub fn project_key(&self, name: &str) -> String {
        format!("{}project_{name}", self.prefix)
    }

    /// Names in the registry, in the order they were added.
    pub fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_json(&self.projects_key())?.unwrap_or_default())
    }

    pub fn save_project_list(&mut self, names: &[String]) -> Result<(), StoreError> {
        let key = self.projects_key();
        self.write_json(&key, &names)
    }

    /// Load a project. A name that was never saved yields a fresh default
    /// project; it is not persisted until [`ProjectStore::save_project`].
    pub fn load_project(&self, name: &str) -> Result<Project, StoreError> {
        let key = self.project_key(name);
        match self.read_json::<Project>(&key)? {
            Some(project) => {
                project
                    .validate()
                    .map_err(|source| StoreError::InvalidRecord {
                        key: key.clone(),
                        source,
                    })?;
                Ok(project)
            }
            None => {
                debug!(project = name, "no stored record, using default project");
                Ok(Project::new(name))
            }
        }
    }

    pub fn save_project(&mut self, project: &Project) -> Result<(), StoreError> {
        let key = self.project_key(project.name());
        self.write_json(&key, project)
    }

    pub fn current_project_name(&self) -> Result<Option<String>, StoreError> {
        self.read_json(&self.current_project_key())
    }

    pub fn set_current_project_name(&mut self, name: &str) -> Result<(), StoreError> {
        let key = self.current_project_key();
        self.write_json(&key, &name)
    }

    pub fn clear_current_project(&mut self) -> Result<(), StoreError> {
        let key = self.current_project_key();
        self.kv.remove(&key)
    }

    /// Add `project` to the registry, store its record and make it current.
    /// Either all three keys are written or none of them change.
    pub fn register_project(&mut self, project: &Project) -> Result<(), StoreError> {
        let name = project.name();
        let mut names = self.list_projects()?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
        let keys = [
            self.projects_key(),
            self.project_key(name),
            self.current_project_key(),
        ];
        self.write_all_or_nothing(&keys, |store| {
            store.save_project_list(&names)?;
            store.save_project(project)?;
            store.set_current_project_name(name)
        })?;
        info!(project = name, "project registered");
        Ok(())
    }

    /// Remove a project's record and registry entry, and clear the current
    /// pointer if it names this project. Nothing changes if any step fails.
    pub fn delete_project(&mut self, name: &str) -> Result<(), StoreError> {
        let mut names = self.list_projects()?;
        names.retain(|n| n != name);
        let is_current = self.current_project_name()?.as_deref() == Some(name);
        let record_key = self.project_key(name);
        let keys = [
            self.projects_key(),
            record_key.clone(),
            self.current_project_key(),
        ];
        self.write_all_or_nothing(&keys, |store| {
            store.save_project_list(&names)?;
            store.kv.remove(&record_key)?;
            if is_current {
                store.clear_current_project()?;
            }
            Ok(())
        })?;
        info!(project = name, "project deleted");
        Ok(())
    }

    /// Run a multi-key update. On failure every key in `keys` is put back to
    /// the raw value it held before, last key first.
    fn write_all_or_nothing(
        &mut self,
        keys: &[String],
        update: impl FnOnce(&mut Self) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut before = Vec::with_capacity(keys.len());
        for key in keys {
            before.push((key, self.kv.get(key)?));
        }
        let Err(err) = update(self) else {
            return Ok(());
        };
        for (key, value) in before.into_iter().rev() {
            if self.kv.get(key).ok().as_ref() == Some(&value) {
                continue;
            }
            let restored = match &value {
                Some(raw) => self.kv.set(key, raw),
                None => self.kv.remove(key),
            };
            if let Err(rollback) = restored {
                warn!(key = %key, error = %rollback, "could not restore key after failed update");
            }
        }
        Err(err)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.kv.get(key)? else {
            return Ok(None);
        };
        debug!(key, bytes = raw.len(), "read");
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_owned(),
                source,
            })
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        debug!(key, bytes = raw.len(), "write");
        self.kv.set(key, &raw)
    }
}
