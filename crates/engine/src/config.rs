use mapvc_persist::DEFAULT_PREFIX;
use serde::{Deserialize, Serialize};

/// What to do with unsaved live edits before an operation replaces the
/// live document (checkout, branch switch, stash pop).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchPolicy {
    /// Overwrite the document; unsaved edits are lost.
    #[default]
    Discard,
    /// Push the live document onto the stash first when it differs from the
    /// current head.
    AutoStash,
}

/// Engine settings. Every field has a default, so a partial JSON object is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix for every key the engine writes to the key-value store.
    pub key_prefix: String,
    pub default_commit_message: String,
    pub default_stash_message: String,
    pub switch_policy: SwitchPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_PREFIX.to_owned(),
            default_commit_message: "Untitled commit".to_owned(),
            default_stash_message: "WIP".to_owned(),
            switch_policy: SwitchPolicy::Discard,
        }
    }
}
