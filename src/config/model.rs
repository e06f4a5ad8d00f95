use serde::Deserialize;

use crate::config::descriptor::TaskDescriptor;
use crate::types::TaskId;

/// Task file as read from TOML, before validation.
///
/// Each top-level table is one task, keyed by its task id:
///
/// ```toml
/// [prepare]
/// command = "python prepare.py"
///
/// [train]
/// command = "python train.py"
/// depends = "prepare"
/// max_retries = 2
/// tier = "gpu-large"
/// imported_repo_git_refs = "features,branches,dev other-repo,tags,v1.2"
/// ```
///
/// Sections are kept in file order; that order decides which ready task is
/// submitted first.
#[derive(Debug, Clone, Default)]
pub struct RawConfigFile {
    pub tasks: Vec<(TaskId, TaskSection)>,
}

/// One `[<task_id>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSection {
    /// Command handed to the remote platform as-is.
    pub command: String,

    /// Tasks that must succeed before this one is submitted.
    #[serde(default)]
    pub depends: Depends,

    /// How many times a failed job is resubmitted.
    #[serde(default)]
    pub max_retries: u32,

    /// Hardware tier name, resolved to an id at submission time.
    #[serde(default)]
    pub tier: Option<String>,

    /// Compute environment id.
    #[serde(default)]
    pub environment: Option<String>,

    /// Main repository ref, `ref_type[,ref_value]`.
    #[serde(default)]
    pub project_repo_git_ref: Option<String>,

    /// Imported repository refs, space-separated `repo_name,ref_type[,ref_value]`.
    #[serde(default)]
    pub imported_repo_git_refs: Option<String>,
}

/// `depends` accepts either `"A,B"` or `["A", "B"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Depends {
    List(Vec<String>),
    Csv(String),
}

impl Default for Depends {
    fn default() -> Self {
        Depends::List(Vec::new())
    }
}

impl Depends {
    /// Trimmed, non-empty task ids in declaration order (duplicates kept).
    pub fn task_ids(&self) -> Vec<TaskId> {
        let raw: Vec<&str> = match self {
            Depends::List(items) => items.iter().map(String::as_str).collect(),
            Depends::Csv(s) => s.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Validated task file: descriptors in file order.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// every dependency names a known task and the graph is acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    tasks: Vec<TaskDescriptor>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(tasks: Vec<TaskDescriptor>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }
}
