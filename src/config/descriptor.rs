//! Validated description of one DAG node.

use std::fmt;

use crate::config::model::TaskSection;
use crate::coordinator::git_refs::{RepoRefOverride, parse_overrides};
use crate::errors::{MultijobError, Result};
use crate::types::{GitRef, TaskId};

/// Everything needed to submit one task, built from a config section or
/// programmatically via [`TaskDescriptor::new`] and the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub command: String,
    pub depends: Vec<TaskId>,
    pub max_retries: u32,
    pub tier: Option<String>,
    pub environment: Option<String>,
    pub project_repo_git_ref: Option<GitRef>,
    pub imported_repo_git_refs: Option<Vec<RepoRefOverride>>,
}

impl TaskDescriptor {
    /// Create a descriptor with no dependencies, no retries and no overrides.
    pub fn new(task_id: impl Into<TaskId>, command: impl Into<String>) -> Result<Self> {
        let task_id = task_id.into();
        let command = command.into();

        if task_id.trim().is_empty() {
            return Err(MultijobError::ConfigError(
                "task id must not be empty".to_string(),
            ));
        }
        if command.trim().is_empty() {
            return Err(MultijobError::ConfigError(format!(
                "task '{task_id}' has an empty `command`"
            )));
        }

        Ok(Self {
            task_id,
            command,
            depends: Vec::new(),
            max_retries: 0,
            tier: None,
            environment: None,
            project_repo_git_ref: None,
            imported_repo_git_refs: None,
        })
    }

    /// Build from a `[<task_id>]` section, parsing the ref micro-formats.
    pub fn from_section(task_id: &str, section: &TaskSection) -> Result<Self> {
        let mut descriptor = Self::new(task_id, section.command.clone())?
            .with_depends(section.depends.task_ids())
            .with_max_retries(section.max_retries);

        if let Some(tier) = non_empty(&section.tier) {
            descriptor = descriptor.with_tier(tier);
        }
        if let Some(env) = non_empty(&section.environment) {
            descriptor = descriptor.with_environment(env);
        }
        if let Some(git_ref) = non_empty(&section.project_repo_git_ref) {
            descriptor = descriptor.with_project_repo_git_ref(git_ref)?;
        }
        if let Some(refs) = non_empty(&section.imported_repo_git_refs) {
            descriptor = descriptor.with_imported_repo_git_refs(refs)?;
        }

        Ok(descriptor)
    }

    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the main repository ref from `ref_type[,ref_value]`.
    pub fn with_project_repo_git_ref(mut self, spec: &str) -> Result<Self> {
        let git_ref = spec.parse::<GitRef>().map_err(|e| {
            MultijobError::ConfigError(format!(
                "task '{}': invalid `project_repo_git_ref`: {e}",
                self.task_id
            ))
        })?;
        self.project_repo_git_ref = Some(git_ref);
        Ok(self)
    }

    /// Set imported repository overrides from the space-separated
    /// `repo_name,ref_type[,ref_value]` format.
    pub fn with_imported_repo_git_refs(mut self, spec: &str) -> Result<Self> {
        let overrides = parse_overrides(spec).map_err(|e| {
            MultijobError::ConfigError(format!(
                "task '{}': invalid `imported_repo_git_refs`: {e}",
                self.task_id
            ))
        })?;
        self.imported_repo_git_refs = Some(overrides);
        Ok(self)
    }

    /// Whether submitting this task needs the shared repository config
    /// swapped (and therefore the advisory lock).
    pub fn needs_ref_override(&self) -> bool {
        self.imported_repo_git_refs
            .as_ref()
            .is_some_and(|refs| !refs.is_empty())
    }
}

impl fmt::Display for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "task_id: {}", self.task_id)?;
        writeln!(f, "command: {}", self.command)?;
        writeln!(f, "tier override: {}", self.tier.as_deref().unwrap_or("-"))?;
        writeln!(
            f,
            "environment override: {}",
            self.environment.as_deref().unwrap_or("-")
        )?;
        match &self.project_repo_git_ref {
            Some(r) => writeln!(f, "main repo override: {r}")?,
            None => writeln!(f, "main repo override: -")?,
        }
        match &self.imported_repo_git_refs {
            Some(refs) => {
                let joined: Vec<String> = refs.iter().map(ToString::to_string).collect();
                write!(f, "imported repo overrides: {}", joined.join(" "))
            }
            None => write!(f, "imported repo overrides: -"),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
