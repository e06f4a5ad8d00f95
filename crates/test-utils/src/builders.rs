#![allow(dead_code)]

use std::time::Duration;

use multijob::config::{ConfigFile, Depends, RawConfigFile, Settings, TaskSection};

/// Builder for `ConfigFile` to simplify test setup. Tasks keep insertion
/// order.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_task(mut self, task_id: &str, task: TaskSection) -> Self {
        self.config.tasks.push((task_id.to_string(), task));
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskSection`.
pub struct TaskSectionBuilder {
    task: TaskSection,
}

impl TaskSectionBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            task: TaskSection {
                command: command.to_string(),
                depends: Depends::default(),
                max_retries: 0,
                tier: None,
                environment: None,
                project_repo_git_ref: None,
                imported_repo_git_refs: None,
            },
        }
    }

    pub fn depends(mut self, dep: &str) -> Self {
        let mut deps = self.task.depends.task_ids();
        deps.push(dep.to_string());
        self.task.depends = Depends::List(deps);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.task.max_retries = n;
        self
    }

    pub fn tier(mut self, name: &str) -> Self {
        self.task.tier = Some(name.to_string());
        self
    }

    pub fn environment(mut self, id: &str) -> Self {
        self.task.environment = Some(id.to_string());
        self
    }

    pub fn project_repo_git_ref(mut self, spec: &str) -> Self {
        self.task.project_repo_git_ref = Some(spec.to_string());
        self
    }

    pub fn imported_repo_git_refs(mut self, spec: &str) -> Self {
        self.task.imported_repo_git_refs = Some(spec.to_string());
        self
    }

    pub fn build(self) -> TaskSection {
        self.task
    }
}

/// Settings for a fake project with millisecond poll intervals.
pub fn test_settings() -> Settings {
    let mut settings = Settings::new("http://fake.invalid", "test-key", "project-1");
    settings.tick_freq = Duration::from_millis(1);
    settings.override_poll_interval = Duration::from_millis(1);
    settings.snapshot_poll_interval = Duration::from_millis(1);
    settings.run_id = Some("run-42".to_string());
    settings.starting_username = Some("alice".to_string());
    settings
}
