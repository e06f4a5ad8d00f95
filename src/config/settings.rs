//! Runtime settings.
//!
//! Built once at process start from CLI flags and the environment, then
//! passed by reference to the scheduler, coordinator and epilogue. Nothing
//! below this module reads process-wide state.

use std::ffi::OsString;
use std::time::Duration;

use crate::cli::CliArgs;
use crate::engine::poll::PollPolicy;
use crate::errors::{MultijobError, Result};

/// Project tag used as the advisory lock around repository ref overrides.
pub const DEFAULT_LOCK_TAG: &str = "multijob_locked";

/// Dataset subdirectory never touched by the pre-run cleanup.
pub const DEFAULT_PROTECTED_DIR: &str = "inputdata";

/// Environment variables with this prefix are recorded by the audit.
pub const DEFAULT_AUDIT_ENV_PREFIX: &str = "DMV";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_host: String,
    pub api_key: String,
    pub project_id: String,

    /// Job id of this orchestrator run; required for the audit.
    pub run_id: Option<String>,
    pub starting_username: Option<String>,

    pub prerun_cleanup: bool,
    pub audit: bool,

    pub tick_freq: Duration,
    pub queue_limit: u64,
    pub submissions_per_tick: usize,

    /// Poll interval while waiting for an overridden job to start up.
    pub override_poll_interval: Duration,
    /// Poll interval while waiting for a snapshot to become active.
    pub snapshot_poll_interval: Duration,

    pub lock_tag: String,
    pub lock_lease: Option<Duration>,
    pub wait_deadline: Option<Duration>,

    pub protected_dir: String,
    pub audit_env_prefix: String,
    pub allow_partial_failure: bool,

    /// Prefixed environment variables captured at startup, sorted by name.
    pub audit_env: Vec<(String, String)>,
}

impl Settings {
    /// Settings with the default scheduling policy for the given project.
    pub fn new(
        api_host: impl Into<String>,
        api_key: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            api_host: api_host.into(),
            api_key: api_key.into(),
            project_id: project_id.into(),
            run_id: None,
            starting_username: None,
            prerun_cleanup: false,
            audit: false,
            tick_freq: Duration::from_secs(5),
            queue_limit: 10,
            submissions_per_tick: 1,
            override_poll_interval: Duration::from_secs(3),
            snapshot_poll_interval: Duration::from_secs(2),
            lock_tag: DEFAULT_LOCK_TAG.to_string(),
            lock_lease: None,
            wait_deadline: None,
            protected_dir: DEFAULT_PROTECTED_DIR.to_string(),
            audit_env_prefix: DEFAULT_AUDIT_ENV_PREFIX.to_string(),
            allow_partial_failure: false,
            audit_env: Vec::new(),
        }
    }

    /// Build settings from parsed CLI arguments plus the process environment.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let api_host = required(&args.api_host, "api host (DOMINO_API_HOST)")?;
        let api_key = required(&args.api_key, "api key (DOMINO_USER_API_KEY)")?;
        let project_id = required(&args.project_id, "project id (DOMINO_PROJECT_ID)")?;

        let mut settings = Self::new(api_host, api_key, project_id);
        settings.run_id = args.run_id.clone();
        settings.starting_username = args.starting_username.clone();
        settings.prerun_cleanup = args.prerun_cleanup;
        settings.audit = args.audit;
        settings.tick_freq = Duration::from_secs(args.tick_freq);
        settings.queue_limit = args.queue_limit;
        settings.submissions_per_tick = args.submissions_per_tick;
        settings.lock_lease = args.lock_lease.map(Duration::from_secs);
        settings.wait_deadline = args.wait_deadline.map(Duration::from_secs);
        settings.allow_partial_failure = args.allow_partial_failure;

        Ok(settings.capture_audit_env(std::env::vars_os()))
    }

    /// Keep the variables whose name starts with `audit_env_prefix`.
    ///
    /// Names that are not valid UTF-8 are ignored; values are converted
    /// lossily.
    pub fn capture_audit_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut captured: Vec<(String, String)> = vars
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name.into().into_string().ok()?;
                if !name.starts_with(&self.audit_env_prefix) {
                    return None;
                }
                let value = value.into().to_string_lossy().into_owned();
                Some((name, value))
            })
            .collect();
        captured.sort();
        self.audit_env = captured;
        self
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<()> {
        if self.api_host.is_empty() {
            return Err(config_error("api host cannot be empty"));
        }
        if !self.api_host.starts_with("http://") && !self.api_host.starts_with("https://") {
            return Err(config_error("api host must start with http:// or https://"));
        }
        if self.api_key.is_empty() {
            return Err(config_error("api key cannot be empty"));
        }
        if self.project_id.is_empty() {
            return Err(config_error("project id cannot be empty"));
        }
        if self.tick_freq.is_zero() {
            return Err(config_error("tick frequency must be greater than 0"));
        }
        if self.queue_limit == 0 {
            return Err(config_error("queue limit must be greater than 0"));
        }
        if self.submissions_per_tick == 0 {
            return Err(config_error("submissions per tick must be greater than 0"));
        }
        if self.audit && self.run_id.as_deref().unwrap_or("").is_empty() {
            return Err(config_error(
                "the post-run audit needs the run id (DOMINO_RUN_ID)",
            ));
        }
        Ok(())
    }

    /// Poll policy for the scheduler's lock and queue gates.
    pub fn gate_policy(&self) -> PollPolicy {
        PollPolicy::every(self.tick_freq).with_deadline(self.wait_deadline)
    }

    /// Poll policy for the post-submission startup wait.
    pub fn startup_policy(&self) -> PollPolicy {
        PollPolicy::every(self.override_poll_interval).with_deadline(self.wait_deadline)
    }

    /// Poll policy for the snapshot-active wait.
    pub fn snapshot_policy(&self) -> PollPolicy {
        PollPolicy::every(self.snapshot_poll_interval).with_deadline(self.wait_deadline)
    }
}

fn required(value: &Option<String>, what: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(config_error(&format!("missing {what}"))),
    }
}

fn config_error(msg: &str) -> MultijobError {
    MultijobError::ConfigError(msg.to_string())
}
