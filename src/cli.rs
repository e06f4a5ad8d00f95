// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Platform credentials and the epilogue flags are normally injected by the
//! job platform as environment variables; each can also be given as a flag.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

/// Command-line arguments for `multijob`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "multijob",
    version,
    about = "Run a DAG of remote batch jobs with retries, throttling and git-ref overrides.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline task file (TOML, one section per task).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Base URL of the job platform API.
    #[arg(long, env = "DOMINO_API_HOST", value_name = "URL")]
    pub api_host: Option<String>,

    /// API key sent with every request.
    #[arg(long, env = "DOMINO_USER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Project that jobs are started in.
    #[arg(long, env = "DOMINO_PROJECT_ID", value_name = "ID")]
    pub project_id: Option<String>,

    /// Job id of this orchestrator run (comment target for the audit).
    #[arg(long, env = "DOMINO_RUN_ID", value_name = "ID")]
    pub run_id: Option<String>,

    /// User that started this run (recorded in the audit comment).
    #[arg(long, env = "DOMINO_STARTING_USERNAME", value_name = "USER")]
    pub starting_username: Option<String>,

    /// Delete unprotected dataset files before the run ("true" to enable).
    #[arg(long, env = "DMV_PREP", value_name = "BOOL", value_parser = parse_env_flag,
          action = ArgAction::Set, default_value = "false")]
    pub prerun_cleanup: bool,

    /// Snapshot, tag and comment datasets after the run ("true" to enable).
    #[arg(long, env = "DMV_ISCX", value_name = "BOOL", value_parser = parse_env_flag,
          action = ArgAction::Set, default_value = "false")]
    pub audit: bool,

    /// Seconds between scheduler ticks.
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    pub tick_freq: u64,

    /// Submission pauses while this many project jobs are queued.
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub queue_limit: u64,

    /// How many ready tasks may be submitted per tick.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub submissions_per_tick: usize,

    /// Treat a lock tag observed for longer than this as stale and remove it.
    ///
    /// Unset means wait for the tag indefinitely.
    #[arg(long, value_name = "SECONDS")]
    pub lock_lease: Option<u64>,

    /// Give up any single wait (lock, queue, job startup, snapshot) after this long.
    ///
    /// Unset means wait indefinitely.
    #[arg(long, value_name = "SECONDS")]
    pub wait_deadline: Option<u64>,

    /// Let the pipeline succeed even if some tasks fail permanently.
    #[arg(long)]
    pub allow_partial_failure: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MULTIJOB_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the DAG, but don't contact the platform.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Flags are enabled only by a case-insensitive "true"; anything else is off.
fn parse_env_flag(s: &str) -> Result<bool, String> {
    Ok(s.trim().eq_ignore_ascii_case("true"))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
