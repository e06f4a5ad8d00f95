// tests/settings_and_types.rs

use std::time::Duration;

use clap::Parser;
use multijob::cli::{CliArgs, LogLevel};
use multijob::config::Settings;
use multijob::coordinator::git_refs::{build_snapshots, parse_overrides};
use multijob::logging::build_filter;
use multijob::service::{ImportedRepository, StartJobRequest};
use multijob::types::{ExecutionStatus, GitRef};

fn args(extra: &[&str]) -> CliArgs {
    let mut argv = vec![
        "multijob",
        "pipeline.toml",
        "--api-host",
        "https://platform.example.com",
        "--api-key",
        "secret",
        "--project-id",
        "p-1",
    ];
    argv.extend_from_slice(extra);
    CliArgs::try_parse_from(argv).unwrap()
}

#[test]
fn defaults_match_the_documented_policy() {
    let settings = Settings::from_args(&args(&[])).unwrap();
    settings.validate().unwrap();

    assert_eq!(settings.tick_freq, Duration::from_secs(5));
    assert_eq!(settings.queue_limit, 10);
    assert_eq!(settings.submissions_per_tick, 1);
    assert_eq!(settings.override_poll_interval, Duration::from_secs(3));
    assert_eq!(settings.snapshot_poll_interval, Duration::from_secs(2));
    assert_eq!(settings.lock_tag, "multijob_locked");
    assert_eq!(settings.protected_dir, "inputdata");
    assert!(settings.lock_lease.is_none());
    assert!(settings.wait_deadline.is_none());
    assert!(!settings.allow_partial_failure);
    assert!(settings.audit_env.iter().all(|(k, _)| k.starts_with("DMV")));
}

#[test]
fn flags_override_defaults() {
    let settings = Settings::from_args(&args(&[
        "--tick-freq",
        "1",
        "--queue-limit",
        "3",
        "--submissions-per-tick",
        "2",
        "--lock-lease",
        "600",
        "--wait-deadline",
        "3600",
        "--allow-partial-failure",
        "--prerun-cleanup",
        "TRUE",
        "--audit",
        "yes",
    ]))
    .unwrap();

    assert_eq!(settings.tick_freq, Duration::from_secs(1));
    assert_eq!(settings.queue_limit, 3);
    assert_eq!(settings.submissions_per_tick, 2);
    assert_eq!(settings.lock_lease, Some(Duration::from_secs(600)));
    assert_eq!(settings.gate_policy().deadline, Some(Duration::from_secs(3600)));
    assert!(settings.allow_partial_failure);
    assert!(settings.prerun_cleanup);
    // Only a case-insensitive "true" enables a phase.
    assert!(!settings.audit);
}

#[test]
fn missing_credentials_are_config_errors() {
    let mut parsed = args(&[]);
    parsed.api_host = None;
    assert!(Settings::from_args(&parsed).is_err());

    let mut parsed = args(&[]);
    parsed.project_id = Some("   ".into());
    assert!(Settings::from_args(&parsed).is_err());
}

#[test]
fn audit_env_keeps_prefixed_vars_sorted() {
    let settings = Settings::new("https://h", "k", "p").capture_audit_env(vec![
        ("PATH".to_string(), "/bin".to_string()),
        ("DMV_STAGE".to_string(), "prod".to_string()),
        ("DMV_ISCX".to_string(), "true".to_string()),
    ]);
    assert_eq!(
        settings.audit_env,
        vec![
            ("DMV_ISCX".to_string(), "true".to_string()),
            ("DMV_STAGE".to_string(), "prod".to_string()),
        ]
    );
}

#[cfg(unix)]
#[test]
fn audit_env_skips_non_utf8_names_and_keeps_lossy_values() {
    use std::ffi::{OsStr, OsString};
    use std::os::unix::ffi::OsStrExt;

    let raw = |bytes: &[u8]| OsStr::from_bytes(bytes).to_os_string();
    let vars: Vec<(OsString, OsString)> = vec![
        (raw(b"DMV_\xff"), OsString::from("dropped")),
        (OsString::from("DMV_RAW"), raw(b"a\xffb")),
        (OsString::from("OTHER"), raw(b"\xfe")),
    ];
    let settings = Settings::new("https://h", "k", "p").capture_audit_env(vars);
    assert_eq!(
        settings.audit_env,
        vec![("DMV_RAW".to_string(), "a\u{FFFD}b".to_string())]
    );
}

#[test]
fn validate_rejects_bad_values() {
    let base = || Settings::new("https://h", "k", "p");
    base().validate().unwrap();

    let mut s = base();
    s.api_host = "ftp://h".into();
    assert!(s.validate().is_err());

    let mut s = base();
    s.tick_freq = Duration::ZERO;
    assert!(s.validate().is_err());

    let mut s = base();
    s.queue_limit = 0;
    assert!(s.validate().is_err());

    let mut s = base();
    s.submissions_per_tick = 0;
    assert!(s.validate().is_err());

    let mut s = base();
    s.audit = true;
    assert!(s.validate().is_err());
    s.run_id = Some("run-1".into());
    s.validate().unwrap();
}

#[test]
fn unknown_platform_statuses_are_kept_and_polled() {
    let status: ExecutionStatus = "Scaling".parse().unwrap();
    assert_eq!(status, ExecutionStatus::Other("Scaling".into()));
    assert!(!status.is_cached());
    assert!(!status.is_awaiting_startup());
    assert!(ExecutionStatus::from("Pending").is_awaiting_startup());
    assert!(ExecutionStatus::from("Stopped").is_cached());
    assert!(!ExecutionStatus::from("Stopped").is_failure());
}

#[test]
fn git_ref_micro_format() {
    assert_eq!(
        "branches,main".parse::<GitRef>().unwrap(),
        GitRef::new("branches", Some("main".into()))
    );
    assert_eq!("head".parse::<GitRef>().unwrap(), GitRef::new("head", None));
    assert!("".parse::<GitRef>().is_err());
    assert!("tags,v1,v2".parse::<GitRef>().is_err());
    assert_eq!(GitRef::new("tags", Some("v1".into())).to_string(), "tags,v1");
}

#[test]
fn override_list_parsing_and_snapshots() {
    assert!(parse_overrides("   ").is_err());
    let overrides = parse_overrides("features,tags,v1   docs,head").unwrap();
    assert_eq!(overrides.len(), 2);
    assert_eq!(overrides[1].to_string(), "docs,head");

    let current = vec![
        ImportedRepository {
            id: "r1".into(),
            name: "features".into(),
            git_ref: GitRef::new("branches", Some("main".into())),
        },
        ImportedRepository {
            id: "r2".into(),
            name: "docs".into(),
            git_ref: GitRef::new("commitId", Some("abc".into())),
        },
    ];
    let snapshots = build_snapshots(&current, &overrides);
    assert_eq!(snapshots.original.len(), 2);
    assert_eq!(snapshots.original[1].repository_id, "r2");
    assert_eq!(snapshots.original[1].git_ref, current[1].git_ref);
    assert_eq!(snapshots.desired[0].git_ref, GitRef::new("tags", Some("v1".into())));
    assert_eq!(snapshots.desired[1].git_ref, GitRef::new("head", None));
}

#[test]
fn start_request_serializes_platform_field_names() {
    let request = StartJobRequest {
        project_id: "p-1".into(),
        command_to_run: "python train.py".into(),
        override_hardware_tier_id: Some("tier-9".into()),
        environment_id: None,
        main_repo_git_ref: Some(GitRef::new("head", None)),
    };
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "projectId": "p-1",
            "commandToRun": "python train.py",
            "overrideHardwareTierId": "tier-9",
            "mainRepoGitRef": { "type": "head" }
        })
    );
}

#[test]
fn log_filter_precedence() {
    assert_eq!(build_filter(Some(LogLevel::Debug), Some("error")).to_string(), "debug");
    assert_eq!(build_filter(None, Some("multijob=trace")).to_string(), "multijob=trace");
    assert_eq!(build_filter(None, None).to_string(), "info");
}
