// tests/settings_env.rs
//
// Mutates the process environment, so it lives in its own test binary.

#![cfg(unix)]

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use clap::Parser;
use multijob::cli::CliArgs;
use multijob::config::Settings;

#[test]
fn non_utf8_environment_does_not_abort_startup() {
    // SAFETY: this is the only test in this binary, so no other thread
    // reads the environment concurrently.
    unsafe {
        std::env::set_var("UNRELATED_BINARY_VAR", OsStr::from_bytes(&[0xff, 0xfe]));
        std::env::set_var(OsStr::from_bytes(&[b'X', 0xff]), "value");
        std::env::set_var("DMV_RAW_BYTES", OsStr::from_bytes(&[b'o', b'k', 0xff]));
        std::env::set_var("DMV_STAGE", "prod");
    }

    let args = CliArgs::try_parse_from([
        "multijob",
        "pipeline.toml",
        "--api-host",
        "https://platform.example.com",
        "--api-key",
        "secret",
        "--project-id",
        "p-1",
    ])
    .unwrap();
    let settings = Settings::from_args(&args).unwrap();

    assert!(settings.audit_env.iter().all(|(name, _)| name.starts_with("DMV")));
    assert!(
        settings
            .audit_env
            .contains(&("DMV_RAW_BYTES".to_string(), "ok\u{FFFD}".to_string()))
    );
    assert!(
        settings
            .audit_env
            .contains(&("DMV_STAGE".to_string(), "prod".to_string()))
    );
}
