use std::fs;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile, TaskSection};
use crate::errors::{MultijobError, Result};

/// Load a task file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (DAG correctness, etc.). Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(MultijobError::ConfigError(format!(
            "empty or missing config file: {}",
            path.display()
        )));
    }
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Parse task file contents.
///
/// Every top-level entry must be a table; its key is the task id.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    let table: toml::Table = toml::from_str(contents)?;

    let mut tasks = Vec::with_capacity(table.len());
    for (task_id, value) in table {
        if !value.is_table() {
            return Err(MultijobError::ConfigError(format!(
                "top-level key '{task_id}' must be a [{task_id}] task section"
            )));
        }
        let section = value.try_into::<TaskSection>().map_err(|e| {
            MultijobError::ConfigError(format!("task '{task_id}': {e}"))
        })?;
        tasks.push((task_id, section));
    }

    Ok(RawConfigFile { tasks })
}

/// Load a task file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML, keeping section order.
/// - Builds a [`TaskDescriptor`](crate::config::TaskDescriptor) per section.
/// - Checks for:
///   - an empty file,
///   - unknown `depends` references,
///   - DAG cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}
