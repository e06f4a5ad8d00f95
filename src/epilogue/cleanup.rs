// src/epilogue/cleanup.rs

//! Pre-run dataset cleanup.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::service::JobService;

/// Delete every unprotected file in every dataset of the project.
///
/// Returns the number of files removed.
pub async fn cleanup_datasets(
    service: &dyn JobService,
    fs: &dyn FileSystem,
    project_id: &str,
    protected_dir: &str,
) -> Result<usize> {
    let datasets = service.project_datasets(project_id).await?;
    let mut removed = 0;

    for dataset in &datasets {
        if !fs.is_dir(&dataset.path) {
            warn!(
                dataset = %dataset.id,
                path = %dataset.path.display(),
                "dataset is not mounted; nothing to clean"
            );
            continue;
        }
        let count = clean_directory(fs, &dataset.path, protected_dir)?;
        info!(dataset = %dataset.id, path = %dataset.path.display(), removed = count, "dataset cleaned");
        removed += count;
    }

    Ok(removed)
}

/// Remove every file under `root`, skipping any subtree whose directory name
/// equals `protected_dir`. Directories themselves are kept.
pub fn clean_directory(fs: &dyn FileSystem, root: &Path, protected_dir: &str) -> Result<usize> {
    let mut removed = 0;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs.read_dir(&dir)? {
            if fs.is_dir(&entry) {
                if entry.file_name().is_some_and(|name| name == protected_dir) {
                    debug!(path = %entry.display(), "skipping protected directory");
                    continue;
                }
                pending.push(entry);
            } else if fs.is_file(&entry) {
                fs.remove_file(&entry)?;
                removed += 1;
            }
        }
    }

    Ok(removed)
}
