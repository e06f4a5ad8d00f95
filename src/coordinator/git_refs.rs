//! Imported-repository ref overrides.
//!
//! Override strings list one repository per whitespace-separated entry, each
//! `repo_name,ref_type[,ref_value]`:
//!
//! ```text
//! features,branches,dev shared-utils,tags,v1.2 docs,head
//! ```

use std::fmt;

use tracing::warn;

use crate::service::ImportedRepository;
use crate::types::GitRef;

/// One requested override, by repository name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRefOverride {
    pub repo_name: String,
    pub git_ref: GitRef,
}

impl fmt::Display for RepoRefOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.repo_name, self.git_ref)
    }
}

/// A ref to set on a repository, by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRefAssignment {
    pub repository_id: String,
    pub git_ref: GitRef,
}

/// The two halves of one override window: what to restore and what to apply.
/// Entries are index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSnapshots {
    pub original: Vec<RepoRefAssignment>,
    pub desired: Vec<RepoRefAssignment>,
}

impl OverrideSnapshots {
    pub fn is_empty(&self) -> bool {
        self.desired.is_empty()
    }
}

/// Parse a whitespace-separated override list.
pub fn parse_overrides(spec: &str) -> Result<Vec<RepoRefOverride>, String> {
    let mut overrides = Vec::new();

    for entry in spec.split_whitespace() {
        let (repo_name, ref_spec) = match entry.split_once(',') {
            Some((name, rest)) if !name.is_empty() => (name, rest),
            _ => {
                return Err(format!(
                    "entry '{entry}' must look like repo_name,ref_type[,ref_value]"
                ));
            }
        };
        let git_ref = ref_spec
            .parse::<GitRef>()
            .map_err(|e| format!("entry '{entry}': {e}"))?;
        overrides.push(RepoRefOverride {
            repo_name: repo_name.to_string(),
            git_ref,
        });
    }

    if overrides.is_empty() {
        return Err("override list is empty".to_string());
    }
    Ok(overrides)
}

/// Pair each requested override with the repository's current ref.
///
/// Names that match no imported repository are skipped with a warning.
pub fn build_snapshots(
    current: &[ImportedRepository],
    overrides: &[RepoRefOverride],
) -> OverrideSnapshots {
    let mut snapshots = OverrideSnapshots::default();

    for requested in overrides {
        let Some(repo) = current.iter().find(|r| r.name == requested.repo_name) else {
            warn!(
                repo = %requested.repo_name,
                "override names a repository that is not imported into the project; skipping"
            );
            continue;
        };

        snapshots.original.push(RepoRefAssignment {
            repository_id: repo.id.clone(),
            git_ref: repo.git_ref.clone(),
        });
        snapshots.desired.push(RepoRefAssignment {
            repository_id: repo.id.clone(),
            git_ref: requested.git_ref.clone(),
        });
    }

    snapshots
}
