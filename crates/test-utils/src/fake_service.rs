use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use multijob::service::{
    Dataset, HardwareTier, ImportedRepository, JobService, ProjectTag, Result, ServiceError,
    Snapshot, StartJobRequest,
};
use multijob::types::{ExecutionStatus, GitRef, JobId, SnapshotStatus};

/// Every call the fake received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartJob(StartJobRequest),
    JobStatus(JobId),
    QueuedJobCount,
    ProjectTags,
    CreateProjectTag(String),
    DeleteProjectTag(String),
    HardwareTiers,
    ImportedRepositories,
    SetRepositoryRef { repository_id: String, git_ref: GitRef },
    ProjectDatasets,
    CreateSnapshot { dataset_id: String, paths: Vec<String> },
    SnapshotStatus(String),
    DatasetName(String),
    TagSnapshot { dataset_id: String, snapshot_id: String, tag: String },
    PostJobComment { job_id: String, comment: String },
}

#[derive(Debug)]
struct FakeJob {
    command: String,
    /// Statuses returned by successive polls; the last one repeats.
    statuses: VecDeque<ExecutionStatus>,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    next_id: u64,

    /// Per command, one status script per submission.
    scripts: HashMap<String, VecDeque<Vec<ExecutionStatus>>>,
    jobs: HashMap<JobId, FakeJob>,
    fail_start: HashSet<String>,

    queued_counts: VecDeque<u64>,

    tags: Vec<ProjectTag>,
    /// Tag id → number of `project_tags` listings it is still visible for.
    expiring_tags: HashMap<String, u32>,

    tiers: Vec<HardwareTier>,
    repositories: Vec<ImportedRepository>,

    datasets: Vec<(Dataset, String)>,
    snapshot_script: Vec<SnapshotStatus>,
    snapshots: HashMap<String, VecDeque<SnapshotStatus>>,
    snapshot_time_ms: i64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Scripted in-memory [`JobService`].
///
/// Jobs succeed on their first poll unless a script was queued for their
/// command with [`FakeJobService::script_job`].
#[derive(Debug, Default)]
pub struct FakeJobService {
    state: Mutex<State>,
}

impl FakeJobService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // --- scripting ---------------------------------------------------------

    /// Queue the poll sequence for the next job started with `command`.
    /// Call repeatedly to script resubmissions.
    pub fn script_job(&self, command: &str, statuses: &[ExecutionStatus]) -> &Self {
        self.state()
            .scripts
            .entry(command.to_string())
            .or_default()
            .push_back(statuses.to_vec());
        self
    }

    /// Starting a job with `command` fails with an API error.
    pub fn fail_start(&self, command: &str) -> &Self {
        self.state().fail_start.insert(command.to_string());
        self
    }

    /// Successive queued-job counts; the last one repeats. Default 0.
    pub fn script_queued_counts(&self, counts: &[u64]) -> &Self {
        self.state().queued_counts = counts.iter().copied().collect();
        self
    }

    /// Put a tag on the project as if another process created it.
    pub fn add_tag(&self, name: &str) -> String {
        let mut state = self.state();
        let id = state.next_id("tag");
        state.tags.push(ProjectTag {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    /// Like [`add_tag`](Self::add_tag), but the tag vanishes after it has
    /// been listed `listings` times.
    pub fn add_expiring_tag(&self, name: &str, listings: u32) -> String {
        let id = self.add_tag(name);
        self.state().expiring_tags.insert(id.clone(), listings);
        id
    }

    pub fn add_tier(&self, name: &str, id: &str) -> &Self {
        self.state().tiers.push(HardwareTier {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Import a repository; its id is `repo-<name>`.
    pub fn add_repository(&self, name: &str, git_ref: GitRef) -> &Self {
        self.state().repositories.push(ImportedRepository {
            id: format!("repo-{name}"),
            name: name.to_string(),
            git_ref,
        });
        self
    }

    pub fn add_dataset(&self, id: &str, name: &str, path: impl Into<PathBuf>) -> &Self {
        self.state().datasets.push((
            Dataset {
                id: id.to_string(),
                path: path.into(),
            },
            name.to_string(),
        ));
        self
    }

    /// Poll sequence for every snapshot created from now on. Default: Active.
    pub fn script_snapshots(&self, statuses: &[SnapshotStatus]) -> &Self {
        self.state().snapshot_script = statuses.to_vec();
        self
    }

    pub fn set_snapshot_time_ms(&self, ms: i64) -> &Self {
        self.state().snapshot_time_ms = ms;
        self
    }

    // --- inspection --------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn started_jobs(&self) -> Vec<StartJobRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::StartJob(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    /// Commands of started jobs, in submission order.
    pub fn started_commands(&self) -> Vec<String> {
        self.started_jobs()
            .into_iter()
            .map(|r| r.command_to_run)
            .collect()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.state().tags.iter().map(|t| t.name.clone()).collect()
    }

    pub fn repository(&self, name: &str) -> Option<ImportedRepository> {
        self.state()
            .repositories
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    pub fn comments(&self) -> Vec<(String, String)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::PostJobComment { job_id, comment } => Some((job_id.clone(), comment.clone())),
                _ => None,
            })
            .collect()
    }

    fn push_call(&self, call: Call) {
        self.state().calls.push(call);
    }

    fn record(&self, call: Call) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

fn api_error(method: &str, endpoint: String, status: u16, message: &str) -> ServiceError {
    ServiceError::ApiError {
        method: method.to_string(),
        endpoint,
        request: String::new(),
        status,
        message: message.to_string(),
    }
}

/// Pop the front status unless it is the last one.
fn advance<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl JobService for FakeJobService {
    async fn start_job(&self, request: &StartJobRequest) -> Result<JobId> {
        let mut state = self.record(Call::StartJob(request.clone()));
        if state.fail_start.contains(&request.command_to_run) {
            return Err(api_error("POST", "jobs/start".into(), 500, "start failed"));
        }

        let script = state
            .scripts
            .get_mut(&request.command_to_run)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| vec![ExecutionStatus::Succeeded]);

        let id = state.next_id("job");
        state.jobs.insert(
            id.clone(),
            FakeJob {
                command: request.command_to_run.clone(),
                statuses: script.into_iter().collect(),
            },
        );
        Ok(id)
    }

    async fn job_status(&self, job_id: &str) -> Result<ExecutionStatus> {
        let mut state = self.record(Call::JobStatus(job_id.to_string()));
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| api_error("GET", format!("jobs/{job_id}"), 404, "no such job"))?;
        tracing::trace!(command = %job.command, "fake job polled");
        Ok(advance(&mut job.statuses).unwrap_or(ExecutionStatus::Succeeded))
    }

    async fn queued_job_count(&self, _project_id: &str) -> Result<u64> {
        let mut state = self.record(Call::QueuedJobCount);
        Ok(advance(&mut state.queued_counts).unwrap_or(0))
    }

    async fn project_tags(&self, _project_id: &str) -> Result<Vec<ProjectTag>> {
        let mut state = self.record(Call::ProjectTags);
        let listed = state.tags.clone();

        let mut expired = Vec::new();
        for (id, remaining) in state.expiring_tags.iter_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                expired.push(id.clone());
            }
        }
        for id in expired {
            state.expiring_tags.remove(&id);
            state.tags.retain(|t| t.id != id);
        }

        Ok(listed)
    }

    async fn create_project_tag(&self, _project_id: &str, name: &str) -> Result<String> {
        let mut state = self.record(Call::CreateProjectTag(name.to_string()));
        let id = state.next_id("tag");
        state.tags.push(ProjectTag {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn delete_project_tag(&self, project_id: &str, tag_id: &str) -> Result<()> {
        let mut state = self.record(Call::DeleteProjectTag(tag_id.to_string()));
        let before = state.tags.len();
        state.tags.retain(|t| t.id != tag_id);
        if state.tags.len() == before {
            return Err(api_error(
                "DELETE",
                format!("projects/{project_id}/tags/{tag_id}"),
                404,
                "no such tag",
            ));
        }
        Ok(())
    }

    async fn hardware_tiers(&self, _project_id: &str) -> Result<Vec<HardwareTier>> {
        Ok(self.record(Call::HardwareTiers).tiers.clone())
    }

    async fn imported_repositories(&self, _project_id: &str) -> Result<Vec<ImportedRepository>> {
        Ok(self.record(Call::ImportedRepositories).repositories.clone())
    }

    async fn set_repository_ref(
        &self,
        project_id: &str,
        repository_id: &str,
        git_ref: &GitRef,
    ) -> Result<()> {
        let mut state = self.record(Call::SetRepositoryRef {
            repository_id: repository_id.to_string(),
            git_ref: git_ref.clone(),
        });
        let repo = state
            .repositories
            .iter_mut()
            .find(|r| r.id == repository_id)
            .ok_or_else(|| {
                api_error(
                    "PUT",
                    format!("projects/{project_id}/gitRepositories/{repository_id}/ref"),
                    404,
                    "no such repository",
                )
            })?;
        repo.git_ref = git_ref.clone();
        Ok(())
    }

    async fn project_datasets(&self, _project_id: &str) -> Result<Vec<Dataset>> {
        let state = self.record(Call::ProjectDatasets);
        Ok(state.datasets.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn create_snapshot(&self, dataset_id: &str, paths: &[String]) -> Result<Snapshot> {
        let mut state = self.record(Call::CreateSnapshot {
            dataset_id: dataset_id.to_string(),
            paths: paths.to_vec(),
        });
        let id = state.next_id("snapshot");
        let script = if state.snapshot_script.is_empty() {
            vec![SnapshotStatus::Active]
        } else {
            state.snapshot_script.clone()
        };
        state.snapshots.insert(id.clone(), script.into_iter().collect());
        Ok(Snapshot {
            id,
            dataset_id: dataset_id.to_string(),
            creation_time_ms: state.snapshot_time_ms,
        })
    }

    async fn snapshot_status(&self, snapshot_id: &str) -> Result<SnapshotStatus> {
        let mut state = self.record(Call::SnapshotStatus(snapshot_id.to_string()));
        let queue = state.snapshots.get_mut(snapshot_id).ok_or_else(|| {
            api_error(
                "GET",
                format!("datasetrw/snapshot/{snapshot_id}"),
                404,
                "no such snapshot",
            )
        })?;
        Ok(advance(queue).unwrap_or(SnapshotStatus::Active))
    }

    async fn dataset_name(&self, dataset_id: &str) -> Result<String> {
        let state = self.record(Call::DatasetName(dataset_id.to_string()));
        state
            .datasets
            .iter()
            .find(|(d, _)| d.id == dataset_id)
            .map(|(_, name)| name.clone())
            .ok_or_else(|| {
                api_error(
                    "GET",
                    format!("datasetrw/datasets/{dataset_id}"),
                    404,
                    "no such dataset",
                )
            })
    }

    async fn tag_snapshot(&self, dataset_id: &str, snapshot_id: &str, tag: &str) -> Result<()> {
        self.push_call(Call::TagSnapshot {
            dataset_id: dataset_id.to_string(),
            snapshot_id: snapshot_id.to_string(),
            tag: tag.to_string(),
        });
        Ok(())
    }

    async fn post_job_comment(&self, job_id: &str, comment: &str) -> Result<()> {
        self.push_call(Call::PostJobComment {
            job_id: job_id.to_string(),
            comment: comment.to_string(),
        });
        Ok(())
    }
}
