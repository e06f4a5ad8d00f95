//! HTTP implementation of [`JobService`] against the platform's v4 REST API.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error};

use super::error::{Result, ServiceError};
use super::{
    Dataset, HardwareTier, ImportedRepository, JobService, ProjectTag, Snapshot, StartJobRequest,
};
use crate::types::{ExecutionStatus, GitRef, JobId, SnapshotStatus};

const API_KEY_HEADER: &str = "X-Domino-Api-Key";

/// HTTP client for the remote job service.
#[derive(Debug, Clone)]
pub struct HttpJobService {
    /// Base URL of the API host (e.g. "https://platform.example.com")
    base_url: String,
    api_key: String,
    client: Client,
}

impl HttpJobService {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(base_url, api_key, Client::new())
    }

    /// Create a client around a preconfigured reqwest `Client` (timeouts,
    /// proxies, TLS settings).
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Send a request and return the raw response body.
    ///
    /// Non-2xx responses become [`ServiceError::ApiError`] carrying both the
    /// request body and the response body, which are also logged.
    async fn request_text(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<String> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let request_body = body.as_ref().map(Value::to_string).unwrap_or_default();

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "application/json");
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await.inspect_err(|e| {
            error!(%method, endpoint, request = %request_body, error = %e, "remote API request failed");
        })?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(
                %method,
                endpoint,
                status = status.as_u16(),
                request = %request_body,
                response = %text,
                "remote API call returned an error status"
            );
            return Err(ServiceError::ApiError {
                method: method.to_string(),
                endpoint: endpoint.to_string(),
                request: request_body,
                status: status.as_u16(),
                message: text,
            });
        }

        debug!(%method, endpoint, status = status.as_u16(), "remote API call succeeded");
        Ok(text)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let text = self.request_text(method, endpoint, body).await?;
        serde_json::from_str(&text).map_err(|e| {
            error!(endpoint, response = %text, error = %e, "unexpected response shape");
            ServiceError::parse_error(endpoint, format!("{e}; body: {text}"))
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobDto {
    statuses: JobStatusesDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusesDto {
    execution_status: String,
}

#[derive(Deserialize)]
struct IdDto {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobPageDto {
    total_count: u64,
}

#[derive(Deserialize)]
struct ProjectSummaryDto {
    #[serde(default)]
    tags: Vec<TagDto>,
}

#[derive(Deserialize)]
struct TagDto {
    #[serde(default)]
    id: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardwareTierEntryDto {
    hardware_tier: HardwareTierDto,
}

#[derive(Deserialize)]
struct HardwareTierDto {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct RepositoryDto {
    id: String,
    name: String,
    #[serde(rename = "ref")]
    git_ref: GitRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetEntryDto {
    dataset_rw_dto: DatasetRwDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetRwDto {
    id: String,
    dataset_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotCreatedDto {
    id: String,
    dataset_id: String,
    creation_time: i64,
}

#[derive(Deserialize)]
struct SnapshotEnvelopeDto {
    snapshot: SnapshotStateDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotStateDto {
    lifecycle_status: String,
}

#[derive(Deserialize)]
struct DatasetNameDto {
    name: String,
}

#[async_trait]
impl JobService for HttpJobService {
    async fn start_job(&self, request: &StartJobRequest) -> Result<JobId> {
        let endpoint = "v4/jobs/start";
        let body = serde_json::to_value(request)
            .map_err(|e| ServiceError::parse_error(endpoint, format!("serializing request: {e}")))?;
        let job: IdDto = self.request_json(Method::POST, endpoint, Some(body)).await?;
        Ok(job.id)
    }

    async fn job_status(&self, job_id: &str) -> Result<ExecutionStatus> {
        let endpoint = format!("v4/jobs/{job_id}");
        let job: JobDto = self.request_json(Method::GET, &endpoint, None).await?;
        Ok(ExecutionStatus::from(job.statuses.execution_status.as_str()))
    }

    async fn queued_job_count(&self, project_id: &str) -> Result<u64> {
        let endpoint = format!("v4/jobs?projectId={project_id}&status=queued");
        let page: JobPageDto = self.request_json(Method::GET, &endpoint, None).await?;
        Ok(page.total_count)
    }

    async fn project_tags(&self, project_id: &str) -> Result<Vec<ProjectTag>> {
        let endpoint = format!("v4/projects/{project_id}");
        let summary: ProjectSummaryDto = self.request_json(Method::GET, &endpoint, None).await?;
        Ok(summary
            .tags
            .into_iter()
            .map(|t| ProjectTag {
                id: t.id,
                name: t.name,
            })
            .collect())
    }

    async fn create_project_tag(&self, project_id: &str, name: &str) -> Result<String> {
        let endpoint = format!("v4/projects/{project_id}/tags");
        let body = json!({ "tagNames": [name] });
        let created: Vec<TagDto> = self.request_json(Method::POST, &endpoint, Some(body)).await?;
        created
            .into_iter()
            .next()
            .map(|t| t.id)
            .ok_or_else(|| {
                ServiceError::parse_error(endpoint, format!("tag '{name}' missing from response"))
            })
    }

    async fn delete_project_tag(&self, project_id: &str, tag_id: &str) -> Result<()> {
        let endpoint = format!("v4/projects/{project_id}/tags/{tag_id}");
        self.request_text(Method::DELETE, &endpoint, None).await?;
        Ok(())
    }

    async fn hardware_tiers(&self, project_id: &str) -> Result<Vec<HardwareTier>> {
        let endpoint = format!("v4/projects/{project_id}/hardwareTiers");
        let tiers: Vec<HardwareTierEntryDto> =
            self.request_json(Method::GET, &endpoint, None).await?;
        Ok(tiers
            .into_iter()
            .map(|t| HardwareTier {
                id: t.hardware_tier.id,
                name: t.hardware_tier.name,
            })
            .collect())
    }

    async fn imported_repositories(&self, project_id: &str) -> Result<Vec<ImportedRepository>> {
        let endpoint = format!("v4/projects/{project_id}/gitRepositories");
        let repos: Vec<RepositoryDto> = self.request_json(Method::GET, &endpoint, None).await?;
        Ok(repos
            .into_iter()
            .map(|r| ImportedRepository {
                id: r.id,
                name: r.name,
                git_ref: r.git_ref,
            })
            .collect())
    }

    async fn set_repository_ref(
        &self,
        project_id: &str,
        repository_id: &str,
        git_ref: &GitRef,
    ) -> Result<()> {
        let endpoint = format!("v4/projects/{project_id}/gitRepositories/{repository_id}/ref");
        let body = serde_json::to_value(git_ref)
            .map_err(|e| ServiceError::parse_error(&endpoint, format!("serializing ref: {e}")))?;
        self.request_text(Method::PUT, &endpoint, Some(body)).await?;
        Ok(())
    }

    async fn project_datasets(&self, project_id: &str) -> Result<Vec<Dataset>> {
        let endpoint = format!("v4/datasetrw/datasets-v2?projectIdsToInclude={project_id}");
        let datasets: Vec<DatasetEntryDto> =
            self.request_json(Method::GET, &endpoint, None).await?;
        Ok(datasets
            .into_iter()
            .map(|d| Dataset {
                id: d.dataset_rw_dto.id,
                path: d.dataset_rw_dto.dataset_path.into(),
            })
            .collect())
    }

    async fn create_snapshot(&self, dataset_id: &str, paths: &[String]) -> Result<Snapshot> {
        let body = json!({ "relativeFilePaths": paths, "datasetId": dataset_id });
        let created: SnapshotCreatedDto = self
            .request_json(Method::POST, "v4/datasetrw/snapshot", Some(body))
            .await?;
        Ok(Snapshot {
            id: created.id,
            dataset_id: created.dataset_id,
            creation_time_ms: created.creation_time,
        })
    }

    async fn snapshot_status(&self, snapshot_id: &str) -> Result<SnapshotStatus> {
        let endpoint = format!("v4/datasetrw/snapshot/{snapshot_id}");
        let envelope: SnapshotEnvelopeDto = self.request_json(Method::GET, &endpoint, None).await?;
        Ok(SnapshotStatus::from(envelope.snapshot.lifecycle_status.as_str()))
    }

    async fn dataset_name(&self, dataset_id: &str) -> Result<String> {
        let endpoint = format!("v4/datasetrw/datasets/{dataset_id}");
        let dataset: DatasetNameDto = self.request_json(Method::GET, &endpoint, None).await?;
        Ok(dataset.name)
    }

    async fn tag_snapshot(&self, dataset_id: &str, snapshot_id: &str, tag: &str) -> Result<()> {
        let endpoint = format!("v4/datasetrw/dataset/{dataset_id}/tag");
        let body = json!({ "snapshotId": snapshot_id, "tag": tag });
        self.request_text(Method::POST, &endpoint, Some(body)).await?;
        Ok(())
    }

    async fn post_job_comment(&self, job_id: &str, comment: &str) -> Result<()> {
        let endpoint = format!("v4/jobs/{job_id}/comment");
        let body = json!({ "comment": comment });
        self.request_text(Method::POST, &endpoint, Some(body)).await?;
        Ok(())
    }
}
