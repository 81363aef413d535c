use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use gcp_auth::TokenProvider;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::BigQuerySettings,
    domain::{
        error::LoaderError,
        models::{CompletedLoadJob, JobReference, LoadJobRequest},
        ports::Warehouse,
    },
};

use super::types::{GoogleErrorResponse, JobInsertRequest, JobResource};

pub const BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com";
const BIGQUERY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/bigquery"];
const EMULATOR_TOKEN: &str = "emulator";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

enum Credentials {
    ApplicationDefault(Arc<dyn TokenProvider>),
    Static(String),
}

/// [`Warehouse`] backed by the BigQuery v2 REST API.
pub struct BigQueryWarehouse {
    client: Client,
    credentials: Credentials,
    base_url: String,
    project_id: String,
    poll_interval: Duration,
}

impl std::fmt::Debug for BigQueryWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryWarehouse")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl BigQueryWarehouse {
    pub async fn from_settings(settings: &BigQuerySettings) -> Result<Self, LoaderError> {
        if let Some(host) = &settings.emulator_host {
            let project_id = settings.project_id.clone().ok_or_else(|| {
                LoaderError::Config("GOOGLE_CLOUD_PROJECT is required with BIGQUERY_EMULATOR_HOST".to_string())
            })?;
            return Self::with_static_token(host, project_id, EMULATOR_TOKEN, settings.poll_interval);
        }

        debug!("Discovering application default credentials");
        let token_provider = gcp_auth::provider().await.map_err(|e| {
            error!("Failed to initialize GCP authentication: {}", e);
            LoaderError::Auth(format!("failed to initialize GCP authentication: {e}"))
        })?;

        let project_id = match &settings.project_id {
            Some(project_id) => project_id.clone(),
            None => token_provider
                .project_id()
                .await
                .map_err(|e| LoaderError::Auth(format!("failed to resolve GCP project: {e}")))?
                .to_string(),
        };
        info!("BigQuery project: {}", project_id);

        Ok(Self {
            client: build_http_client()?,
            credentials: Credentials::ApplicationDefault(token_provider),
            base_url: BIGQUERY_API_URL.to_string(),
            project_id,
            poll_interval: settings.poll_interval,
        })
    }

    /// Talks to `base_url` with a fixed bearer token, as used against an emulator.
    pub fn with_static_token(
        base_url: &str,
        project_id: impl Into<String>,
        token: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self, LoaderError> {
        Ok(Self {
            client: build_http_client()?,
            credentials: Credentials::Static(token.into()),
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            poll_interval,
        })
    }

    async fn access_token(&self) -> Result<String, LoaderError> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::ApplicationDefault(provider) => {
                let token = provider.token(BIGQUERY_SCOPES).await.map_err(|e| {
                    error!("Failed to get GCP access token: {}", e);
                    LoaderError::Auth(format!("failed to get BigQuery access token: {e}"))
                })?;
                Ok(token.as_str().to_string())
            }
        }
    }

    fn jobs_url(&self, project_id: &str) -> String {
        format!("{}/bigquery/v2/projects/{}/jobs", self.base_url, project_id)
    }

    async fn get_job(&self, job: &JobReference) -> Result<JobResource, LoaderError> {
        let url = format!("{}/{}", self.jobs_url(&job.project_id), job.job_id);
        let access_token = self.access_token().await?;

        let response = self
            .client
            .get(&url)
            .bearer_auth(&access_token)
            .query(&[("location", job.location.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!("Failed to poll job {}: {}", job.job_id, e);
                LoaderError::Transport(e.to_string())
            })?;

        decode_response(response).await
    }
}

fn build_http_client() -> Result<Client, LoaderError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| LoaderError::Config(format!("failed to create HTTP client: {e}")))
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, LoaderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| LoaderError::Transport(e.to_string()))?;

    if !status.is_success() {
        let message = match serde_json::from_str::<GoogleErrorResponse>(&body) {
            Ok(envelope) if envelope.error.status.is_empty() => envelope.error.message,
            Ok(envelope) => format!("{} ({})", envelope.error.message, envelope.error.status),
            Err(_) => body,
        };
        return Err(LoaderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| LoaderError::InvalidResponse(e.to_string()))
}

fn parse_count(value: Option<&String>) -> Result<u64, LoaderError> {
    match value {
        None => Ok(0),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| LoaderError::InvalidResponse(format!("expected an int64 string, got '{}'", raw))),
    }
}

fn elapsed_seconds(resource: &JobResource) -> Option<f64> {
    let stats = resource.statistics.as_ref()?;
    let start = stats.start_time.as_ref()?.parse::<i64>().ok()?;
    let end = stats.end_time.as_ref()?.parse::<i64>().ok()?;
    let start = DateTime::from_timestamp_millis(start)?;
    let end = DateTime::from_timestamp_millis(end)?;
    Some((end - start).num_milliseconds() as f64 / 1000.0)
}

/// Turns a finished job resource into a domain result.
fn completed_job(job: &JobReference, resource: JobResource) -> Result<CompletedLoadJob, LoaderError> {
    let status = resource.status.clone().unwrap_or_default();
    if let Some(error_result) = status.error_result {
        let errors: Vec<String> = status.errors.iter().map(|e| e.describe()).collect();
        for detail in &errors {
            warn!("Load job {} error: {}", job.job_id, detail);
        }
        return Err(LoaderError::JobFailed {
            job_id: job.job_id.clone(),
            reason: error_result.reason,
            message: error_result.message,
            errors,
        });
    }

    if let Some(seconds) = elapsed_seconds(&resource) {
        debug!("Load job {} ran for {:.3}s", job.job_id, seconds);
    }

    let load = resource
        .statistics
        .and_then(|s| s.load)
        .unwrap_or_default();

    Ok(CompletedLoadJob {
        job: job.clone(),
        output_rows: parse_count(load.output_rows.as_ref())?,
        bad_records: parse_count(load.bad_records.as_ref())?,
        input_files: parse_count(load.input_files.as_ref())?,
        input_bytes: parse_count(load.input_file_bytes.as_ref())?,
    })
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn submit_load_job(&self, request: &LoadJobRequest) -> Result<JobReference, LoaderError> {
        let job_id = Uuid::new_v4().to_string();
        let body = JobInsertRequest::load(request, &self.project_id, &job_id);
        let access_token = self.access_token().await?;

        debug!("Inserting load job {} into {}", job_id, self.jobs_url(&self.project_id));
        let response = self
            .client
            .post(self.jobs_url(&self.project_id))
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to submit load job for {}: {}", request.source_uri, e);
                LoaderError::Transport(e.to_string())
            })?;

        let resource: JobResource = decode_response(response).await?;
        let reference = resource.job_reference.unwrap_or(body.job_reference);

        Ok(JobReference {
            project_id: reference.project_id,
            job_id: reference.job_id,
            location: reference.location.unwrap_or_else(|| request.location.clone()),
        })
    }

    async fn wait_for_job(&self, job: &JobReference) -> Result<CompletedLoadJob, LoaderError> {
        let mut polls = 0u32;
        loop {
            polls += 1;
            let resource = self.get_job(job).await?;
            if resource.is_done() {
                debug!("Load job {} done after {} polls", job.job_id, polls);
                return completed_job(job, resource);
            }

            let state = resource.status.as_ref().map(|s| s.state.as_str()).unwrap_or("UNKNOWN");
            debug!("Load job {} is {}, polling again", job.job_id, state);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
