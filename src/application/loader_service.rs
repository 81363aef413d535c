use std::sync::Arc;
use tracing::{info, debug, error};
use crate::{
    config::LoaderSettings,
    domain::{
        error::LoaderError,
        models::{LoadJobConfig, LoadJobRequest, LoadOutcome, StorageObjectEvent, TableReference, JSONL_SUFFIX},
        ports::Warehouse,
    },
};

pub struct LoaderService {
    warehouse: Arc<dyn Warehouse>,
    settings: LoaderSettings,
}

impl LoaderService {
    pub fn new(warehouse: Arc<dyn Warehouse>, settings: LoaderSettings) -> Self {
        Self { warehouse, settings }
    }

    pub async fn handle_event(&self, event: StorageObjectEvent) -> Result<LoadOutcome, LoaderError> {
        debug!("Received storage event - bucket: {}, name: {}", event.bucket, event.name);

        if !event.is_eligible(JSONL_SUFFIX) {
            info!("Skipping non-JSONL file: {}", event.name);
            return Ok(LoadOutcome::Skipped { name: event.name });
        }

        let request = self.build_request(&event);

        info!("Loading {} to {}", event.name, request.destination);
        info!("GCS URI: {}", request.source_uri);

        match self.run_load_job(&request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Error loading {}: {}", event.name, e);
                Err(e)
            }
        }
    }

    fn build_request(&self, event: &StorageObjectEvent) -> LoadJobRequest {
        LoadJobRequest {
            source_uri: event.gcs_uri(),
            destination: TableReference {
                dataset_id: self.settings.dataset_id.clone(),
                table_id: self.settings.table_id.clone(),
            },
            config: LoadJobConfig::jsonl_append(),
            location: self.settings.location.clone(),
        }
    }

    async fn run_load_job(&self, request: &LoadJobRequest) -> Result<LoadOutcome, LoaderError> {
        let job = self.warehouse.submit_load_job(request).await?;
        debug!("Submitted load job {} in {}, waiting for completion", job.job_id, job.location);

        let completed = self.warehouse.wait_for_job(&job).await?;

        info!("Successfully loaded {} rows", completed.output_rows);
        info!("Job ID: {}", completed.job.job_id);
        if completed.bad_records > 0 {
            info!("Skipped {} bad records", completed.bad_records);
        }
        Ok(LoadOutcome::Loaded(completed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CompletedLoadJob, JobReference};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory warehouse recording every submitted request.
    #[derive(Default)]
    struct RecordingWarehouse {
        submitted: Mutex<Vec<LoadJobRequest>>,
        waited: Mutex<Vec<JobReference>>,
        fail_submit: bool,
        fail_job: bool,
    }

    #[async_trait]
    impl Warehouse for RecordingWarehouse {
        async fn submit_load_job(&self, request: &LoadJobRequest) -> Result<JobReference, LoaderError> {
            self.submitted.lock().unwrap().push(request.clone());
            if self.fail_submit {
                return Err(LoaderError::Api {
                    status: 404,
                    message: "Not found: Table p:raw_glamira.glamira_user_event_raw_logs".to_string(),
                });
            }
            Ok(JobReference {
                project_id: "p".to_string(),
                job_id: "job-123".to_string(),
                location: request.location.clone(),
            })
        }

        async fn wait_for_job(&self, job: &JobReference) -> Result<CompletedLoadJob, LoaderError> {
            self.waited.lock().unwrap().push(job.clone());
            if self.fail_job {
                return Err(LoaderError::JobFailed {
                    job_id: job.job_id.clone(),
                    reason: "invalid".to_string(),
                    message: "Error while reading data".to_string(),
                    errors: vec![],
                });
            }
            Ok(CompletedLoadJob {
                job: job.clone(),
                output_rows: 42,
                bad_records: 0,
                input_files: 1,
                input_bytes: 1024,
            })
        }
    }

    fn service(warehouse: Arc<RecordingWarehouse>) -> LoaderService {
        LoaderService::new(warehouse, LoaderSettings::default())
    }

    #[tokio::test]
    async fn skips_non_jsonl_without_submitting() {
        let warehouse = Arc::new(RecordingWarehouse::default());
        let outcome = service(warehouse.clone())
            .handle_event(StorageObjectEvent::new("b1", "readme.txt"))
            .await
            .unwrap();

        assert_eq!(outcome, LoadOutcome::Skipped { name: "readme.txt".to_string() });
        assert!(warehouse.submitted.lock().unwrap().is_empty());
        assert!(warehouse.waited.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn loads_jsonl_into_default_table() {
        let warehouse = Arc::new(RecordingWarehouse::default());
        let outcome = service(warehouse.clone())
            .handle_event(StorageObjectEvent::new("b1", "events/2024-01-01.jsonl"))
            .await
            .unwrap();

        let submitted = warehouse.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let request = &submitted[0];
        assert_eq!(request.source_uri, "gs://b1/events/2024-01-01.jsonl");
        assert_eq!(request.destination.to_string(), "raw_glamira.glamira_user_event_raw_logs");
        assert_eq!(request.location, "asia-southeast1");
        assert_eq!(request.config, LoadJobConfig::jsonl_append());

        match outcome {
            LoadOutcome::Loaded(job) => {
                assert_eq!(job.output_rows, 42);
                assert_eq!(job.job.job_id, "job-123");
            }
            other => panic!("expected a loaded outcome, got {:?}", other),
        }
        assert_eq!(warehouse.waited.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn uses_configured_destination() {
        let warehouse = Arc::new(RecordingWarehouse::default());
        let settings = LoaderSettings {
            dataset_id: "staging".to_string(),
            table_id: "events".to_string(),
            ..LoaderSettings::default()
        };
        LoaderService::new(warehouse.clone(), settings)
            .handle_event(StorageObjectEvent::new("b1", "x.jsonl"))
            .await
            .unwrap();

        let submitted = warehouse.submitted.lock().unwrap();
        assert_eq!(submitted[0].destination.dataset_id, "staging");
        assert_eq!(submitted[0].destination.table_id, "events");
    }

    #[tokio::test]
    async fn submit_failure_is_returned_unchanged() {
        let warehouse = Arc::new(RecordingWarehouse { fail_submit: true, ..Default::default() });
        let err = service(warehouse.clone())
            .handle_event(StorageObjectEvent::new("b1", "x.jsonl"))
            .await
            .unwrap_err();

        assert!(matches!(err, LoaderError::Api { status: 404, .. }));
        assert!(warehouse.waited.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn job_failure_is_returned_unchanged() {
        let warehouse = Arc::new(RecordingWarehouse { fail_job: true, ..Default::default() });
        let err = service(warehouse.clone())
            .handle_event(StorageObjectEvent::new("b1", "x.jsonl"))
            .await
            .unwrap_err();

        match err {
            LoaderError::JobFailed { job_id, reason, .. } => {
                assert_eq!(job_id, "job-123");
                assert_eq!(reason, "invalid");
            }
            other => panic!("expected JobFailed, got {:?}", other),
        }
        assert_eq!(warehouse.submitted.lock().unwrap().len(), 1);
    }
}
