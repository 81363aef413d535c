use async_trait::async_trait;
use crate::domain::{
    error::LoaderError,
    models::{CompletedLoadJob, JobReference, LoadJobRequest},
};

#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn submit_load_job(&self, request: &LoadJobRequest) -> Result<JobReference, LoaderError>;

    /// Blocks until the job reaches a terminal state.
    async fn wait_for_job(&self, job: &JobReference) -> Result<CompletedLoadJob, LoaderError>;
}
