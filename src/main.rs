use gcs_bigquery_loader::{config::AppConfig, function_service::FunctionService};
use tracing::{info, debug};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("gcs_bigquery_loader=debug".parse()?)
            .add_directive("reqwest=warn".parse()?)
            .add_directive("hyper=warn".parse()?))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting GCS to BigQuery loader");
    debug!("Environment variables: BIGQUERY_DATASET={}, BIGQUERY_TABLE={}, GOOGLE_CLOUD_PROJECT={}",
        std::env::var("BIGQUERY_DATASET").unwrap_or_else(|_| "not set".to_string()),
        std::env::var("BIGQUERY_TABLE").unwrap_or_else(|_| "not set".to_string()),
        std::env::var("GOOGLE_CLOUD_PROJECT").unwrap_or_else(|_| "not set".to_string())
    );

    let config = AppConfig::from_env()?;
    let service = FunctionService::new(config).await?;
    info!("Function service initialized successfully");

    service.run().await
}
