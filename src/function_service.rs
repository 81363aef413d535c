use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tokio::signal;
use tracing::{info, error, debug, warn};
use crate::{
    application::loader_service::LoaderService,
    config::AppConfig,
    domain::{
        error::LoaderError,
        models::{LoadOutcome, StorageObjectEvent},
    },
    infrastructure::bigquery::BigQueryWarehouse,
};

/// HTTP entry point receiving storage notifications, one load per request.
pub struct FunctionService {
    service: Arc<LoaderService>,
    port: u16,
}

impl FunctionService {
    pub async fn new(config: AppConfig) -> Result<Self, LoaderError> {
        debug!("Initializing function service");

        let warehouse = BigQueryWarehouse::from_settings(&config.bigquery).await
            .map_err(|e| {
                error!("Failed to initialize BigQuery client: {}", e);
                e
            })?;
        debug!("BigQuery client initialized: {:?}", warehouse);

        let service = LoaderService::new(Arc::new(warehouse), config.loader);
        Ok(Self { service: Arc::new(service), port: config.server.port })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening for storage events on {}", addr);

        axum::serve(listener, router(self.service))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Function service shut down");
        Ok(())
    }
}

pub fn router(service: Arc<LoaderService>) -> Router {
    Router::new()
        .route("/", post(handle_storage_event))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(service)
}

async fn handle_storage_event(
    State(service): State<Arc<LoaderService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(id) = headers.get("ce-id").and_then(|v| v.to_str().ok()) {
        let event_type = headers.get("ce-type").and_then(|v| v.to_str().ok()).unwrap_or("unknown");
        info!("Received CloudEvent {} of type {}", id, event_type);
    }

    let event = match decode_event(&body) {
        Ok(event) => event,
        Err(e) => {
            error!("Rejecting storage event: {}", e);
            return error_response(e);
        }
    };

    match service.handle_event(event).await {
        Ok(LoadOutcome::Skipped { name }) => {
            debug!("No load for {}", name);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(LoadOutcome::Loaded(job)) => {
            debug!("Load job {} appended {} rows", job.job.job_id, job.output_rows);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Accepts the object resource itself (binary CloudEvent) or an envelope
/// carrying it under `data` (structured CloudEvent, background event).
pub fn decode_event(body: &[u8]) -> Result<StorageObjectEvent, LoaderError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| LoaderError::InvalidEvent(format!("body is not JSON: {e}")))?;

    let object = match payload.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => payload,
    };

    serde_json::from_value(object).map_err(|e| LoaderError::InvalidEvent(e.to_string()))
}

fn error_response(err: LoaderError) -> Response {
    // Non-2xx on load failure hands redelivery to the platform.
    let status = match &err {
        e if e.is_load_failure() => StatusCode::INTERNAL_SERVER_ERROR,
        LoaderError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
