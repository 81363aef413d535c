//! Wire types for the BigQuery v2 `jobs` resource.
//!
//! Only the fields the loader sends or reads are modelled. int64 values
//! arrive as JSON strings, per the Google API JSON mapping.

use serde::{Deserialize, Serialize};

use crate::domain::models::{LoadJobRequest, TableReference};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReferenceResource {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReferenceResource {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReferenceResource {
    pub fn in_project(table: &TableReference, project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            dataset_id: table.dataset_id.clone(),
            table_id: table.table_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationLoad {
    pub source_uris: Vec<String>,
    pub destination_table: TableReferenceResource,
    pub source_format: &'static str,
    pub write_disposition: &'static str,
    pub autodetect: bool,
    pub ignore_unknown_values: bool,
    pub max_bad_records: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobConfiguration {
    pub load: JobConfigurationLoad,
}

/// Body of `jobs.insert`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInsertRequest {
    pub job_reference: JobReferenceResource,
    pub configuration: JobConfiguration,
}

impl JobInsertRequest {
    pub fn load(request: &LoadJobRequest, project_id: &str, job_id: &str) -> Self {
        Self {
            job_reference: JobReferenceResource {
                project_id: project_id.to_string(),
                job_id: job_id.to_string(),
                location: Some(request.location.clone()),
            },
            configuration: JobConfiguration {
                load: JobConfigurationLoad {
                    source_uris: vec![request.source_uri.clone()],
                    destination_table: TableReferenceResource::in_project(&request.destination, project_id),
                    source_format: request.config.source_format.as_api_str(),
                    write_disposition: request.config.write_disposition.as_api_str(),
                    autodetect: request.config.autodetect,
                    ignore_unknown_values: request.config.ignore_unknown_values,
                    max_bad_records: request.config.max_bad_records,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub job_reference: Option<JobReferenceResource>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub statistics: Option<JobStatistics>,
}

impl JobResource {
    pub fn is_done(&self) -> bool {
        self.status.as_ref().map_or(false, |s| s.state == "DONE")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub error_result: Option<ErrorProto>,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl ErrorProto {
    pub fn describe(&self) -> String {
        match &self.location {
            Some(location) => format!("{} ({}): {}", self.reason, location, self.message),
            None => format!("{}: {}", self.reason, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub load: Option<LoadStatistics>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatistics {
    #[serde(default)]
    pub output_rows: Option<String>,
    #[serde(default)]
    pub bad_records: Option<String>,
    #[serde(default)]
    pub input_files: Option<String>,
    #[serde(default)]
    pub input_file_bytes: Option<String>,
}

/// Standard Google API error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}
