use std::fmt;

use serde::{Deserialize, Serialize};

pub const JSONL_SUFFIX: &str = ".jsonl";
pub const MAX_BAD_RECORDS: u32 = 10;

/// Object-finalize notification from Cloud Storage. Only `bucket` and
/// `name` are read; the rest of the object resource is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObjectEvent {
    pub bucket: String,
    pub name: String,
}

impl StorageObjectEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    pub fn gcs_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    /// Plain suffix test on the object name, anywhere in the bucket.
    pub fn is_eligible(&self, suffix: &str) -> bool {
        self.name.ends_with(suffix)
    }
}

/// Destination table, always in the project the load job runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub dataset_id: String,
    pub table_id: String,
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset_id, self.table_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    NewlineDelimitedJson,
}

impl SourceFormat {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            SourceFormat::NewlineDelimitedJson => "NEWLINE_DELIMITED_JSON",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    WriteAppend,
}

impl WriteDisposition {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            WriteDisposition::WriteAppend => "WRITE_APPEND",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobConfig {
    pub source_format: SourceFormat,
    pub write_disposition: WriteDisposition,
    pub autodetect: bool,
    pub ignore_unknown_values: bool,
    pub max_bad_records: u32,
}

impl LoadJobConfig {
    /// Append-only JSONL load against a pre-existing table schema.
    pub fn jsonl_append() -> Self {
        Self {
            source_format: SourceFormat::NewlineDelimitedJson,
            write_disposition: WriteDisposition::WriteAppend,
            autodetect: false,
            ignore_unknown_values: true,
            max_bad_records: MAX_BAD_RECORDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobRequest {
    pub source_uri: String,
    pub destination: TableReference,
    pub config: LoadJobConfig,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedLoadJob {
    pub job: JobReference,
    pub output_rows: u64,
    pub bad_records: u64,
    pub input_files: u64,
    pub input_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Skipped { name: String },
    Loaded(CompletedLoadJob),
}
