use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::domain::error::LoaderError;

pub const DEFAULT_DATASET: &str = "raw_glamira";
pub const DEFAULT_TABLE: &str = "glamira_user_event_raw_logs";
pub const PROCESSING_LOCATION: &str = "asia-southeast1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_PORT: u16 = 8080;

const MAX_IDENTIFIER_CHARS: usize = 1024;
const DATASET_ID_PATTERN: &str = r"^[A-Za-z0-9_]+$";
/// Table name with an optional partition decorator such as `$20240101`.
const TABLE_ID_PATTERN: &str = r"^[\p{L}\p{M}\p{N}\p{Pc}\p{Pd} ]+(\$[A-Za-z0-9_]+)?$";

/// Destination of every load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub dataset_id: String,
    pub table_id: String,
    pub location: String,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            dataset_id: DEFAULT_DATASET.to_string(),
            table_id: DEFAULT_TABLE.to_string(),
            location: PROCESSING_LOCATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigQuerySettings {
    pub project_id: Option<String>,
    /// Base URL of a local BigQuery emulator; disables credential discovery.
    pub emulator_host: Option<String>,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub loader: LoaderSettings,
    pub bigquery: BigQuerySettings,
    pub server: ServerSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, LoaderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoaderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dataset_id = non_empty("BIGQUERY_DATASET").unwrap_or_else(|| DEFAULT_DATASET.to_string());
        let table_id = non_empty("BIGQUERY_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        validate_identifier("BIGQUERY_DATASET", &dataset_id, DATASET_ID_PATTERN)?;
        validate_identifier("BIGQUERY_TABLE", &table_id, TABLE_ID_PATTERN)?;
        info!("Destination table: {}.{} ({})", dataset_id, table_id, PROCESSING_LOCATION);

        let project_id = non_empty("GOOGLE_CLOUD_PROJECT");
        let emulator_host = non_empty("BIGQUERY_EMULATOR_HOST")
            .map(|host| host.trim_end_matches('/').to_string());
        if let Some(host) = &emulator_host {
            info!("Using BigQuery emulator: {}", host);
        }

        let poll_interval_ms = match non_empty("BIGQUERY_POLL_INTERVAL_MS") {
            Some(raw) => parse_number::<u64>("BIGQUERY_POLL_INTERVAL_MS", &raw)?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };
        if poll_interval_ms == 0 {
            return Err(LoaderError::Config(
                "BIGQUERY_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        let port = match non_empty("PORT") {
            Some(raw) => parse_number::<u16>("PORT", &raw)?,
            None => DEFAULT_PORT,
        };
        debug!("project={:?}, poll_interval_ms={}, port={}", project_id, poll_interval_ms, port);

        Ok(Self {
            loader: LoaderSettings {
                dataset_id,
                table_id,
                location: PROCESSING_LOCATION.to_string(),
            },
            bigquery: BigQuerySettings {
                project_id,
                emulator_host,
                poll_interval: Duration::from_millis(poll_interval_ms),
            },
            server: ServerSettings { port },
        })
    }
}

fn validate_identifier(key: &str, value: &str, pattern: &str) -> Result<(), LoaderError> {
    let regex = Regex::new(pattern).map_err(|e| LoaderError::Config(e.to_string()))?;
    if regex.is_match(value) && value.chars().count() <= MAX_IDENTIFIER_CHARS {
        Ok(())
    } else {
        Err(LoaderError::Config(format!("{} has an invalid value: '{}'", key, value)))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, LoaderError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| LoaderError::Config(format!("{} must be a number, got '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, LoaderError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_overrides() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.loader, LoaderSettings::default());
        assert_eq!(config.loader.dataset_id, "raw_glamira");
        assert_eq!(config.loader.table_id, "glamira_user_event_raw_logs");
        assert_eq!(config.loader.location, "asia-southeast1");
        assert_eq!(config.bigquery.project_id, None);
        assert_eq!(config.bigquery.emulator_host, None);
        assert_eq!(config.bigquery.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn environment_overrides_destination() {
        let config = config_from(&[
            ("BIGQUERY_DATASET", "staging"),
            ("BIGQUERY_TABLE", "events-v2"),
            ("GOOGLE_CLOUD_PROJECT", "my-project"),
            ("BIGQUERY_EMULATOR_HOST", "http://localhost:9050/"),
            ("BIGQUERY_POLL_INTERVAL_MS", "250"),
            ("PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.loader.dataset_id, "staging");
        assert_eq!(config.loader.table_id, "events-v2");
        assert_eq!(config.bigquery.project_id.as_deref(), Some("my-project"));
        assert_eq!(config.bigquery.emulator_host.as_deref(), Some("http://localhost:9050"));
        assert_eq!(config.bigquery.poll_interval, Duration::from_millis(250));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn empty_override_falls_back_to_default() {
        let config = config_from(&[("BIGQUERY_DATASET", "  ")]).unwrap();
        assert_eq!(config.loader.dataset_id, DEFAULT_DATASET);
    }

    #[test]
    fn identifier_patterns_compile() {
        assert!(Regex::new(DATASET_ID_PATTERN).is_ok());
        assert!(Regex::new(TABLE_ID_PATTERN).is_ok());
    }

    #[test]
    fn accepts_partition_decorated_table() {
        let config = config_from(&[("BIGQUERY_TABLE", "events$20240101")]).unwrap();
        assert_eq!(config.loader.table_id, "events$20240101");

        let config = config_from(&[("BIGQUERY_TABLE", "événements_2024")]).unwrap();
        assert_eq!(config.loader.table_id, "événements_2024");
    }

    #[test]
    fn rejects_overlong_identifiers() {
        let long = "a".repeat(MAX_IDENTIFIER_CHARS + 1);
        assert!(config_from(&[("BIGQUERY_DATASET", long.as_str())]).is_err());
        assert!(config_from(&[("BIGQUERY_TABLE", long.as_str())]).is_err());

        let longest = "a".repeat(MAX_IDENTIFIER_CHARS);
        assert!(config_from(&[("BIGQUERY_TABLE", longest.as_str())]).is_ok());
    }

    #[test]
    fn rejects_invalid_identifiers() {
        let err = config_from(&[("BIGQUERY_DATASET", "raw-glamira")]).unwrap_err();
        assert!(matches!(err, LoaderError::Config(_)));

        let err = config_from(&[("BIGQUERY_TABLE", "a.b")]).unwrap_err();
        assert!(matches!(err, LoaderError::Config(_)));

        let err = config_from(&[("BIGQUERY_TABLE", "events$")]).unwrap_err();
        assert!(matches!(err, LoaderError::Config(_)));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(config_from(&[("PORT", "http")]).is_err());
        assert!(config_from(&[("BIGQUERY_POLL_INTERVAL_MS", "0")]).is_err());
    }
}
