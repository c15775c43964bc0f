use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use super::domain::{InvalidWorkerRecord, WorkerId, WorkerRecord, WorkerStatus};
use super::providers::{ProviderError, RosterProvider};

/// Roster loaded from a CSV export, keyed by site.
#[derive(Debug, Clone, Default)]
pub struct CsvRosterProvider {
    sites: BTreeMap<String, Vec<WorkerRecord>>,
}

impl CsvRosterProvider {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RosterImportError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RosterImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut sites: BTreeMap<String, Vec<WorkerRecord>> = BTreeMap::new();

        for (index, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
            let row = record?;
            // header is line 1
            let line = index + 2;
            let status = parse_status(&row.status).ok_or_else(|| {
                RosterImportError::UnknownStatus {
                    line,
                    value: row.status.clone(),
                }
            })?;

            let worker = WorkerRecord {
                worker_id: WorkerId(row.worker_id),
                name: row.name,
                contact: row.contact,
                status,
                acceptance_rate: row.acceptance_rate,
                avg_response_time_seconds: row.avg_response_time_seconds,
                completion_rate: row.completion_rate,
                tenure_days: row.tenure_days,
                distance_km: row.distance_km,
                holiday_experience_count: row.holiday_experience_count.unwrap_or(0),
                peak_availability: row.peak_availability,
                weekend_availability: row.weekend_availability,
            };
            worker
                .validate()
                .map_err(|source| RosterImportError::InvalidRecord { line, source })?;

            sites.entry(row.site_id).or_default().push(worker);
        }

        Ok(Self { sites })
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    pub fn workers(&self, site_id: &str) -> &[WorkerRecord] {
        self.sites.get(site_id).map(Vec::as_slice).unwrap_or_default()
    }
}

#[async_trait]
impl RosterProvider for CsvRosterProvider {
    async fn active_workers(&self, site_id: &str) -> Result<Vec<WorkerRecord>, ProviderError> {
        Ok(self.workers(site_id).to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RosterImportError {
    #[error("failed to open roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse roster: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: unknown worker status '{value}'")]
    UnknownStatus { line: usize, value: String },
    #[error("line {line}: {source}")]
    InvalidRecord {
        line: usize,
        source: InvalidWorkerRecord,
    },
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    worker_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    contact: String,
    site_id: String,
    status: String,
    acceptance_rate: f64,
    avg_response_time_seconds: f64,
    completion_rate: f64,
    tenure_days: u32,
    distance_km: f64,
    #[serde(default)]
    holiday_experience_count: Option<u32>,
    #[serde(default, deserialize_with = "flexible_bool")]
    peak_availability: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    weekend_availability: bool,
}

fn parse_status(raw: &str) -> Option<WorkerStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" => Some(WorkerStatus::Active),
        "inactive" => Some(WorkerStatus::Inactive),
        "busy" => Some(WorkerStatus::Busy),
        "offline" => Some(WorkerStatus::Offline),
        _ => None,
    }
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "n" | "0" => Ok(false),
        "true" | "yes" | "y" | "1" => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean, found '{other}'"
        ))),
    }
}
