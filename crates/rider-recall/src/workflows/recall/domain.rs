use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for riders on a site roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for recall workflow runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw demand and capacity figures supplied by the forecasting collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub predicted_demand: u32,
    pub current_capacity: u32,
    pub confidence: f64,
    #[serde(default)]
    pub suggestion: Option<String>,
}

/// Capacity gap for one site and date, derived from a [`DemandForecast`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapEstimate {
    pub site_id: String,
    pub target_date: NaiveDate,
    pub predicted_demand: u32,
    pub current_capacity: u32,
    pub gap_ratio: f64,
    pub has_gap: bool,
    pub required_workers: u32,
    pub confidence: f64,
    pub suggestion: String,
}

impl GapEstimate {
    /// Derives the gap ratio, gap flag and staffing requirement from a forecast.
    ///
    /// `required_workers` is the floored share (`staffing_factor`) of the shortfall and is
    /// zero whenever the ratio does not exceed `gap_threshold`.
    pub fn derive(
        site_id: &str,
        target_date: NaiveDate,
        forecast: DemandForecast,
        gap_threshold: f64,
        staffing_factor: f64,
    ) -> Result<Self, MalformedForecast> {
        if !forecast.confidence.is_finite() || !(0.0..=1.0).contains(&forecast.confidence) {
            return Err(MalformedForecast::Confidence(forecast.confidence));
        }

        let shortfall = forecast
            .predicted_demand
            .saturating_sub(forecast.current_capacity);
        let gap_ratio = gap_ratio(forecast.predicted_demand, forecast.current_capacity);
        let has_gap = gap_ratio > gap_threshold;
        let required_workers = if has_gap {
            (shortfall as f64 * staffing_factor).floor() as u32
        } else {
            0
        };

        let suggestion = forecast.suggestion.unwrap_or_else(|| {
            if has_gap {
                format!(
                    "recall {required_workers} rider(s) to cover a {:.1}% capacity gap",
                    gap_ratio * 100.0
                )
            } else {
                "capacity sufficient, no recall needed".to_string()
            }
        });

        Ok(Self {
            site_id: site_id.to_string(),
            target_date,
            predicted_demand: forecast.predicted_demand,
            current_capacity: forecast.current_capacity,
            gap_ratio,
            has_gap,
            required_workers,
            confidence: forecast.confidence,
            suggestion,
        })
    }
}

/// Fractional shortfall of capacity relative to demand; zero when demand is zero or covered.
pub fn gap_ratio(predicted_demand: u32, current_capacity: u32) -> f64 {
    if predicted_demand == 0 {
        return 0.0;
    }
    predicted_demand.saturating_sub(current_capacity) as f64 / predicted_demand as f64
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedForecast {
    #[error("forecast confidence {0} is outside [0, 1]")]
    Confidence(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Active,
    Inactive,
    Busy,
    Offline,
}

impl WorkerStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::Busy => "Busy",
            Self::Offline => "Offline",
        }
    }
}

/// Roster entry with the historical performance used for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    pub name: String,
    pub contact: String,
    pub status: WorkerStatus,
    pub acceptance_rate: f64,
    pub avg_response_time_seconds: f64,
    pub completion_rate: f64,
    pub tenure_days: u32,
    pub distance_km: f64,
    pub holiday_experience_count: u32,
    pub peak_availability: bool,
    pub weekend_availability: bool,
}

impl WorkerRecord {
    /// Rejects records the scorer cannot handle: rates outside [0, 1], negative or
    /// non-finite times and distances, or a blank identifier.
    pub fn validate(&self) -> Result<(), InvalidWorkerRecord> {
        let invalid = |field: &'static str, value: f64| InvalidWorkerRecord::Field {
            worker_id: self.worker_id.clone(),
            field,
            value,
        };

        if self.worker_id.0.trim().is_empty() {
            return Err(InvalidWorkerRecord::MissingId);
        }
        if !is_rate(self.acceptance_rate) {
            return Err(invalid("acceptance_rate", self.acceptance_rate));
        }
        if !is_rate(self.completion_rate) {
            return Err(invalid("completion_rate", self.completion_rate));
        }
        if !is_non_negative(self.avg_response_time_seconds) {
            return Err(invalid(
                "avg_response_time_seconds",
                self.avg_response_time_seconds,
            ));
        }
        if !is_non_negative(self.distance_km) {
            return Err(invalid("distance_km", self.distance_km));
        }

        Ok(())
    }
}

fn is_rate(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidWorkerRecord {
    #[error("worker record is missing an identifier")]
    MissingId,
    #[error("worker {worker_id} has invalid {field}: {value}")]
    Field {
        worker_id: WorkerId,
        field: &'static str,
        value: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    High,
    Medium,
    Low,
}

impl UrgencyTier {
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Score bands: 80 and above is high, 60 up to 80 is medium.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::High
        } else if score >= 60.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Eligible rider with the score computed for one selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub worker: WorkerRecord,
    pub score: f64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactReason {
    Agreed,
    Declined,
    NoAnswer,
    Timeout,
    ChannelError,
    Cancelled,
}

impl ContactReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Agreed => "agreed",
            Self::Declined => "declined",
            Self::NoAnswer => "no answer",
            Self::Timeout => "timeout",
            Self::ChannelError => "channel error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of one outreach attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactOutcome {
    pub worker_id: WorkerId,
    pub connected: bool,
    pub agreed: bool,
    pub reason: ContactReason,
    pub duration_seconds: u32,
}

impl ContactOutcome {
    pub fn agreed(worker_id: WorkerId, duration_seconds: u32) -> Self {
        Self {
            worker_id,
            connected: true,
            agreed: true,
            reason: ContactReason::Agreed,
            duration_seconds,
        }
    }

    pub fn declined(worker_id: WorkerId, duration_seconds: u32) -> Self {
        Self {
            worker_id,
            connected: true,
            agreed: false,
            reason: ContactReason::Declined,
            duration_seconds,
        }
    }

    pub fn not_connected(worker_id: WorkerId, reason: ContactReason) -> Self {
        Self {
            worker_id,
            connected: false,
            agreed: false,
            reason,
            duration_seconds: 0,
        }
    }
}

/// Rejected invocation parameters; never enters the workflow state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    #[error("site id must not be empty")]
    EmptySiteId,
    #[error("site id '{0}' may only contain letters, digits, '-' and '_'")]
    SiteIdCharacters(String),
    #[error("failed to parse '{0}' as YYYY-MM-DD")]
    TargetDate(String),
}

pub fn validate_site_id(site_id: &str) -> Result<(), InvalidInput> {
    if site_id.trim().is_empty() {
        return Err(InvalidInput::EmptySiteId);
    }
    if !site_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(InvalidInput::SiteIdCharacters(site_id.to_string()));
    }
    Ok(())
}

pub fn parse_target_date(raw: &str) -> Result<NaiveDate, InvalidInput> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| InvalidInput::TargetDate(raw.to_string()))
}
