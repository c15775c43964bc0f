use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Static recall settings, read once at startup and shared by every run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecallConfig {
    /// Gap ratio strictly above which a recall is considered.
    pub gap_threshold: f64,
    pub urgency_bands: UrgencyBands,
    /// Share of the raw shortfall that must be covered by recalled riders.
    pub staffing_factor: f64,
    pub baseline: EligibilityBaseline,
    pub weights: ScoringWeights,
    pub bonuses: ScoringBonuses,
    pub max_candidates: usize,
    pub contact: ContactSettings,
    pub approval_policy: ApprovalPolicy,
    pub targets: AnalyticsTargets,
    pub holidays: HolidayCalendar,
    pub simulation_seed: u64,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 0.1,
            urgency_bands: UrgencyBands::default(),
            staffing_factor: 0.8,
            baseline: EligibilityBaseline::default(),
            weights: ScoringWeights::default(),
            bonuses: ScoringBonuses::default(),
            max_candidates: 50,
            contact: ContactSettings::default(),
            approval_policy: ApprovalPolicy::Manual,
            targets: AnalyticsTargets::default(),
            holidays: HolidayCalendar::default(),
            simulation_seed: 42,
        }
    }
}

impl RecallConfig {
    pub fn validate(&self) -> Result<(), RecallConfigError> {
        if !(0.0..1.0).contains(&self.gap_threshold) {
            return Err(RecallConfigError::GapThreshold(self.gap_threshold));
        }

        let bands = &self.urgency_bands;
        if !(0.0..=1.0).contains(&bands.medium_above)
            || !(0.0..=1.0).contains(&bands.high_above)
            || bands.medium_above >= bands.high_above
        {
            return Err(RecallConfigError::UrgencyBands {
                medium: bands.medium_above,
                high: bands.high_above,
            });
        }

        if !(self.staffing_factor > 0.0 && self.staffing_factor <= 1.0) {
            return Err(RecallConfigError::StaffingFactor(self.staffing_factor));
        }

        let total = self.weights.total();
        if (total - 100.0).abs() > 1e-6 || self.weights.any_invalid() {
            return Err(RecallConfigError::Weights(total));
        }

        if self.max_candidates == 0 {
            return Err(RecallConfigError::MaxCandidates);
        }
        if self.contact.concurrency_limit == 0 {
            return Err(RecallConfigError::ConcurrencyLimit);
        }
        if self.contact.attempt_timeout.is_zero() {
            return Err(RecallConfigError::AttemptTimeout);
        }

        Ok(())
    }
}

/// Gap ratio bands selecting the urgency tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UrgencyBands {
    pub high_above: f64,
    pub medium_above: f64,
}

impl Default for UrgencyBands {
    fn default() -> Self {
        Self {
            high_above: 0.3,
            medium_above: 0.15,
        }
    }
}

/// Medium-tier eligibility thresholds; the other tiers are derived from these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EligibilityBaseline {
    pub min_acceptance_rate: f64,
    pub max_response_time_seconds: f64,
    pub min_completion_rate: f64,
    pub min_tenure_days: u32,
    pub max_distance_km: f64,
}

impl Default for EligibilityBaseline {
    fn default() -> Self {
        Self {
            min_acceptance_rate: 0.7,
            max_response_time_seconds: 120.0,
            min_completion_rate: 0.85,
            min_tenure_days: 7,
            max_distance_km: 5.0,
        }
    }
}

/// Fixed weights of the candidate score, expressed in points out of 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub acceptance: f64,
    pub responsiveness: f64,
    pub completion: f64,
    pub proximity: f64,
    pub tenure: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            acceptance: 30.0,
            responsiveness: 20.0,
            completion: 25.0,
            proximity: 15.0,
            tenure: 10.0,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.acceptance + self.responsiveness + self.completion + self.proximity + self.tenure
    }

    fn any_invalid(&self) -> bool {
        [
            self.acceptance,
            self.responsiveness,
            self.completion,
            self.proximity,
            self.tenure,
        ]
        .iter()
        .any(|weight| !weight.is_finite() || *weight < 0.0)
    }
}

impl FromStr for ScoringWeights {
    type Err = RecallConfigError;

    /// Parses `acceptance,responsiveness,completion,proximity,tenure`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts = raw
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| RecallConfigError::WeightList(raw.to_string()))?;

        match parts.as_slice() {
            [acceptance, responsiveness, completion, proximity, tenure] => Ok(Self {
                acceptance: *acceptance,
                responsiveness: *responsiveness,
                completion: *completion,
                proximity: *proximity,
                tenure: *tenure,
            }),
            _ => Err(RecallConfigError::WeightList(raw.to_string())),
        }
    }
}

/// Date-context bonuses layered on top of the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringBonuses {
    pub holiday_experience_cap: f64,
    pub peak_availability: f64,
    pub weekend_availability: f64,
}

impl Default for ScoringBonuses {
    fn default() -> Self {
        Self {
            holiday_experience_cap: 5.0,
            peak_availability: 3.0,
            weekend_availability: 3.0,
        }
    }
}

impl ScoringBonuses {
    pub fn max_total(&self) -> f64 {
        self.holiday_experience_cap + self.peak_availability + self.weekend_availability
    }
}

/// Worker pool bound and per-attempt deadline for outreach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactSettings {
    pub concurrency_limit: usize,
    pub attempt_timeout: Duration,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: 10,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// What to do when a run reaches the decision gate without approver feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPolicy {
    /// Stall until an approver answers.
    Manual,
    AutoApprove,
    AutoReject,
}

impl ApprovalPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutoApprove => "auto_approve",
            Self::AutoReject => "auto_reject",
        }
    }
}

impl FromStr for ApprovalPolicy {
    type Err = RecallConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto_approve" | "approve" => Ok(Self::AutoApprove),
            "auto_reject" | "reject" => Ok(Self::AutoReject),
            other => Err(RecallConfigError::ApprovalPolicy(other.to_string())),
        }
    }
}

/// Rate targets used to word recommendations in the analytics report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsTargets {
    pub success_rate: f64,
    pub connection_rate: f64,
}

impl Default for AnalyticsTargets {
    fn default() -> Self {
        Self {
            success_rate: 0.85,
            connection_rate: 0.9,
        }
    }
}

/// Fixed-date holidays observed every year, as (month, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    dates: Vec<(u32, u32)>,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::new(vec![(1, 1), (2, 14), (5, 1), (10, 1)])
    }
}

impl HolidayCalendar {
    pub fn new(dates: Vec<(u32, u32)>) -> Self {
        Self { dates }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates
            .iter()
            .any(|(month, day)| date.month() == *month && date.day() == *day)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecallConfigError {
    #[error("gap threshold {0} must lie in [0, 1)")]
    GapThreshold(f64),
    #[error("urgency bands must satisfy 0 <= medium ({medium}) < high ({high}) <= 1")]
    UrgencyBands { medium: f64, high: f64 },
    #[error("staffing factor {0} must lie in (0, 1]")]
    StaffingFactor(f64),
    #[error("scoring weights must be non-negative and total 100 (got {0})")]
    Weights(f64),
    #[error("scoring weights '{0}' must be five comma separated numbers")]
    WeightList(String),
    #[error("max candidates must be at least 1")]
    MaxCandidates,
    #[error("contact concurrency limit must be at least 1")]
    ConcurrencyLimit,
    #[error("contact attempt timeout must be greater than zero")]
    AttemptTimeout,
    #[error("unknown approval policy '{0}' (expected manual, auto_approve or auto_reject)")]
    ApprovalPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(RecallConfig::default().validate(), Ok(()));
    }

    #[test]
    fn weights_must_total_one_hundred() {
        let config = RecallConfig {
            weights: "30,20,25,15,5".parse().expect("five weights parse"),
            ..RecallConfig::default()
        };

        assert_eq!(config.validate(), Err(RecallConfigError::Weights(95.0)));
    }

    #[test]
    fn weights_must_be_finite() {
        for raw in ["NaN,20,25,15,10", "inf,20,25,15,10"] {
            let config = RecallConfig {
                weights: raw.parse().expect("five weights parse"),
                ..RecallConfig::default()
            };

            assert!(
                matches!(config.validate(), Err(RecallConfigError::Weights(_))),
                "{raw} accepted"
            );
        }
    }

    #[test]
    fn weight_list_requires_five_entries() {
        assert!(matches!(
            "30,20,50".parse::<ScoringWeights>(),
            Err(RecallConfigError::WeightList(_))
        ));
    }

    #[test]
    fn urgency_bands_must_be_ordered() {
        let config = RecallConfig {
            urgency_bands: UrgencyBands {
                high_above: 0.1,
                medium_above: 0.2,
            },
            ..RecallConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(RecallConfigError::UrgencyBands { .. })
        ));
    }

    #[test]
    fn approval_policy_parses_aliases() {
        assert_eq!("Approve".parse::<ApprovalPolicy>(), Ok(ApprovalPolicy::AutoApprove));
        assert_eq!("auto_reject".parse::<ApprovalPolicy>(), Ok(ApprovalPolicy::AutoReject));
        assert!("maybe".parse::<ApprovalPolicy>().is_err());
    }

    #[test]
    fn holiday_calendar_matches_month_and_day() {
        let calendar = HolidayCalendar::default();
        let valentines = NaiveDate::from_ymd_opt(2024, 2, 14).expect("valid date");
        let ordinary = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");

        assert!(calendar.is_holiday(valentines));
        assert!(!calendar.is_holiday(ordinary));
    }
}
