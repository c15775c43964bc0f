use serde::Serialize;

use super::super::config::ScoringWeights;
use super::super::domain::WorkerRecord;
use super::super::profile::UrgencyProfile;

const ACCEPTANCE_REFERENCE: f64 = 0.9;
const RESPONSE_CEILING_SECONDS: f64 = 300.0;
const COMPLETION_REFERENCE: f64 = 0.95;
const DISTANCE_CEILING_KM: f64 = 5.0;
const TENURE_REFERENCE_DAYS: f64 = 100.0;

/// Per-factor contributions, kept so rankings can be audited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub acceptance: f64,
    pub responsiveness: f64,
    pub completion: f64,
    pub proximity: f64,
    pub tenure: f64,
    pub bonus: f64,
}

impl ScoreBreakdown {
    /// Sum of all contributions rounded to two decimal places.
    pub fn total(&self) -> f64 {
        let raw = self.acceptance
            + self.responsiveness
            + self.completion
            + self.proximity
            + self.tenure
            + self.bonus;
        (raw * 100.0).round() / 100.0
    }
}

/// Stateless weighted scorer; identical inputs always produce identical scores.
#[derive(Debug, Clone, Copy)]
pub struct CandidateScorer {
    weights: ScoringWeights,
}

impl CandidateScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, worker: &WorkerRecord, profile: &UrgencyProfile) -> f64 {
        self.breakdown(worker, profile).total()
    }

    pub fn breakdown(&self, worker: &WorkerRecord, profile: &UrgencyProfile) -> ScoreBreakdown {
        let weights = &self.weights;

        let acceptance = (worker.acceptance_rate / ACCEPTANCE_REFERENCE).min(1.0);
        let responsiveness = ((RESPONSE_CEILING_SECONDS - worker.avg_response_time_seconds)
            / RESPONSE_CEILING_SECONDS)
            .clamp(0.0, 1.0);
        let completion = (worker.completion_rate / COMPLETION_REFERENCE).min(1.0);
        let proximity =
            ((DISTANCE_CEILING_KM - worker.distance_km) / DISTANCE_CEILING_KM).clamp(0.0, 1.0);
        let tenure = (worker.tenure_days as f64 / TENURE_REFERENCE_DAYS).min(1.0);

        ScoreBreakdown {
            acceptance: acceptance * weights.acceptance,
            responsiveness: responsiveness * weights.responsiveness,
            completion: completion * weights.completion,
            proximity: proximity * weights.proximity,
            tenure: tenure * weights.tenure,
            bonus: date_bonus(worker, profile),
        }
    }
}

fn date_bonus(worker: &WorkerRecord, profile: &UrgencyProfile) -> f64 {
    if !profile.is_special_day() {
        return 0.0;
    }

    let bonuses = &profile.bonuses;
    let mut bonus = (worker.holiday_experience_count as f64).min(bonuses.holiday_experience_cap);
    if worker.peak_availability {
        bonus += bonuses.peak_availability;
    }
    if worker.weekend_availability && profile.is_weekend {
        bonus += bonuses.weekend_availability;
    }
    bonus
}
