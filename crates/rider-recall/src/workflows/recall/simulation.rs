//! Seeded stand-ins for the forecasting, roster and telephony collaborators.
//!
//! Every draw is keyed by the configured seed plus the site or rider id, so the same inputs
//! produce the same numbers no matter how many tasks run or in which order they finish.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::HolidayCalendar;
use super::contact::{ContactChannel, ContactError};
use super::domain::{
    ContactOutcome, ContactReason, DemandForecast, ScoredCandidate, WorkerId, WorkerRecord,
    WorkerStatus,
};
use super::profile::DateContext;
use super::providers::{GapEstimateProvider, ProviderError, RosterProvider};

const BASE_DEMAND: f64 = 100.0;
const WEEKEND_MULTIPLIER: f64 = 1.3;
const HOLIDAY_MULTIPLIER: f64 = 1.8;
const CONNECT_PROBABILITY: f64 = 0.8;
const MAX_AGREE_PROBABILITY: f64 = 0.9;

fn keyed_rng(seed: u64, key: &str) -> StdRng {
    // FNV-1a keeps keys stable across toolchains, unlike the std hasher.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    StdRng::seed_from_u64(seed ^ hash)
}

#[derive(Debug, Clone)]
pub struct SimulatedForecastProvider {
    seed: u64,
    holidays: HolidayCalendar,
}

impl SimulatedForecastProvider {
    pub fn new(seed: u64, holidays: HolidayCalendar) -> Self {
        Self { seed, holidays }
    }

    pub fn forecast_for(&self, site_id: &str, target_date: NaiveDate) -> DemandForecast {
        let mut rng = keyed_rng(self.seed, &format!("forecast:{site_id}:{target_date}"));
        let context = DateContext::for_date(target_date, &self.holidays);

        let mut multiplier = 1.0;
        if context.is_holiday {
            multiplier = HOLIDAY_MULTIPLIER;
        } else if context.is_weekend {
            multiplier = WEEKEND_MULTIPLIER;
        }

        let jitter: f64 = rng.gen_range(0.9..=1.1);
        let predicted_demand = (BASE_DEMAND * multiplier * jitter).round() as u32;
        let current_capacity = rng.gen_range(60..=90);
        let confidence = (rng.gen_range(0.75..=0.95_f64) * 100.0).round() / 100.0;
        let lead_hours = rng.gen_range(2..=4);

        let suggestion = (predicted_demand > current_capacity).then(|| {
            format!(
                "start recall {lead_hours}h ahead for the {} peak",
                target_date.weekday()
            )
        });

        DemandForecast {
            predicted_demand,
            current_capacity,
            confidence,
            suggestion,
        }
    }
}

#[async_trait]
impl GapEstimateProvider for SimulatedForecastProvider {
    async fn forecast(
        &self,
        site_id: &str,
        target_date: NaiveDate,
    ) -> Result<DemandForecast, ProviderError> {
        Ok(self.forecast_for(site_id, target_date))
    }
}

/// Generates 30 to 50 riders per site with a realistic status mix.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedRoster {
    seed: u64,
}

impl SimulatedRoster {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn workers_for(&self, site_id: &str) -> Vec<WorkerRecord> {
        let mut rng = keyed_rng(self.seed, &format!("roster:{site_id}"));
        let count = rng.gen_range(30..=50);

        (1..=count)
            .map(|index| {
                let status = match rng.gen_range(0..100) {
                    0..=59 => WorkerStatus::Active,
                    60..=79 => WorkerStatus::Inactive,
                    80..=94 => WorkerStatus::Busy,
                    _ => WorkerStatus::Offline,
                };

                WorkerRecord {
                    worker_id: WorkerId(format!("{site_id}_rider_{index:03}")),
                    name: format!("Rider {index:03}"),
                    contact: format!("138{:08}", rng.gen_range(10_000_000..=99_999_999u32)),
                    status,
                    acceptance_rate: round2(rng.gen_range(0.5..=1.0)),
                    avg_response_time_seconds: rng.gen_range(30..=240) as f64,
                    completion_rate: round2(rng.gen_range(0.7..=1.0)),
                    tenure_days: rng.gen_range(10..=300),
                    distance_km: round2(rng.gen_range(0.5..=8.0)),
                    holiday_experience_count: rng.gen_range(0..=10),
                    peak_availability: rng.gen_bool(0.5),
                    weekend_availability: rng.gen_bool(0.5),
                }
            })
            .collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl RosterProvider for SimulatedRoster {
    async fn active_workers(&self, site_id: &str) -> Result<Vec<WorkerRecord>, ProviderError> {
        Ok(self.workers_for(site_id))
    }
}

/// Phone channel stand-in: 80% of calls connect and higher scores agree more often.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedContactChannel {
    seed: u64,
    latency: Option<Duration>,
}

impl SimulatedContactChannel {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn outcome_for(&self, candidate: &ScoredCandidate) -> ContactOutcome {
        let worker_id = candidate.worker.worker_id.clone();
        let mut rng = keyed_rng(self.seed, &format!("contact:{worker_id}"));

        if !rng.gen_bool(CONNECT_PROBABILITY) {
            return ContactOutcome::not_connected(worker_id, ContactReason::NoAnswer);
        }

        let agree_probability = (candidate.score / 100.0).clamp(0.0, MAX_AGREE_PROBABILITY);
        if rng.gen_bool(agree_probability) {
            ContactOutcome::agreed(worker_id, rng.gen_range(30..=90))
        } else {
            ContactOutcome::declined(worker_id, rng.gen_range(15..=45))
        }
    }
}

#[async_trait]
impl ContactChannel for SimulatedContactChannel {
    async fn attempt(&self, candidate: &ScoredCandidate) -> Result<ContactOutcome, ContactError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.outcome_for(candidate))
    }
}
