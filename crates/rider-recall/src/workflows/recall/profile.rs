use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::config::{EligibilityBaseline, HolidayCalendar, ScoringBonuses, UrgencyBands};
use super::domain::UrgencyTier;

/// Holiday-experience expectation surfaced on weekends and holidays.
const SPECIAL_DAY_HOLIDAY_EXPERIENCE: u32 = 2;

impl UrgencyTier {
    pub fn for_gap_ratio(gap_ratio: f64, bands: &UrgencyBands) -> Self {
        if gap_ratio > bands.high_above {
            Self::High
        } else if gap_ratio > bands.medium_above {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateContext {
    pub is_weekend: bool,
    pub is_holiday: bool,
}

impl DateContext {
    pub fn for_date(date: NaiveDate, calendar: &HolidayCalendar) -> Self {
        Self {
            is_weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            is_holiday: calendar.is_holiday(date),
        }
    }

    pub fn is_special_day(&self) -> bool {
        self.is_weekend || self.is_holiday
    }
}

/// Eligibility thresholds and bonuses for one selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgencyProfile {
    pub tier: UrgencyTier,
    pub min_acceptance_rate: f64,
    pub max_response_time_seconds: f64,
    pub min_completion_rate: f64,
    pub min_tenure_days: u32,
    pub max_distance_km: f64,
    pub is_weekend: bool,
    pub is_holiday: bool,
    /// Holiday shifts a rider is expected to have worked; informs ranking only.
    pub preferred_holiday_experience: u32,
    pub bonuses: ScoringBonuses,
}

impl UrgencyProfile {
    /// High urgency relaxes every baseline threshold, low urgency tightens them.
    pub fn derive(
        tier: UrgencyTier,
        baseline: &EligibilityBaseline,
        context: DateContext,
        bonuses: ScoringBonuses,
    ) -> Self {
        let (
            min_acceptance_rate,
            max_response_time_seconds,
            min_completion_rate,
            min_tenure_days,
            max_distance_km,
        ) = match tier {
            UrgencyTier::High => (
                (baseline.min_acceptance_rate - 0.2).max(0.5),
                baseline.max_response_time_seconds * 1.5,
                (baseline.min_completion_rate - 0.1).max(0.7),
                baseline.min_tenure_days.saturating_sub(3).max(3),
                baseline.max_distance_km * 1.6,
            ),
            UrgencyTier::Medium => (
                baseline.min_acceptance_rate,
                baseline.max_response_time_seconds,
                baseline.min_completion_rate,
                baseline.min_tenure_days,
                baseline.max_distance_km,
            ),
            UrgencyTier::Low => (
                (baseline.min_acceptance_rate + 0.1).min(0.95),
                baseline.max_response_time_seconds * 0.8,
                (baseline.min_completion_rate + 0.05).min(0.98),
                baseline.min_tenure_days + 5,
                baseline.max_distance_km * 0.6,
            ),
        };

        let preferred_holiday_experience = if context.is_special_day() {
            SPECIAL_DAY_HOLIDAY_EXPERIENCE
        } else {
            0
        };

        Self {
            tier,
            min_acceptance_rate,
            max_response_time_seconds,
            min_completion_rate,
            min_tenure_days,
            max_distance_km,
            is_weekend: context.is_weekend,
            is_holiday: context.is_holiday,
            preferred_holiday_experience,
            bonuses,
        }
    }

    pub fn is_special_day(&self) -> bool {
        self.is_weekend || self.is_holiday
    }
}
