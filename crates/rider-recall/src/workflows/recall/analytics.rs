use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::config::AnalyticsTargets;
use super::domain::{ContactOutcome, ContactReason};

/// Aggregate view of one outreach batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub total_contacted: usize,
    pub connected_count: usize,
    pub agreed_count: usize,
    pub required_workers: u32,
    pub connection_rate: f64,
    pub success_rate: f64,
    pub agreement_rate: f64,
    pub coverage_rate: f64,
    pub target_met: bool,
    pub avg_duration_seconds: f64,
    pub reason_breakdown: BTreeMap<ContactReason, usize>,
    pub recommendations: Vec<String>,
}

/// Pure aggregation of contact outcomes.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeAnalyzer {
    targets: AnalyticsTargets,
}

impl OutcomeAnalyzer {
    pub fn new(targets: AnalyticsTargets) -> Self {
        Self { targets }
    }

    pub fn analyze(&self, outcomes: &[ContactOutcome], required_workers: u32) -> AnalyticsReport {
        let total_contacted = outcomes.len();
        let connected: Vec<&ContactOutcome> =
            outcomes.iter().filter(|outcome| outcome.connected).collect();
        let connected_count = connected.len();
        let agreed_count = connected.iter().filter(|outcome| outcome.agreed).count();

        let mut reason_breakdown = BTreeMap::new();
        for outcome in outcomes {
            *reason_breakdown.entry(outcome.reason).or_insert(0) += 1;
        }

        let avg_duration_seconds = if connected.is_empty() {
            0.0
        } else {
            connected
                .iter()
                .map(|outcome| outcome.duration_seconds as f64)
                .sum::<f64>()
                / connected_count as f64
        };

        let coverage_rate = if required_workers == 0 {
            1.0
        } else {
            agreed_count as f64 / required_workers as f64
        };

        let mut report = AnalyticsReport {
            total_contacted,
            connected_count,
            agreed_count,
            required_workers,
            connection_rate: ratio(connected_count, total_contacted),
            success_rate: ratio(agreed_count, total_contacted),
            agreement_rate: ratio(agreed_count, connected_count),
            coverage_rate,
            target_met: agreed_count >= required_workers as usize,
            avg_duration_seconds,
            reason_breakdown,
            recommendations: Vec::new(),
        };
        report.recommendations = self.recommendations(&report);
        report
    }

    fn recommendations(&self, report: &AnalyticsReport) -> Vec<String> {
        let mut recommendations = Vec::new();

        if report.total_contacted == 0 {
            recommendations.push(
                "no riders were contacted; review eligibility thresholds for this site".to_string(),
            );
            return recommendations;
        }

        if !report.target_met {
            let missing = report.required_workers as usize - report.agreed_count;
            recommendations.push(format!(
                "{missing} more rider(s) needed; widen the candidate pool or start outreach earlier"
            ));
        }

        if report.connection_rate < self.targets.connection_rate {
            recommendations.push(format!(
                "connection rate {:.1}% below target {:.1}%; retry unanswered riders at a different time",
                report.connection_rate * 100.0,
                self.targets.connection_rate * 100.0
            ));
        }

        if report.success_rate < self.targets.success_rate {
            recommendations.push(format!(
                "success rate {:.1}% below target {:.1}%; prioritise riders with holiday experience",
                report.success_rate * 100.0,
                self.targets.success_rate * 100.0
            ));
        }

        if let Some(timeouts) = report.reason_breakdown.get(&ContactReason::Timeout) {
            recommendations.push(format!(
                "{timeouts} attempt(s) timed out; check contact channel latency"
            ));
        }

        recommendations
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
