use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::super::domain::{Priority, ScoredCandidate, WorkerRecord, WorkerStatus};
use super::super::profile::UrgencyProfile;
use super::scoring::CandidateScorer;

/// Ranked candidates plus the counts behind them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub evaluated: usize,
    pub eligible: usize,
    pub candidates: Vec<ScoredCandidate>,
}

/// Filters a roster against an urgency profile and keeps the best-ranked riders.
#[derive(Debug, Clone, Copy)]
pub struct CandidateSelector {
    scorer: CandidateScorer,
}

impl CandidateSelector {
    pub fn new(scorer: CandidateScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &CandidateScorer {
        &self.scorer
    }

    pub fn select(
        &self,
        pool: &[WorkerRecord],
        profile: &UrgencyProfile,
        required_count: u32,
        max_candidates: usize,
    ) -> Vec<ScoredCandidate> {
        self.select_with_counts(pool, profile, required_count, max_candidates)
            .candidates
    }

    pub fn select_with_counts(
        &self,
        pool: &[WorkerRecord],
        profile: &UrgencyProfile,
        required_count: u32,
        max_candidates: usize,
    ) -> SelectionOutcome {
        let mut ranked: Vec<ScoredCandidate> = pool
            .iter()
            .filter(|worker| is_eligible(worker, profile))
            .map(|worker| {
                let score = self.scorer.score(worker, profile);
                ScoredCandidate {
                    worker: worker.clone(),
                    score,
                    priority: Priority::from_score(score),
                }
            })
            .collect();

        ranked.sort_by(ranking_order);
        let eligible = ranked.len();
        ranked.truncate(candidate_pool_size(required_count, max_candidates));

        SelectionOutcome {
            evaluated: pool.len(),
            eligible,
            candidates: ranked,
        }
    }
}

/// `min(max_candidates, ceil(required_count * 1.5))`.
pub fn candidate_pool_size(required_count: u32, max_candidates: usize) -> usize {
    let backup_pool = (required_count as usize * 3).div_ceil(2);
    backup_pool.min(max_candidates)
}

pub(crate) fn is_eligible(worker: &WorkerRecord, profile: &UrgencyProfile) -> bool {
    worker.status == WorkerStatus::Active
        && worker.acceptance_rate >= profile.min_acceptance_rate
        && worker.avg_response_time_seconds <= profile.max_response_time_seconds
        && worker.completion_rate >= profile.min_completion_rate
        && worker.tenure_days >= profile.min_tenure_days
        && worker.distance_km <= profile.max_distance_km
}

/// Score descending, then distance ascending, then worker id.
fn ranking_order(left: &ScoredCandidate, right: &ScoredCandidate) -> Ordering {
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| left.worker.distance_km.total_cmp(&right.worker.distance_km))
        .then_with(|| left.worker.worker_id.cmp(&right.worker.worker_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_rounds_up_half_again() {
        assert_eq!(candidate_pool_size(2, 50), 3);
        assert_eq!(candidate_pool_size(3, 50), 5);
        assert_eq!(candidate_pool_size(0, 50), 0);
        assert_eq!(candidate_pool_size(40, 50), 50);
    }
}
