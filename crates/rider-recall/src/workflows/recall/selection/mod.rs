mod scoring;
mod selector;

pub use scoring::{CandidateScorer, ScoreBreakdown};
pub use selector::{candidate_pool_size, CandidateSelector, SelectionOutcome};
