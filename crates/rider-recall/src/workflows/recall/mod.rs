//! Capacity-gap driven rider recall.
//!
//! A run estimates the shortfall for a site and date, asks whether recall should proceed,
//! ranks eligible riders, contacts the best of them under a bounded worker pool and
//! summarises the outcomes. [`WorkflowOrchestrator`] sequences those stages; the stage
//! components themselves are plain values and can be used on their own.

pub mod analytics;
pub mod config;
pub mod contact;
pub mod decision;
pub mod domain;
pub mod orchestrator;
pub mod profile;
pub mod providers;
pub mod roster;
pub mod router;
pub mod selection;
pub mod simulation;

#[cfg(test)]
mod tests;

pub use analytics::{AnalyticsReport, OutcomeAnalyzer};
pub use config::{
    AnalyticsTargets, ApprovalPolicy, ContactSettings, EligibilityBaseline, HolidayCalendar,
    RecallConfig, RecallConfigError, ScoringBonuses, ScoringWeights, UrgencyBands,
};
pub use contact::{CancellationFlag, ContactChannel, ContactError, ContactExecutor};
pub use decision::{DecisionError, DecisionGate, DecisionRequest, DecisionResult, NextStep};
pub use domain::{
    parse_target_date, ContactOutcome, ContactReason, DemandForecast, GapEstimate, InvalidInput,
    Priority, ScoredCandidate, UrgencyTier, WorkerId, WorkerRecord, WorkerStatus, WorkflowId,
};
pub use orchestrator::{
    RecallCollaborators, StageArtifacts, WorkflowArtifact, WorkflowError, WorkflowOrchestrator,
    WorkflowResolution, WorkflowStage, WorkflowState, WorkflowStatus,
};
pub use profile::{DateContext, UrgencyProfile};
pub use providers::{
    ApprovalSource, GapEstimateProvider, PolicyApprovalSource, ProviderError, RepositoryError,
    RosterProvider, WorkflowRepository,
};
pub use roster::{CsvRosterProvider, RosterImportError};
pub use router::recall_router;
pub use selection::{CandidateScorer, CandidateSelector, ScoreBreakdown, SelectionOutcome};
pub use simulation::{SimulatedContactChannel, SimulatedForecastProvider, SimulatedRoster};
