use async_trait::async_trait;
use chrono::NaiveDate;

use super::config::ApprovalPolicy;
use super::domain::{DemandForecast, GapEstimate, WorkerRecord, WorkflowId};
use super::orchestrator::WorkflowArtifact;

/// Demand forecasting collaborator (historical orders, weather, trend models).
#[async_trait]
pub trait GapEstimateProvider: Send + Sync {
    async fn forecast(
        &self,
        site_id: &str,
        target_date: NaiveDate,
    ) -> Result<DemandForecast, ProviderError>;
}

/// Source of the riders attached to a site.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn active_workers(&self, site_id: &str) -> Result<Vec<WorkerRecord>, ProviderError>;
}

/// Approver lookup used only when a run starts without feedback.
///
/// `Ok(None)` means nobody has answered yet; the run then waits for feedback. Timeouts and
/// retries belong to the implementation.
#[async_trait]
pub trait ApprovalSource: Send + Sync {
    async fn feedback(
        &self,
        site_id: &str,
        estimate: &GapEstimate,
    ) -> Result<Option<bool>, ProviderError>;
}

/// Error enumeration for upstream collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Answers every approval request with the configured policy.
#[derive(Debug, Clone, Copy)]
pub struct PolicyApprovalSource {
    policy: ApprovalPolicy,
}

impl PolicyApprovalSource {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ApprovalSource for PolicyApprovalSource {
    async fn feedback(
        &self,
        _site_id: &str,
        _estimate: &GapEstimate,
    ) -> Result<Option<bool>, ProviderError> {
        Ok(self.policy.feedback())
    }
}

/// Storage abstraction for workflow snapshots, written after every transition.
pub trait WorkflowRepository: Send + Sync {
    fn save(&self, artifact: &WorkflowArtifact) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &WorkflowId) -> Result<Option<WorkflowArtifact>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
