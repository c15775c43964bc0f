//! Stage-by-stage driver for a recall run.
//!
//! The orchestrator is the only writer of a run's [`WorkflowState`]. Every transition is
//! logged and persisted before the next stage begins, so a snapshot fetched mid-run always
//! reflects a consistent prefix of the pipeline.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::analytics::{AnalyticsReport, OutcomeAnalyzer};
use super::config::RecallConfig;
use super::contact::{CancellationFlag, ContactChannel, ContactExecutor};
use super::decision::{DecisionError, DecisionGate, DecisionRequest, DecisionResult};
use super::domain::{
    validate_site_id, ContactOutcome, GapEstimate, InvalidInput, UrgencyTier, WorkerRecord,
    WorkflowId,
};
use super::profile::{DateContext, UrgencyProfile};
use super::providers::{
    ApprovalSource, GapEstimateProvider, PolicyApprovalSource, RepositoryError, RosterProvider,
    WorkflowRepository,
};
use super::selection::{CandidateScorer, CandidateSelector, SelectionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Init,
    Predicting,
    Deciding,
    Selecting,
    Contacting,
    Analyzing,
    Completed,
    Failed,
}

impl WorkflowStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Predicting => "predicting",
            Self::Deciding => "deciding",
            Self::Selecting => "selecting",
            Self::Contacting => "contacting",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Progress reported once this stage has finished.
    pub const fn checkpoint(self) -> f64 {
        match self {
            Self::Init => 0.0,
            Self::Predicting => 20.0,
            Self::Deciding => 40.0,
            Self::Selecting => 60.0,
            Self::Contacting => 80.0,
            Self::Analyzing | Self::Completed => 100.0,
            Self::Failed => 0.0,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Any non-terminal stage may fail. Predicting and Deciding may finish early.
    pub fn allows(self, next: WorkflowStage) -> bool {
        use WorkflowStage::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Init, Predicting)
            | (Predicting, Deciding)
            | (Predicting, Completed)
            | (Deciding, Selecting)
            | (Deciding, Completed)
            | (Selecting, Contacting)
            | (Contacting, Analyzing)
            | (Analyzing, Completed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Progress record for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub current_stage: WorkflowStage,
    pub completed_stages: Vec<WorkflowStage>,
    pub progress_percent: f64,
    pub status: WorkflowStatus,
    pub error_message: Option<String>,
    /// Stage that was running when the workflow failed.
    pub failed_stage: Option<WorkflowStage>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    fn new(workflow_id: WorkflowId) -> Self {
        let now = Utc::now();
        Self {
            workflow_id,
            current_stage: WorkflowStage::Init,
            completed_stages: Vec::new(),
            progress_percent: 0.0,
            status: WorkflowStatus::Running,
            error_message: None,
            failed_stage: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Marks the current stage finished and moves to `next`.
    fn advance(&mut self, next: WorkflowStage) {
        let finished = self.current_stage;
        debug_assert!(finished.allows(next), "{finished:?} -> {next:?}");

        if !self.completed_stages.contains(&finished) {
            self.completed_stages.push(finished);
        }
        self.progress_percent = self.progress_percent.max(finished.checkpoint());
        self.current_stage = next;

        if next == WorkflowStage::Completed {
            self.status = WorkflowStatus::Completed;
            self.progress_percent = 100.0;
        }
        self.updated_at = Utc::now();
    }

    fn fail(&mut self, message: String) {
        self.failed_stage = Some(self.current_stage);
        self.current_stage = WorkflowStage::Failed;
        self.status = WorkflowStatus::Failed;
        self.error_message = Some(message);
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.current_stage,
            WorkflowStage::Completed | WorkflowStage::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowResolution {
    /// Capacity covers demand; nothing to do.
    NoGap,
    Rejected,
    /// Gap found but no approver decision yet; resume with feedback to continue.
    AwaitingApproval,
    RecallExecuted,
    Failed,
}

impl WorkflowResolution {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoGap => "no gap",
            Self::Rejected => "rejected",
            Self::AwaitingApproval => "awaiting approval",
            Self::RecallExecuted => "recall executed",
            Self::Failed => "failed",
        }
    }
}

/// Outputs produced so far; stages that never ran leave their slot empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageArtifacts {
    pub estimate: Option<GapEstimate>,
    pub decision: Option<DecisionResult>,
    pub profile: Option<UrgencyProfile>,
    pub selection: Option<SelectionOutcome>,
    pub outcomes: Option<Vec<ContactOutcome>>,
    pub report: Option<AnalyticsReport>,
}

/// Complete snapshot of a run, as persisted and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowArtifact {
    pub workflow_id: WorkflowId,
    pub site_id: String,
    pub target_date: NaiveDate,
    pub approver_feedback: Option<bool>,
    pub resolution: Option<WorkflowResolution>,
    pub message: String,
    pub state: WorkflowState,
    pub artifacts: StageArtifacts,
}

impl WorkflowArtifact {
    fn start(
        workflow_id: WorkflowId,
        site_id: &str,
        target_date: NaiveDate,
        approver_feedback: Option<bool>,
    ) -> Self {
        Self {
            state: WorkflowState::new(workflow_id.clone()),
            workflow_id,
            site_id: site_id.to_string(),
            target_date,
            approver_feedback,
            resolution: None,
            message: "workflow started".to_string(),
            artifacts: StageArtifacts::default(),
        }
    }

    pub fn is_awaiting_approval(&self) -> bool {
        self.resolution == Some(WorkflowResolution::AwaitingApproval)
            && self.state.current_stage == WorkflowStage::Deciding
    }
}

/// Errors returned to callers. Stage failures are not among them: those end the run in
/// [`WorkflowStage::Failed`] and come back as an artifact.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    #[error("{provider} unavailable: {message}")]
    UpstreamUnavailable {
        provider: &'static str,
        message: String,
    },
    #[error("workflow cancelled before {stage}")]
    Cancelled { stage: &'static str },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("workflow {0} not found")]
    UnknownWorkflow(WorkflowId),
    #[error("workflow {0} is not awaiting approval")]
    ApprovalNotPending(WorkflowId),
}

/// External collaborators a run talks to.
#[derive(Clone)]
pub struct RecallCollaborators {
    pub forecasts: Arc<dyn GapEstimateProvider>,
    pub roster: Arc<dyn RosterProvider>,
    pub contact: Arc<dyn ContactChannel>,
    /// Consulted when a run starts without feedback. Defaults to the configured policy.
    pub approvals: Option<Arc<dyn ApprovalSource>>,
}

static WORKFLOW_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_workflow_id(site_id: &str) -> WorkflowId {
    let id = WORKFLOW_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    WorkflowId(format!("wf-{site_id}-{id:06}"))
}

/// Exclusive right to resume one workflow, released on drop. Only one approval can
/// move a stalled run forward even when several arrive together.
struct ResumeClaim<'a> {
    claims: &'a Mutex<HashSet<WorkflowId>>,
    workflow_id: WorkflowId,
}

impl<'a> ResumeClaim<'a> {
    fn acquire(claims: &'a Mutex<HashSet<WorkflowId>>, workflow_id: &WorkflowId) -> Option<Self> {
        let mut held = claims.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(workflow_id.clone()) {
            return None;
        }
        Some(Self {
            claims,
            workflow_id: workflow_id.clone(),
        })
    }
}

impl Drop for ResumeClaim<'_> {
    fn drop(&mut self) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.workflow_id);
    }
}

/// Drives Predicting through Analyzing for one site and date at a time.
pub struct WorkflowOrchestrator<W> {
    config: Arc<RecallConfig>,
    forecasts: Arc<dyn GapEstimateProvider>,
    roster: Arc<dyn RosterProvider>,
    approvals: Arc<dyn ApprovalSource>,
    executor: ContactExecutor<dyn ContactChannel>,
    selector: CandidateSelector,
    analyzer: OutcomeAnalyzer,
    repository: Arc<W>,
    resuming: Mutex<HashSet<WorkflowId>>,
}

impl<W> WorkflowOrchestrator<W>
where
    W: WorkflowRepository + 'static,
{
    pub fn new(config: RecallConfig, collaborators: RecallCollaborators, repository: Arc<W>) -> Self {
        let approvals = collaborators.approvals.unwrap_or_else(|| {
            Arc::new(PolicyApprovalSource::new(config.approval_policy)) as Arc<dyn ApprovalSource>
        });
        let executor = ContactExecutor::new(collaborators.contact, config.contact);
        let selector = CandidateSelector::new(CandidateScorer::new(config.weights));
        let analyzer = OutcomeAnalyzer::new(config.targets);

        Self {
            config: Arc::new(config),
            forecasts: collaborators.forecasts,
            roster: collaborators.roster,
            approvals,
            executor,
            selector,
            analyzer,
            repository,
            resuming: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    /// Runs a workflow to a terminal stage or to the approval stall.
    pub async fn run(
        &self,
        site_id: &str,
        target_date: NaiveDate,
        approver_feedback: Option<bool>,
    ) -> Result<WorkflowArtifact, WorkflowError> {
        self.run_with_cancel(site_id, target_date, approver_feedback, &CancellationFlag::new())
            .await
    }

    /// Same as [`run`](Self::run), observing `cancel` at every stage boundary and inside
    /// the contact batch.
    pub async fn run_with_cancel(
        &self,
        site_id: &str,
        target_date: NaiveDate,
        approver_feedback: Option<bool>,
        cancel: &CancellationFlag,
    ) -> Result<WorkflowArtifact, WorkflowError> {
        validate_site_id(site_id)?;

        let workflow_id = next_workflow_id(site_id);
        let mut run = WorkflowArtifact::start(workflow_id, site_id, target_date, approver_feedback);
        info!(
            workflow_id = %run.workflow_id,
            site_id,
            target_date = %target_date,
            approver_feedback = ?approver_feedback,
            "recall workflow started"
        );
        self.persist(&run)?;

        if !self.enter(&mut run, WorkflowStage::Predicting, cancel)? {
            return Ok(run);
        }
        let estimate = match self.predict(site_id, target_date).await {
            Ok(estimate) => estimate,
            Err(err) => return self.fail(run, err),
        };
        info!(
            workflow_id = %run.workflow_id,
            gap_ratio = estimate.gap_ratio,
            required_workers = estimate.required_workers,
            has_gap = estimate.has_gap,
            "gap estimated"
        );
        let has_gap = estimate.has_gap;
        run.message = estimate.suggestion.clone();
        run.artifacts.estimate = Some(estimate);

        if !has_gap {
            return self.finish(run, WorkflowResolution::NoGap);
        }

        if !self.enter(&mut run, WorkflowStage::Deciding, cancel)? {
            return Ok(run);
        }
        self.continue_from_decision(run, approver_feedback, cancel)
            .await
    }

    /// Resumes a run stalled at the decision gate with the approver's answer.
    pub async fn resume_with_feedback(
        &self,
        workflow_id: &WorkflowId,
        approved: bool,
    ) -> Result<WorkflowArtifact, WorkflowError> {
        let Some(_claim) = ResumeClaim::acquire(&self.resuming, workflow_id) else {
            return Err(WorkflowError::ApprovalNotPending(workflow_id.clone()));
        };
        let mut run = self.get(workflow_id)?;
        if !run.is_awaiting_approval() {
            return Err(WorkflowError::ApprovalNotPending(workflow_id.clone()));
        }

        info!(workflow_id = %workflow_id, approved, "approver feedback received");
        run.approver_feedback = Some(approved);
        run.resolution = None;
        self.continue_from_decision(run, Some(approved), &CancellationFlag::new())
            .await
    }

    /// Latest persisted snapshot for `workflow_id`.
    pub fn get(&self, workflow_id: &WorkflowId) -> Result<WorkflowArtifact, WorkflowError> {
        self.repository
            .fetch(workflow_id)?
            .ok_or_else(|| WorkflowError::UnknownWorkflow(workflow_id.clone()))
    }

    async fn continue_from_decision(
        &self,
        mut run: WorkflowArtifact,
        approver_feedback: Option<bool>,
        cancel: &CancellationFlag,
    ) -> Result<WorkflowArtifact, WorkflowError> {
        let Some(estimate) = run.artifacts.estimate.clone() else {
            let err = WorkflowError::UpstreamUnavailable {
                provider: "gap estimate",
                message: "no estimate recorded for this run".to_string(),
            };
            return self.fail(run, err);
        };

        let feedback = match approver_feedback {
            Some(answer) => Some(answer),
            None => match self.approvals.feedback(&run.site_id, &estimate).await {
                Ok(answer) => answer,
                Err(err) => {
                    let err = WorkflowError::UpstreamUnavailable {
                        provider: "approval source",
                        message: err.to_string(),
                    };
                    return self.fail(run, err);
                }
            },
        };

        let request = DecisionRequest {
            site_id: run.site_id.clone(),
            estimate: estimate.clone(),
            approver_feedback: feedback,
        };
        let decision = match DecisionGate::decide(&request, self.config.gap_threshold) {
            Ok(decision) => decision,
            Err(DecisionError::PendingApproval { .. }) => {
                info!(workflow_id = %run.workflow_id, "recall awaiting approver feedback");
                run.resolution = Some(WorkflowResolution::AwaitingApproval);
                run.message = "gap detected; awaiting approver feedback".to_string();
                self.persist(&run)?;
                return Ok(run);
            }
        };

        info!(
            workflow_id = %run.workflow_id,
            accepted = decision.accepted,
            reason = %decision.reason,
            "recall decision made"
        );
        let accepted = decision.accepted;
        run.message = decision.reason.clone();
        run.artifacts.decision = Some(decision);
        if !accepted {
            return self.finish(run, WorkflowResolution::Rejected);
        }

        if !self.enter(&mut run, WorkflowStage::Selecting, cancel)? {
            return Ok(run);
        }
        let workers = match self.load_roster(&run.site_id).await {
            Ok(workers) => workers,
            Err(err) => return self.fail(run, err),
        };
        let tier = UrgencyTier::for_gap_ratio(estimate.gap_ratio, &self.config.urgency_bands);
        let context = DateContext::for_date(run.target_date, &self.config.holidays);
        let profile =
            UrgencyProfile::derive(tier, &self.config.baseline, context, self.config.bonuses);
        let selection = self.selector.select_with_counts(
            &workers,
            &profile,
            estimate.required_workers,
            self.config.max_candidates,
        );
        info!(
            workflow_id = %run.workflow_id,
            tier = tier.label(),
            evaluated = selection.evaluated,
            eligible = selection.eligible,
            selected = selection.candidates.len(),
            "candidates selected"
        );
        let candidates = selection.candidates.clone();
        run.artifacts.profile = Some(profile);
        run.artifacts.selection = Some(selection);

        if !self.enter(&mut run, WorkflowStage::Contacting, cancel)? {
            return Ok(run);
        }
        let outcomes = self.executor.execute(&candidates, cancel).await;
        info!(
            workflow_id = %run.workflow_id,
            attempted = outcomes.len(),
            agreed = outcomes.iter().filter(|outcome| outcome.agreed).count(),
            "contact batch finished"
        );
        run.artifacts.outcomes = Some(outcomes);

        if !self.enter(&mut run, WorkflowStage::Analyzing, cancel)? {
            return Ok(run);
        }
        let outcomes = run.artifacts.outcomes.as_deref().unwrap_or_default();
        let report = self.analyzer.analyze(outcomes, estimate.required_workers);
        info!(
            workflow_id = %run.workflow_id,
            success_rate = report.success_rate,
            target_met = report.target_met,
            "outcomes analyzed"
        );
        run.message = format!(
            "{} of {} required rider(s) agreed",
            report.agreed_count, report.required_workers
        );
        run.artifacts.report = Some(report);

        self.finish(run, WorkflowResolution::RecallExecuted)
    }

    async fn predict(
        &self,
        site_id: &str,
        target_date: NaiveDate,
    ) -> Result<GapEstimate, WorkflowError> {
        let forecast = self
            .forecasts
            .forecast(site_id, target_date)
            .await
            .map_err(|err| WorkflowError::UpstreamUnavailable {
                provider: "gap estimate provider",
                message: err.to_string(),
            })?;

        GapEstimate::derive(
            site_id,
            target_date,
            forecast,
            self.config.gap_threshold,
            self.config.staffing_factor,
        )
        .map_err(|err| WorkflowError::UpstreamUnavailable {
            provider: "gap estimate provider",
            message: err.to_string(),
        })
    }

    async fn load_roster(&self, site_id: &str) -> Result<Vec<WorkerRecord>, WorkflowError> {
        let workers = self.roster.active_workers(site_id).await.map_err(|err| {
            WorkflowError::UpstreamUnavailable {
                provider: "roster provider",
                message: err.to_string(),
            }
        })?;

        for worker in &workers {
            worker
                .validate()
                .map_err(|err| WorkflowError::UpstreamUnavailable {
                    provider: "roster provider",
                    message: err.to_string(),
                })?;
        }
        Ok(workers)
    }

    /// Moves to `next` unless cancellation was requested, persisting either way.
    ///
    /// Returns `Ok(false)` when the run was cancelled and is now terminal.
    fn enter(
        &self,
        run: &mut WorkflowArtifact,
        next: WorkflowStage,
        cancel: &CancellationFlag,
    ) -> Result<bool, WorkflowError> {
        if cancel.is_cancelled() {
            let err = WorkflowError::Cancelled {
                stage: next.label(),
            };
            warn!(workflow_id = %run.workflow_id, stage = next.label(), "recall workflow cancelled");
            self.mark_failed(run, &err);
            self.persist(run)?;
            return Ok(false);
        }

        run.state.advance(next);
        info!(
            workflow_id = %run.workflow_id,
            stage = next.label(),
            progress = run.state.progress_percent,
            "workflow stage entered"
        );
        self.persist(run)?;
        Ok(true)
    }

    fn finish(
        &self,
        mut run: WorkflowArtifact,
        resolution: WorkflowResolution,
    ) -> Result<WorkflowArtifact, WorkflowError> {
        run.state.advance(WorkflowStage::Completed);
        run.resolution = Some(resolution);
        info!(
            workflow_id = %run.workflow_id,
            resolution = resolution.label(),
            completed_stages = run.state.completed_stages.len(),
            "recall workflow completed"
        );
        self.persist(&run)?;
        Ok(run)
    }

    fn fail(
        &self,
        mut run: WorkflowArtifact,
        err: WorkflowError,
    ) -> Result<WorkflowArtifact, WorkflowError> {
        warn!(
            workflow_id = %run.workflow_id,
            stage = run.state.current_stage.label(),
            error = %err,
            "recall workflow failed"
        );
        self.mark_failed(&mut run, &err);
        self.persist(&run)?;
        Ok(run)
    }

    fn mark_failed(&self, run: &mut WorkflowArtifact, err: &WorkflowError) {
        run.state.fail(err.to_string());
        run.resolution = Some(WorkflowResolution::Failed);
        run.message = err.to_string();
    }

    fn persist(&self, run: &WorkflowArtifact) -> Result<(), WorkflowError> {
        self.repository.save(run)?;
        Ok(())
    }
}
