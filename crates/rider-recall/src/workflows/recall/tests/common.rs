use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::recall::config::{ApprovalPolicy, ContactSettings, RecallConfig};
use crate::workflows::recall::contact::{CancellationFlag, ContactChannel, ContactError};
use crate::workflows::recall::domain::{
    ContactOutcome, ContactReason, DemandForecast, Priority, ScoredCandidate, WorkerId,
    WorkerRecord, WorkerStatus, WorkflowId,
};
use crate::workflows::recall::orchestrator::{
    RecallCollaborators, WorkflowArtifact, WorkflowOrchestrator,
};
use crate::workflows::recall::providers::{
    GapEstimateProvider, ProviderError, RepositoryError, RosterProvider, WorkflowRepository,
};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// A Wednesday with no holiday attached.
pub(super) fn weekday() -> NaiveDate {
    date(2024, 6, 12)
}

pub(super) fn worker(
    id: &str,
    acceptance_rate: f64,
    avg_response_time_seconds: f64,
    completion_rate: f64,
    tenure_days: u32,
    distance_km: f64,
) -> WorkerRecord {
    WorkerRecord {
        worker_id: WorkerId(id.to_string()),
        name: format!("Rider {id}"),
        contact: "13800000000".to_string(),
        status: WorkerStatus::Active,
        acceptance_rate,
        avg_response_time_seconds,
        completion_rate,
        tenure_days,
        distance_km,
        holiday_experience_count: 0,
        peak_availability: false,
        weekend_availability: false,
    }
}

/// Five riders that clear the baseline profile plus one busy rider that never does.
pub(super) fn site_roster() -> Vec<WorkerRecord> {
    let mut busy = worker("rider_busy", 0.95, 20.0, 0.99, 300, 0.5);
    busy.status = WorkerStatus::Busy;

    vec![
        worker("rider_001", 0.9, 30.0, 0.95, 120, 1.0),
        worker("rider_002", 0.85, 60.0, 0.9, 80, 2.0),
        worker("rider_003", 0.8, 90.0, 0.9, 40, 3.0),
        worker("rider_004", 0.75, 100.0, 0.88, 20, 4.0),
        worker("rider_005", 0.7, 120.0, 0.86, 10, 4.5),
        busy,
    ]
}

pub(super) fn candidate(id: &str, score: f64) -> ScoredCandidate {
    ScoredCandidate {
        worker: worker(id, 0.9, 30.0, 0.95, 120, 1.0),
        score,
        priority: Priority::from_score(score),
    }
}

pub(super) fn candidates(count: usize) -> Vec<ScoredCandidate> {
    (1..=count)
        .map(|index| candidate(&format!("rider_{index:03}"), 90.0 - index as f64))
        .collect()
}

/// Demand 20 against capacity 15: a 25% gap needing four riders.
pub(super) fn shortfall() -> DemandForecast {
    DemandForecast {
        predicted_demand: 20,
        current_capacity: 15,
        confidence: 0.9,
        suggestion: None,
    }
}

pub(super) fn surplus() -> DemandForecast {
    DemandForecast {
        predicted_demand: 90,
        current_capacity: 100,
        confidence: 0.9,
        suggestion: None,
    }
}

pub(super) struct FixedForecast(pub(super) DemandForecast);

#[async_trait]
impl GapEstimateProvider for FixedForecast {
    async fn forecast(
        &self,
        _site_id: &str,
        _target_date: NaiveDate,
    ) -> Result<DemandForecast, ProviderError> {
        Ok(self.0.clone())
    }
}

pub(super) struct FailingForecast;

#[async_trait]
impl GapEstimateProvider for FailingForecast {
    async fn forecast(
        &self,
        _site_id: &str,
        _target_date: NaiveDate,
    ) -> Result<DemandForecast, ProviderError> {
        Err(ProviderError::Unavailable("forecast model offline".to_string()))
    }
}

pub(super) struct StaticRoster(pub(super) Vec<WorkerRecord>);

#[async_trait]
impl RosterProvider for StaticRoster {
    async fn active_workers(&self, _site_id: &str) -> Result<Vec<WorkerRecord>, ProviderError> {
        Ok(self.0.clone())
    }
}

pub(super) struct FailingRoster;

#[async_trait]
impl RosterProvider for FailingRoster {
    async fn active_workers(&self, _site_id: &str) -> Result<Vec<WorkerRecord>, ProviderError> {
        Err(ProviderError::Unavailable("roster service timed out".to_string()))
    }
}

#[derive(Debug, Clone)]
pub(super) enum Script {
    Agree,
    Decline,
    NoAnswer,
    Fail,
    Panic,
    /// Never answers within any realistic deadline.
    Hang,
    /// Agrees, then raises the cancellation flag handed to the channel.
    AgreeThenCancel,
    /// Claims agreement without ever connecting.
    Malformed,
}

/// Contact channel answering from a per-rider script and tracking peak concurrency.
#[derive(Default)]
pub(super) struct ScriptedChannel {
    scripts: HashMap<WorkerId, Script>,
    delay: Option<Duration>,
    cancel: Option<CancellationFlag>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedChannel {
    pub(super) fn agreeing() -> Self {
        Self::default()
    }

    pub(super) fn with_script(mut self, id: &str, script: Script) -> Self {
        self.scripts.insert(WorkerId(id.to_string()), script);
        self
    }

    pub(super) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(super) fn with_cancel(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(super) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContactChannel for ScriptedChannel {
    async fn attempt(&self, candidate: &ScoredCandidate) -> Result<ContactOutcome, ContactError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let worker_id = candidate.worker.worker_id.clone();
        match self.scripts.get(&worker_id).cloned().unwrap_or(Script::Agree) {
            Script::Agree => Ok(ContactOutcome::agreed(worker_id, 45)),
            Script::Decline => Ok(ContactOutcome::declined(worker_id, 20)),
            Script::NoAnswer => Ok(ContactOutcome::not_connected(
                worker_id,
                ContactReason::NoAnswer,
            )),
            Script::Fail => Err(ContactError::Unavailable("line busy".to_string())),
            Script::Panic => panic!("telephony client crashed"),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ContactOutcome::agreed(worker_id, 45))
            }
            Script::AgreeThenCancel => {
                if let Some(cancel) = &self.cancel {
                    cancel.cancel();
                }
                Ok(ContactOutcome::agreed(worker_id, 45))
            }
            Script::Malformed => Ok(ContactOutcome {
                worker_id,
                connected: false,
                agreed: true,
                reason: ContactReason::Agreed,
                duration_seconds: 0,
            }),
        }
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<HashMap<WorkflowId, WorkflowArtifact>>>,
    history: Arc<Mutex<Vec<WorkflowArtifact>>>,
}

impl MemoryRepository {
    /// Every snapshot saved, in write order.
    pub(super) fn history(&self) -> Vec<WorkflowArtifact> {
        self.history.lock().expect("history lock").clone()
    }
}

impl WorkflowRepository for MemoryRepository {
    fn save(&self, artifact: &WorkflowArtifact) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("records lock")
            .insert(artifact.workflow_id.clone(), artifact.clone());
        self.history
            .lock()
            .expect("history lock")
            .push(artifact.clone());
        Ok(())
    }

    fn fetch(&self, id: &WorkflowId) -> Result<Option<WorkflowArtifact>, RepositoryError> {
        Ok(self.records.lock().expect("records lock").get(id).cloned())
    }
}

pub(super) struct UnavailableRepository;

impl WorkflowRepository for UnavailableRepository {
    fn save(&self, _artifact: &WorkflowArtifact) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn fetch(&self, _id: &WorkflowId) -> Result<Option<WorkflowArtifact>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }
}

pub(super) fn recall_config(policy: ApprovalPolicy) -> RecallConfig {
    RecallConfig {
        approval_policy: policy,
        contact: ContactSettings {
            concurrency_limit: 2,
            attempt_timeout: Duration::from_secs(5),
        },
        ..RecallConfig::default()
    }
}

pub(super) fn collaborators(
    forecasts: Arc<dyn GapEstimateProvider>,
    roster: Arc<dyn RosterProvider>,
    contact: Arc<dyn ContactChannel>,
) -> RecallCollaborators {
    RecallCollaborators {
        forecasts,
        roster,
        contact,
        approvals: None,
    }
}

/// Orchestrator over a fixed forecast, the standard site roster and an agreeing channel.
pub(super) fn build_orchestrator(
    forecast: DemandForecast,
    policy: ApprovalPolicy,
) -> (
    WorkflowOrchestrator<MemoryRepository>,
    Arc<MemoryRepository>,
) {
    build_orchestrator_with(
        collaborators(
            Arc::new(FixedForecast(forecast)),
            Arc::new(StaticRoster(site_roster())),
            Arc::new(ScriptedChannel::agreeing()),
        ),
        policy,
    )
}

pub(super) fn build_orchestrator_with(
    collaborators: RecallCollaborators,
    policy: ApprovalPolicy,
) -> (
    WorkflowOrchestrator<MemoryRepository>,
    Arc<MemoryRepository>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let orchestrator = WorkflowOrchestrator::new(
        recall_config(policy),
        collaborators,
        Arc::clone(&repository),
    );
    (orchestrator, repository)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
