use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rider_recall::error::AppError;
use rider_recall::workflows::recall::{
    parse_target_date, CsvRosterProvider, RecallCollaborators, RecallConfig, RepositoryError,
    RosterProvider, SimulatedContactChannel, SimulatedForecastProvider, SimulatedRoster,
    WorkflowArtifact, WorkflowId, WorkflowOrchestrator, WorkflowRepository,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryWorkflowRepository {
    records: Arc<Mutex<HashMap<WorkflowId, WorkflowArtifact>>>,
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    fn save(&self, artifact: &WorkflowArtifact) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(artifact.workflow_id.clone(), artifact.clone());
        Ok(())
    }

    fn fetch(&self, id: &WorkflowId) -> Result<Option<WorkflowArtifact>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

impl InMemoryWorkflowRepository {
    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

pub(crate) type ServiceOrchestrator = WorkflowOrchestrator<InMemoryWorkflowRepository>;

/// Wires the seeded simulation collaborators, swapping in a CSV roster when one is given.
pub(crate) fn build_orchestrator(
    config: RecallConfig,
    roster_csv: Option<&Path>,
    repository: Arc<InMemoryWorkflowRepository>,
) -> Result<ServiceOrchestrator, AppError> {
    let seed = config.simulation_seed;
    let roster: Arc<dyn RosterProvider> = match roster_csv {
        Some(path) => {
            let provider = CsvRosterProvider::from_path(path)?;
            info!(path = %path.display(), sites = provider.site_count(), "roster imported");
            Arc::new(provider)
        }
        None => Arc::new(SimulatedRoster::new(seed)),
    };

    let collaborators = RecallCollaborators {
        forecasts: Arc::new(SimulatedForecastProvider::new(
            seed,
            config.holidays.clone(),
        )),
        roster,
        contact: Arc::new(SimulatedContactChannel::new(seed)),
        approvals: None,
    };

    Ok(WorkflowOrchestrator::new(config, collaborators, repository))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    parse_target_date(raw).map_err(|err| err.to_string())
}
