//! End-to-end recall runs through the public orchestrator and HTTP router, wired to the
//! seeded simulation collaborators and a CSV roster.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use rider_recall::workflows::recall::{
        ApprovalPolicy, DemandForecast, GapEstimateProvider, HolidayCalendar, ProviderError,
        RecallCollaborators, RecallConfig, RepositoryError, RosterProvider,
        SimulatedContactChannel, SimulatedForecastProvider, SimulatedRoster, WorkflowArtifact,
        WorkflowId, WorkflowOrchestrator, WorkflowRepository,
    };

    pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[derive(Default)]
    pub(super) struct MemoryRepository {
        records: Mutex<HashMap<WorkflowId, WorkflowArtifact>>,
    }

    impl WorkflowRepository for MemoryRepository {
        fn save(&self, artifact: &WorkflowArtifact) -> Result<(), RepositoryError> {
            self.records
                .lock()
                .expect("records lock")
                .insert(artifact.workflow_id.clone(), artifact.clone());
            Ok(())
        }

        fn fetch(&self, id: &WorkflowId) -> Result<Option<WorkflowArtifact>, RepositoryError> {
            Ok(self.records.lock().expect("records lock").get(id).cloned())
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

    pub(super) fn simulated(
        seed: u64,
        policy: ApprovalPolicy,
    ) -> WorkflowOrchestrator<MemoryRepository> {
        let config = RecallConfig {
            approval_policy: policy,
            simulation_seed: seed,
            ..RecallConfig::default()
        };
        let collaborators = RecallCollaborators {
            forecasts: Arc::new(SimulatedForecastProvider::new(
                seed,
                HolidayCalendar::default(),
            )),
            roster: Arc::new(SimulatedRoster::new(seed)),
            contact: Arc::new(SimulatedContactChannel::new(seed)),
            approvals: None,
        };
        WorkflowOrchestrator::new(config, collaborators, Arc::new(MemoryRepository::default()))
    }

    pub(super) fn with_roster(
        forecast: DemandForecast,
        roster: Arc<dyn RosterProvider>,
    ) -> WorkflowOrchestrator<MemoryRepository> {
        let collaborators = RecallCollaborators {
            forecasts: Arc::new(FixedForecast(forecast)),
            roster,
            contact: Arc::new(SimulatedContactChannel::new(7)),
            approvals: None,
        };
        WorkflowOrchestrator::new(
            RecallConfig::default(),
            collaborators,
            Arc::new(MemoryRepository::default()),
        )
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use rider_recall::workflows::recall::selection::candidate_pool_size;
use rider_recall::workflows::recall::{
    recall_router, ApprovalPolicy, CsvRosterProvider, DemandForecast, UrgencyTier,
    WorkflowResolution, WorkflowStage, WorkflowStatus,
};

#[tokio::test]
async fn simulated_holiday_recall_satisfies_pipeline_invariants() {
    let orchestrator = simulated(42, ApprovalPolicy::Manual);

    let artifact = orchestrator
        .run("site_001", date(2024, 2, 14), Some(true))
        .await
        .expect("run completes");

    assert_eq!(artifact.resolution, Some(WorkflowResolution::RecallExecuted));
    assert_eq!(artifact.state.status, WorkflowStatus::Completed);

    let estimate = artifact.artifacts.estimate.as_ref().expect("estimate");
    assert!(estimate.has_gap);
    assert!(estimate.gap_ratio > 0.3);
    let profile = artifact.artifacts.profile.as_ref().expect("profile");
    assert_eq!(profile.tier, UrgencyTier::High);
    assert!(profile.is_holiday);

    let selection = artifact.artifacts.selection.as_ref().expect("selection");
    assert!(
        selection.candidates.len()
            <= candidate_pool_size(estimate.required_workers, orchestrator.config().max_candidates)
    );
    assert!(selection
        .candidates
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));

    let outcomes = artifact.artifacts.outcomes.as_ref().expect("outcomes");
    assert_eq!(outcomes.len(), selection.candidates.len());
    for (outcome, candidate) in outcomes.iter().zip(&selection.candidates) {
        assert_eq!(outcome.worker_id, candidate.worker.worker_id);
        assert!(!outcome.agreed || outcome.connected);
    }

    let report = artifact.artifacts.report.as_ref().expect("report");
    assert!(report.agreed_count <= report.connected_count);
    assert!(report.connected_count <= report.total_contacted);
    assert_eq!(report.total_contacted, outcomes.len());
}

#[tokio::test]
async fn same_seed_reproduces_the_same_run() {
    let first = simulated(2024, ApprovalPolicy::AutoApprove)
        .run("site_003", date(2024, 6, 15), None)
        .await
        .expect("run completes");
    let second = simulated(2024, ApprovalPolicy::AutoApprove)
        .run("site_003", date(2024, 6, 15), None)
        .await
        .expect("run completes");

    assert_eq!(
        serde_json::to_value(&first.artifacts).expect("serialize"),
        serde_json::to_value(&second.artifacts).expect("serialize")
    );
    assert_eq!(first.state.completed_stages, second.state.completed_stages);
}

#[tokio::test]
async fn rejected_holiday_recall_contacts_nobody() {
    let artifact = simulated(42, ApprovalPolicy::AutoReject)
        .run("site_002", date(2024, 5, 1), None)
        .await
        .expect("run completes");

    assert_eq!(artifact.resolution, Some(WorkflowResolution::Rejected));
    assert_eq!(
        artifact.state.completed_stages.last(),
        Some(&WorkflowStage::Deciding)
    );
    assert!(artifact.artifacts.outcomes.is_none());
}

#[tokio::test]
async fn csv_roster_feeds_selection() {
    let csv = "\
worker_id,name,contact,site_id,status,acceptance_rate,avg_response_time_seconds,completion_rate,tenure_days,distance_km,holiday_experience_count,peak_availability,weekend_availability
rider_001,Rider 001,13800000001,site_001,active,0.92,40,0.96,200,1.2,4,yes,yes
rider_002,Rider 002,13800000002,site_001,active,0.81,75,0.9,60,2.8,1,no,yes
rider_003,Rider 003,13800000003,site_001,offline,0.95,20,0.99,300,0.5,6,yes,yes
rider_004,Rider 004,13800000004,site_001,active,0.55,200,0.72,5,7.5,0,no,no
rider_101,Rider 101,13800000101,site_002,active,0.9,30,0.95,120,1.0,2,yes,no
";
    let roster = CsvRosterProvider::from_reader(csv.as_bytes()).expect("roster parses");
    let orchestrator = with_roster(
        DemandForecast {
            predicted_demand: 40,
            current_capacity: 32,
            confidence: 0.8,
            suggestion: None,
        },
        Arc::new(roster),
    );

    let artifact = orchestrator
        .run("site_001", date(2024, 6, 12), Some(true))
        .await
        .expect("run completes");

    let selection = artifact.artifacts.selection.as_ref().expect("selection");
    assert_eq!(selection.evaluated, 4);
    let ids: Vec<&str> = selection
        .candidates
        .iter()
        .map(|candidate| candidate.worker.worker_id.0.as_str())
        .collect();
    assert_eq!(ids, vec!["rider_001", "rider_002"]);
}

#[tokio::test]
async fn http_run_then_status_round_trip() {
    let orchestrator = Arc::new(simulated(42, ApprovalPolicy::Manual));

    let response = recall_router(Arc::clone(&orchestrator))
        .oneshot(
            Request::post("/api/v1/recall/workflows")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "site_id": "site_001",
                        "target_date": "2024-02-14",
                    }))
                    .expect("encode"),
                ))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let created: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(created["resolution"], "awaiting_approval");
    let workflow_id = created["workflow_id"].as_str().expect("id").to_string();

    let response = recall_router(Arc::clone(&orchestrator))
        .oneshot(
            Request::post(format!("/api/v1/recall/workflows/{workflow_id}/approval"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"approved":true}"#))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = recall_router(orchestrator)
        .oneshot(
            Request::get(format!("/api/v1/recall/workflows/{workflow_id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let stored: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(stored["resolution"], "recall_executed");
    assert_eq!(stored["state"]["current_stage"], "completed");
}
