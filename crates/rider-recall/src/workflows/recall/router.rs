use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::domain::{parse_target_date, WorkflowId};
use super::orchestrator::{WorkflowError, WorkflowOrchestrator};
use super::providers::WorkflowRepository;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RunWorkflowRequest {
    pub site_id: String,
    pub target_date: String,
    #[serde(default)]
    pub approver_feedback: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

/// Router builder exposing workflow runs, status lookups and approver feedback.
pub fn recall_router<W>(orchestrator: Arc<WorkflowOrchestrator<W>>) -> Router
where
    W: WorkflowRepository + 'static,
{
    Router::new()
        .route("/api/v1/recall/workflows", post(run_handler::<W>))
        .route(
            "/api/v1/recall/workflows/:workflow_id",
            get(status_handler::<W>),
        )
        .route(
            "/api/v1/recall/workflows/:workflow_id/approval",
            post(approval_handler::<W>),
        )
        .with_state(orchestrator)
}

pub(crate) async fn run_handler<W>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<W>>>,
    axum::Json(request): axum::Json<RunWorkflowRequest>,
) -> Response
where
    W: WorkflowRepository + 'static,
{
    let target_date = match parse_target_date(&request.target_date) {
        Ok(date) => date,
        Err(err) => return error_response(WorkflowError::InvalidInput(err)),
    };

    match orchestrator
        .run(&request.site_id, target_date, request.approver_feedback)
        .await
    {
        Ok(artifact) => (StatusCode::OK, axum::Json(artifact)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<W>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<W>>>,
    Path(workflow_id): Path<String>,
) -> Response
where
    W: WorkflowRepository + 'static,
{
    match orchestrator.get(&WorkflowId(workflow_id)) {
        Ok(artifact) => (StatusCode::OK, axum::Json(artifact)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn approval_handler<W>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<W>>>,
    Path(workflow_id): Path<String>,
    axum::Json(request): axum::Json<ApprovalRequest>,
) -> Response
where
    W: WorkflowRepository + 'static,
{
    let id = WorkflowId(workflow_id);
    match orchestrator.resume_with_feedback(&id, request.approved).await {
        Ok(artifact) => (StatusCode::OK, axum::Json(artifact)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: WorkflowError) -> Response {
    AppError::from(err).into_response()
}
