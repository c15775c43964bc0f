use crate::infra::{build_orchestrator, InMemoryWorkflowRepository, ServiceOrchestrator};
use chrono::NaiveDate;
use clap::Args;
use rider_recall::config::AppConfig;
use rider_recall::error::AppError;
use rider_recall::workflows::recall::{
    parse_target_date, WorkflowArtifact, WorkflowError, WorkflowResolution,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct RecallRunArgs {
    /// Site to recall riders for
    #[arg(long)]
    pub(crate) site_id: String,
    /// Target date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: NaiveDate,
    /// Record approver consent for the recall
    #[arg(long, conflicts_with = "reject")]
    pub(crate) approve: bool,
    /// Record approver refusal for the recall
    #[arg(long)]
    pub(crate) reject: bool,
    /// Roster CSV export to use instead of the simulated roster
    #[arg(long)]
    pub(crate) roster_csv: Option<PathBuf>,
    /// Print the workflow artifact as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

impl RecallRunArgs {
    pub(crate) fn approver_feedback(&self) -> Option<bool> {
        match (self.approve, self.reject) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the simulation seed (defaults to RECALL_SIMULATION_SEED)
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Print each scenario's artifact as JSON after the summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_recall(args: RecallRunArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let repository = Arc::new(InMemoryWorkflowRepository::default());
    let orchestrator = build_orchestrator(config.recall, args.roster_csv.as_deref(), repository)?;

    let artifact = orchestrator
        .run(&args.site_id, args.date, args.approver_feedback())
        .await?;

    if args.json {
        print_json(&artifact);
    } else {
        render_artifact(&artifact);
    }
    Ok(())
}

struct Scenario {
    title: &'static str,
    site_id: &'static str,
    target_date: &'static str,
    approver_feedback: Option<bool>,
}

const SCENARIOS: [Scenario; 3] = [
    Scenario {
        title: "Valentine's Day surge, approver consents",
        site_id: "site_001",
        target_date: "2024-02-14",
        approver_feedback: Some(true),
    },
    Scenario {
        title: "Labour Day surge, approver declines",
        site_id: "site_002",
        target_date: "2024-05-01",
        approver_feedback: Some(false),
    },
    Scenario {
        title: "Ordinary Saturday, decided by the configured approval policy",
        site_id: "site_003",
        target_date: "2024-06-15",
        approver_feedback: None,
    },
];

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(seed) = args.seed {
        config.recall.simulation_seed = seed;
    }

    println!("Rider recall demo");
    println!(
        "- seed {} | approval policy {} | contact pool {} | gap threshold {:.0}%",
        config.recall.simulation_seed,
        config.recall.approval_policy.label(),
        config.recall.contact.concurrency_limit,
        config.recall.gap_threshold * 100.0
    );

    let repository = Arc::new(InMemoryWorkflowRepository::default());
    let orchestrator = build_orchestrator(config.recall, None, repository)?;

    for (index, scenario) in SCENARIOS.iter().enumerate() {
        println!("\nScenario {}: {}", index + 1, scenario.title);
        let artifact = run_scenario(&orchestrator, scenario).await?;
        render_artifact(&artifact);
        if args.json {
            print_json(&artifact);
        }
    }

    Ok(())
}

async fn run_scenario(
    orchestrator: &ServiceOrchestrator,
    scenario: &Scenario,
) -> Result<WorkflowArtifact, AppError> {
    let date = parse_target_date(scenario.target_date).map_err(WorkflowError::from)?;

    let artifact = orchestrator
        .run(scenario.site_id, date, scenario.approver_feedback)
        .await?;
    if !artifact.is_awaiting_approval() {
        return Ok(artifact);
    }

    println!(
        "  {} is awaiting approval; approving on the approver's behalf",
        artifact.workflow_id
    );
    Ok(orchestrator
        .resume_with_feedback(&artifact.workflow_id, true)
        .await?)
}

fn render_artifact(artifact: &WorkflowArtifact) {
    let state = &artifact.state;
    println!(
        "- Workflow {} for {} on {} -> {} ({:.0}% | status {})",
        artifact.workflow_id,
        artifact.site_id,
        artifact.target_date,
        artifact
            .resolution
            .map(WorkflowResolution::label)
            .unwrap_or("in progress"),
        state.progress_percent,
        state.status.label()
    );
    let stages: Vec<&str> = state
        .completed_stages
        .iter()
        .map(|stage| stage.label())
        .collect();
    println!("  Stages: {}", stages.join(" -> "));
    if let Some(error) = &state.error_message {
        println!("  Failed: {error}");
    }

    let artifacts = &artifact.artifacts;
    if let Some(estimate) = &artifacts.estimate {
        println!(
            "  Gap: demand {} vs capacity {} ({:.1}% gap, {} riders needed, confidence {:.2})",
            estimate.predicted_demand,
            estimate.current_capacity,
            estimate.gap_ratio * 100.0,
            estimate.required_workers,
            estimate.confidence
        );
        println!("  Suggestion: {}", estimate.suggestion);
    }
    if let Some(decision) = &artifacts.decision {
        println!(
            "  Decision: {} ({})",
            if decision.accepted { "proceed" } else { "stop" },
            decision.reason
        );
    }
    if let Some(profile) = &artifacts.profile {
        println!(
            "  Urgency: {} | weekend {} | holiday {} | min acceptance {:.2} | max distance {:.1} km",
            profile.tier.label(),
            profile.is_weekend,
            profile.is_holiday,
            profile.min_acceptance_rate,
            profile.max_distance_km
        );
    }
    if let Some(selection) = &artifacts.selection {
        println!(
            "  Selection: {} evaluated | {} eligible | {} shortlisted",
            selection.evaluated,
            selection.eligible,
            selection.candidates.len()
        );
        for candidate in selection.candidates.iter().take(5) {
            println!(
                "    - {} ({}): score {:.1} [{}]",
                candidate.worker.worker_id,
                candidate.worker.name,
                candidate.score,
                candidate.priority.label()
            );
        }
    }
    if let Some(report) = &artifacts.report {
        println!(
            "  Outreach: {} contacted | {} connected | {} agreed of {} required",
            report.total_contacted,
            report.connected_count,
            report.agreed_count,
            report.required_workers
        );
        println!(
            "  Rates: connection {:.0}% | success {:.0}% | coverage {:.0}% | target {}",
            report.connection_rate * 100.0,
            report.success_rate * 100.0,
            report.coverage_rate * 100.0,
            if report.target_met { "met" } else { "missed" }
        );
        for recommendation in &report.recommendations {
            println!("    * {recommendation}");
        }
    }
}

fn print_json(artifact: &WorkflowArtifact) {
    match serde_json::to_string_pretty(artifact) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("  Workflow payload unavailable: {err}"),
    }
}
