use serde::{Deserialize, Serialize};

use super::config::ApprovalPolicy;
use super::domain::GapEstimate;

/// Input to the decision gate. `approver_feedback` of `None` means nobody has answered yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub site_id: String,
    pub estimate: GapEstimate,
    pub approver_feedback: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    StartSelection,
    EndWorkflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub accepted: bool,
    pub next_step: NextStep,
    pub reason: String,
}

pub const NO_GAP_REASON: &str = "no gap";
pub const APPROVER_DECLINED_REASON: &str = "approver declined";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("recall for site {site_id} is awaiting approver feedback")]
    PendingApproval { site_id: String },
}

/// Threshold plus approval gate in front of candidate selection.
pub struct DecisionGate;

impl DecisionGate {
    /// Decides whether recall proceeds.
    ///
    /// Without a gap the approver is never consulted. With a gap and no feedback the gate
    /// reports [`DecisionError::PendingApproval`] instead of inventing an answer.
    pub fn decide(
        request: &DecisionRequest,
        threshold_ratio: f64,
    ) -> Result<DecisionResult, DecisionError> {
        let estimate = &request.estimate;
        if !estimate.has_gap || estimate.gap_ratio <= threshold_ratio {
            return Ok(DecisionResult {
                accepted: false,
                next_step: NextStep::EndWorkflow,
                reason: NO_GAP_REASON.to_string(),
            });
        }

        match request.approver_feedback {
            Some(true) => Ok(DecisionResult {
                accepted: true,
                next_step: NextStep::StartSelection,
                reason: format!(
                    "approver accepted recall for a {:.1}% gap (threshold {:.1}%)",
                    estimate.gap_ratio * 100.0,
                    threshold_ratio * 100.0
                ),
            }),
            Some(false) => Ok(DecisionResult {
                accepted: false,
                next_step: NextStep::EndWorkflow,
                reason: APPROVER_DECLINED_REASON.to_string(),
            }),
            None => Err(DecisionError::PendingApproval {
                site_id: request.site_id.clone(),
            }),
        }
    }
}

impl ApprovalPolicy {
    /// The decision this policy stands in for; `Manual` never answers.
    pub const fn feedback(self) -> Option<bool> {
        match self {
            Self::Manual => None,
            Self::AutoApprove => Some(true),
            Self::AutoReject => Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn estimate(predicted_demand: u32, current_capacity: u32) -> GapEstimate {
        let ratio = super::super::domain::gap_ratio(predicted_demand, current_capacity);
        GapEstimate {
            site_id: "site_001".to_string(),
            target_date: NaiveDate::from_ymd_opt(2024, 2, 14).expect("valid date"),
            predicted_demand,
            current_capacity,
            gap_ratio: ratio,
            has_gap: ratio > 0.1,
            required_workers: if ratio > 0.1 { 40 } else { 0 },
            confidence: 0.9,
            suggestion: String::new(),
        }
    }

    fn request(estimate: GapEstimate, approver_feedback: Option<bool>) -> DecisionRequest {
        DecisionRequest {
            site_id: "site_001".to_string(),
            estimate,
            approver_feedback,
        }
    }

    #[test]
    fn approved_gap_starts_selection() {
        let decision = DecisionGate::decide(&request(estimate(150, 100), Some(true)), 0.1)
            .expect("feedback present");

        assert!(decision.accepted);
        assert_eq!(decision.next_step, NextStep::StartSelection);
        assert!(decision.reason.contains("33.3%"));
    }

    #[test]
    fn declined_gap_ends_workflow() {
        let decision = DecisionGate::decide(&request(estimate(150, 100), Some(false)), 0.1)
            .expect("feedback present");

        assert!(!decision.accepted);
        assert_eq!(decision.next_step, NextStep::EndWorkflow);
        assert_eq!(decision.reason, APPROVER_DECLINED_REASON);
    }

    #[test]
    fn no_gap_ignores_feedback() {
        for feedback in [None, Some(true), Some(false)] {
            let decision = DecisionGate::decide(&request(estimate(100, 100), feedback), 0.1)
                .expect("no gap never stalls");
            assert!(!decision.accepted);
            assert_eq!(decision.reason, NO_GAP_REASON);
        }
    }

    #[test]
    fn missing_feedback_is_pending() {
        assert_eq!(
            DecisionGate::decide(&request(estimate(150, 100), None), 0.1),
            Err(DecisionError::PendingApproval {
                site_id: "site_001".to_string()
            })
        );
    }

    #[test]
    fn decisions_are_repeatable() {
        let request = request(estimate(150, 100), Some(true));
        assert_eq!(
            DecisionGate::decide(&request, 0.1),
            DecisionGate::decide(&request, 0.1)
        );
    }

    #[test]
    fn policy_feedback_matches_variant() {
        assert_eq!(ApprovalPolicy::Manual.feedback(), None);
        assert_eq!(ApprovalPolicy::AutoApprove.feedback(), Some(true));
        assert_eq!(ApprovalPolicy::AutoReject.feedback(), Some(false));
    }
}
