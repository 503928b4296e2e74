//! Campaign error types
//!
//! Workflow-level failures. A `CampaignError` stored on a `WorkflowState`
//! is terminal; degraded-but-continuing conditions go to
//! `WorkflowState::warnings` instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approval::ApprovalError;

/// Result type alias for campaign operations
pub type CampaignResult<T> = Result<T, CampaignError>;

/// Errors that terminate (or reject) a campaign workflow
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CampaignError {
    /// Discovery returned zero candidates
    #[error("No candidates discovered for campaign {campaign_id}")]
    DiscoveryEmpty { campaign_id: String },

    /// Budget cannot fund any candidate (or is below the accepted minimum)
    #[error("Budget {budget:.2} is infeasible: {reason}")]
    BudgetInfeasible { budget: f64, reason: String },

    /// Brief failed hard validation
    #[error("Invalid campaign brief: {message}")]
    InvalidBrief { message: String },

    /// Workflow config failed validation
    #[error("Invalid workflow config: {message}")]
    InvalidConfig { message: String },

    /// Workflow cancelled by the caller
    #[error("Workflow cancelled")]
    Cancelled,

    /// An internal invariant was broken (e.g. illegal phase transition)
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// Unknown workflow id
    #[error("Workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: String },

    /// Approval gateway rejected an operation
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl CampaignError {
    /// Create a budget infeasible error
    pub fn budget_infeasible(budget: f64, reason: impl Into<String>) -> Self {
        Self::BudgetInfeasible {
            budget,
            reason: reason.into(),
        }
    }

    /// Create an invalid brief error
    pub fn invalid_brief(message: impl Into<String>) -> Self {
        Self::InvalidBrief {
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a workflow not found error
    pub fn workflow_not_found(workflow_id: impl Into<String>) -> Self {
        Self::WorkflowNotFound {
            workflow_id: workflow_id.into(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::DiscoveryEmpty { .. } => "DISCOVERY_EMPTY",
            Self::BudgetInfeasible { .. } => "BUDGET_INFEASIBLE",
            Self::InvalidBrief { .. } => "INVALID_BRIEF",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Cancelled => "CANCELLED",
            Self::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            Self::WorkflowNotFound { .. } => "WORKFLOW_NOT_FOUND",
            Self::Approval(_) => "APPROVAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = CampaignError::DiscoveryEmpty {
            campaign_id: "c-1".into(),
        };
        assert_eq!(err.code(), "DISCOVERY_EMPTY");
        assert_eq!(CampaignError::Cancelled.code(), "CANCELLED");
        assert_eq!(
            CampaignError::invariant("pool tiers overlap").code(),
            "INVARIANT_VIOLATION"
        );
        assert_eq!(
            CampaignError::invalid_config("bad multiplier").code(),
            "INVALID_CONFIG"
        );
        assert_eq!(
            CampaignError::budget_infeasible(100.0, "below minimum").code(),
            "BUDGET_INFEASIBLE"
        );
    }

    #[test]
    fn test_error_display() {
        let err = CampaignError::budget_infeasible(250.0, "below minimum of 500.00");
        assert_eq!(
            err.to_string(),
            "Budget 250.00 is infeasible: below minimum of 500.00"
        );
    }

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let err = CampaignError::workflow_not_found("wf-9");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "workflow_not_found");
        assert_eq!(json["workflow_id"], "wf-9");

        let back: CampaignError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
