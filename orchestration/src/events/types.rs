//! Event types published on the workflow bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::approval::{ApprovalKind, ApprovalPriority, RequestStatus};
use crate::negotiation::NegotiationPhase;
use crate::pool::PoolTier;
use crate::workflow::{PolicyDecision, WorkflowPhase};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    PhaseEntered {
        workflow_id: String,
        phase: WorkflowPhase,
        progress: f64,
        timestamp: DateTime<Utc>,
    },
    NegotiationStarted {
        workflow_id: String,
        negotiation_id: String,
        candidate_id: String,
        tier: PoolTier,
        timestamp: DateTime<Utc>,
    },
    NegotiationFinished {
        workflow_id: String,
        negotiation_id: String,
        candidate_id: String,
        outcome: NegotiationPhase,
        timestamp: DateTime<Utc>,
    },
    ApprovalRequested {
        workflow_id: String,
        request_id: String,
        kind: ApprovalKind,
        priority: ApprovalPriority,
        timestamp: DateTime<Utc>,
    },
    ApprovalClosed {
        workflow_id: String,
        request_id: String,
        kind: ApprovalKind,
        status: RequestStatus,
        timestamp: DateTime<Utc>,
    },
    PolicyEvaluated {
        workflow_id: String,
        decision: PolicyDecision,
        timestamp: DateTime<Utc>,
    },
    WorkflowFinished {
        workflow_id: String,
        phase: WorkflowPhase,
        progress: f64,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    /// Short event name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PhaseEntered { .. } => "phase_entered",
            Self::NegotiationStarted { .. } => "negotiation_started",
            Self::NegotiationFinished { .. } => "negotiation_finished",
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::ApprovalClosed { .. } => "approval_closed",
            Self::PolicyEvaluated { .. } => "policy_evaluated",
            Self::WorkflowFinished { .. } => "workflow_finished",
        }
    }

    pub fn workflow_id(&self) -> &str {
        match self {
            Self::PhaseEntered { workflow_id, .. }
            | Self::NegotiationStarted { workflow_id, .. }
            | Self::NegotiationFinished { workflow_id, .. }
            | Self::ApprovalRequested { workflow_id, .. }
            | Self::ApprovalClosed { workflow_id, .. }
            | Self::PolicyEvaluated { workflow_id, .. }
            | Self::WorkflowFinished { workflow_id, .. } => workflow_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::PhaseEntered { timestamp, .. }
            | Self::NegotiationStarted { timestamp, .. }
            | Self::NegotiationFinished { timestamp, .. }
            | Self::ApprovalRequested { timestamp, .. }
            | Self::ApprovalClosed { timestamp, .. }
            | Self::PolicyEvaluated { timestamp, .. }
            | Self::WorkflowFinished { timestamp, .. } => *timestamp,
        }
    }
}
