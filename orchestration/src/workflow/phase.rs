//! Campaign-level workflow phases and their progress bands.

use serde::{Deserialize, Serialize};

/// Phase of a campaign workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    DataCollection,
    Validation,
    Discovery,
    Selection,
    NegotiationSequence,
    Approvals,
    ContractGeneration,
    ContractDelivery,
    Monitoring,
    Completed,
    Failed,
}

impl WorkflowPhase {
    /// Non-terminal phases in execution order.
    pub const SEQUENCE: [WorkflowPhase; 9] = [
        Self::DataCollection,
        Self::Validation,
        Self::Discovery,
        Self::Selection,
        Self::NegotiationSequence,
        Self::Approvals,
        Self::ContractGeneration,
        Self::ContractDelivery,
        Self::Monitoring,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Progress band `(start, end)` in percent.
    ///
    /// Terminal phases have an empty band: `Completed` pins progress at 100,
    /// `Failed` leaves it where it was.
    pub fn progress_range(self) -> (f64, f64) {
        match self {
            Self::DataCollection => (0.0, 20.0),
            Self::Validation => (20.0, 25.0),
            Self::Discovery => (25.0, 35.0),
            Self::Selection => (35.0, 40.0),
            Self::NegotiationSequence => (40.0, 65.0),
            Self::Approvals => (65.0, 80.0),
            Self::ContractGeneration => (80.0, 85.0),
            Self::ContractDelivery => (85.0, 90.0),
            Self::Monitoring => (90.0, 100.0),
            Self::Completed => (100.0, 100.0),
            Self::Failed => (0.0, 0.0),
        }
    }

    /// Progress at `fraction` (0..=1) of the way through this phase.
    pub fn progress_at(self, fraction: f64) -> f64 {
        let (start, end) = self.progress_range();
        start + (end - start) * fraction.clamp(0.0, 1.0)
    }

    /// Short activity label shown while the phase runs.
    pub fn activity(self) -> &'static str {
        match self {
            Self::DataCollection => "collecting campaign data",
            Self::Validation => "validating campaign brief",
            Self::Discovery => "discovering creators",
            Self::Selection => "selecting candidate pool",
            Self::NegotiationSequence => "negotiating with creators",
            Self::Approvals => "reconciling approvals",
            Self::ContractGeneration => "generating contracts",
            Self::ContractDelivery => "delivering contracts",
            Self::Monitoring => "setting up monitoring",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataCollection => write!(f, "data_collection"),
            Self::Validation => write!(f, "validation"),
            Self::Discovery => write!(f, "discovery"),
            Self::Selection => write!(f, "selection"),
            Self::NegotiationSequence => write!(f, "negotiation_sequence"),
            Self::Approvals => write!(f, "approvals"),
            Self::ContractGeneration => write!(f, "contract_generation"),
            Self::ContractDelivery => write!(f, "contract_delivery"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
