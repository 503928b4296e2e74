//! Campaign-level aggregate state.
//!
//! Owned by the workflow task; readers only ever see cloned snapshots
//! published through a watch channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::WorkflowPhase;
use crate::budget::BudgetAllocation;
use crate::error::CampaignError;
use crate::negotiation::NegotiationRecord;
use crate::pool::CandidatePool;

/// A generated contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub contract_id: String,
    pub negotiation_id: String,
    pub candidate_id: String,
    pub rate: f64,
    pub dispatched: bool,
    pub generated_at: DateTime<Utc>,
}

/// Snapshot of a campaign workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub campaign_id: String,
    pub phase: WorkflowPhase,
    /// Phases finished so far, in order.
    pub completed_phases: Vec<WorkflowPhase>,
    /// Percent, never decreases.
    pub progress: f64,
    pub current_activity: String,
    pub allocation: Option<BudgetAllocation>,
    pub pool: CandidatePool,
    pub negotiations: Vec<NegotiationRecord>,
    pub successful_negotiations: u32,
    pub failed_negotiations: u32,
    /// Sum of confirmed final rates.
    pub total_cost: f64,
    pub contracts: Vec<ContractRecord>,
    /// Degraded-but-continuing conditions.
    pub warnings: Vec<String>,
    /// Terminal error, set only when `phase == Failed`.
    pub failure: Option<CampaignError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new(workflow_id: impl Into<String>, campaign_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            campaign_id: campaign_id.into(),
            phase: WorkflowPhase::DataCollection,
            completed_phases: Vec::new(),
            progress: 0.0,
            current_activity: WorkflowPhase::DataCollection.activity().to_string(),
            allocation: None,
            pool: CandidatePool::default(),
            negotiations: Vec::new(),
            successful_negotiations: 0,
            failed_negotiations: 0,
            total_cost: 0.0,
            contracts: Vec::new(),
            warnings: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Raise progress to `value`. Lower values are ignored.
    pub fn set_progress(&mut self, value: f64) {
        if value.is_finite() {
            self.progress = self.progress.max(value.clamp(0.0, 100.0));
        }
    }

    /// Close the current phase and enter `phase` at the start of its band.
    ///
    /// No-op once the workflow is terminal.
    pub fn enter_phase(&mut self, phase: WorkflowPhase) {
        if self.is_terminal() || phase == self.phase {
            return;
        }
        self.completed_phases.push(self.phase);
        self.phase = phase;
        self.current_activity = phase.activity().to_string();
        if phase == WorkflowPhase::Completed {
            self.set_progress(100.0);
            self.finished_at = Some(Utc::now());
        } else {
            self.set_progress(phase.progress_range().0);
        }
    }

    /// Terminate with `error`. Progress is kept as is.
    pub fn fail(&mut self, error: CampaignError) {
        if self.is_terminal() {
            return;
        }
        self.phase = WorkflowPhase::Failed;
        self.current_activity = format!("failed: {error}");
        self.failure = Some(error);
        self.finished_at = Some(Utc::now());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Store a terminal negotiation and update counters.
    pub fn record_negotiation(&mut self, record: NegotiationRecord) {
        if record.is_successful() {
            self.successful_negotiations += 1;
            self.total_cost += record
                .final_outcome
                .as_ref()
                .map(|o| o.final_rate)
                .unwrap_or_else(|| record.agreed_rate());
            self.pool.mark_confirmed(&record.candidate_id);
        } else {
            self.failed_negotiations += 1;
            self.pool.mark_declined(&record.candidate_id);
        }
        self.negotiations.push(record);
    }

    /// Terminal negotiations so far.
    pub fn attempts(&self) -> u32 {
        self.successful_negotiations + self.failed_negotiations
    }

    pub fn summary_line(&self) -> String {
        format!(
            "[{}] {:.0}% | {} confirmed, {} failed | cost {:.2} | {} warning(s)",
            self.phase,
            self.progress,
            self.successful_negotiations,
            self.failed_negotiations,
            self.total_cost,
            self.warnings.len()
        )
    }
}
