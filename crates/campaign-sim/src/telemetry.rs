//! Run summaries and telemetry output.
//!
//! Writing is best-effort: failures are logged and never abort a run.

use std::collections::BTreeMap;
use std::path::Path;

use campaign_orchestration::{
    NegotiationPhase, NegotiationRecord, PoolTier, SelectionStrategy, WorkflowPhase,
    WorkflowState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Install the global tracing subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// One negotiation as reported after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationSummary {
    pub candidate_id: String,
    pub candidate_name: String,
    pub pool_tier: PoolTier,
    pub outcome: NegotiationPhase,
    pub rate: f64,
    pub follow_ups: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<&NegotiationRecord> for NegotiationSummary {
    fn from(record: &NegotiationRecord) -> Self {
        Self {
            candidate_id: record.candidate_id.clone(),
            candidate_name: record.candidate_name.clone(),
            pool_tier: record.pool_tier,
            outcome: record.phase(),
            rate: record.agreed_rate(),
            follow_ups: record.follow_ups().len(),
            failure: record.failure_reason.as_ref().map(ToString::to_string),
        }
    }
}

/// Outcome of one dry run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub workflow_id: String,
    pub campaign_id: String,
    pub strategy: SelectionStrategy,
    pub phase: WorkflowPhase,
    pub progress: f64,
    pub total_budget: f64,
    pub total_cost: f64,
    pub successful_negotiations: u32,
    pub failed_negotiations: u32,
    pub negotiations: Vec<NegotiationSummary>,
    pub contracts_generated: usize,
    pub contracts_dispatched: usize,
    pub approvals_decided: usize,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Bus events seen during the run, by event type.
    pub event_counts: BTreeMap<String, usize>,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn from_state(
        state: &WorkflowState,
        strategy: SelectionStrategy,
        total_budget: f64,
    ) -> Self {
        Self {
            workflow_id: state.workflow_id.clone(),
            campaign_id: state.campaign_id.clone(),
            strategy,
            phase: state.phase,
            progress: state.progress,
            total_budget,
            total_cost: state.total_cost,
            successful_negotiations: state.successful_negotiations,
            failed_negotiations: state.failed_negotiations,
            negotiations: state.negotiations.iter().map(NegotiationSummary::from).collect(),
            contracts_generated: state.contracts.len(),
            contracts_dispatched: state.contracts.iter().filter(|c| c.dispatched).count(),
            approvals_decided: 0,
            warnings: state.warnings.clone(),
            failure: state.failure.as_ref().map(ToString::to_string),
            event_counts: BTreeMap::new(),
            elapsed_ms: 0,
            finished_at: state.finished_at.unwrap_or_else(Utc::now),
        }
    }

    /// Share of the budget spent, 0.0–1.0.
    pub fn budget_utilization(&self) -> f64 {
        if self.total_budget <= 0.0 {
            0.0
        } else {
            self.total_cost / self.total_budget
        }
    }

    /// Human-readable multi-line report.
    pub fn report(&self) -> String {
        let mut out = format!(
            "Workflow {} ({}) finished in {} at {:.0}%\n\
             Strategy: {} | spent {:.2} of {:.2} ({:.1}%)\n\
             Negotiations: {} confirmed, {} failed | contracts {}/{} dispatched\n",
            self.workflow_id,
            self.campaign_id,
            self.phase,
            self.progress,
            self.strategy,
            self.total_cost,
            self.total_budget,
            self.budget_utilization() * 100.0,
            self.successful_negotiations,
            self.failed_negotiations,
            self.contracts_dispatched,
            self.contracts_generated,
        );
        for n in &self.negotiations {
            out.push_str(&format!(
                "  - {} [{}] {} at {:.2}",
                n.candidate_name, n.pool_tier, n.outcome, n.rate
            ));
            if let Some(failure) = &n.failure {
                out.push_str(&format!(" ({failure})"));
            }
            out.push('\n');
        }
        for warning in &self.warnings {
            out.push_str(&format!("  ! {warning}\n"));
        }
        if let Some(failure) = &self.failure {
            out.push_str(&format!("Failure: {failure}\n"));
        }
        out
    }
}

/// Write the summary as pretty JSON to `path`.
pub fn write_run_summary(summary: &RunSummary, path: &Path) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => match std::fs::write(path, json) {
            Ok(()) => info!(path = %path.display(), "Wrote run summary"),
            Err(e) => warn!("Failed to write run summary: {e}"),
        },
        Err(e) => warn!("Failed to serialize run summary: {e}"),
    }
}

/// Append the summary as one JSON line to `path`.
pub fn append_telemetry(summary: &RunSummary, path: &Path) {
    match serde_json::to_string(summary) {
        Ok(json) => {
            use std::io::Write;
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{json}") {
                        warn!("Failed to append telemetry: {e}");
                    } else {
                        info!(path = %path.display(), "Appended run telemetry");
                    }
                }
                Err(e) => warn!("Failed to open telemetry file: {e}"),
            }
        }
        Err(e) => warn!("Failed to serialize telemetry: {e}"),
    }
}
