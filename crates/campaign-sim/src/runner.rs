//! Dry-run driver: one fixture, one workflow, simulated collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use campaign_orchestration::{
    ApprovalGateway, CampaignServices, EventBus, WorkflowEvent, WorkflowService, WorkflowState,
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::fixtures::CampaignFixture;
use crate::simulated::{AutoApprover, SimulatedCollaborators};
use crate::telemetry::RunSummary;

/// Everything a finished dry run leaves behind.
pub struct DryRunOutcome {
    pub state: WorkflowState,
    pub summary: RunSummary,
    pub collaborators: SimulatedCollaborators,
    pub approver: Arc<AutoApprover>,
}

/// Run `fixture` to completion under `config`.
pub async fn run_dry_run(fixture: CampaignFixture, config: &RunnerConfig) -> Result<DryRunOutcome> {
    let started = Instant::now();
    let CampaignFixture {
        brief,
        candidates,
        scripts,
    } = fixture;
    let total_budget = brief.total_budget;

    let events = EventBus::new().shared();
    let gateway = ApprovalGateway::with_events(Arc::clone(&events)).shared();
    let approver = Arc::new(AutoApprover::new(
        Arc::clone(&gateway),
        config.approvals.clone(),
    ));

    let collaborators = SimulatedCollaborators::new(
        candidates,
        scripts,
        Duration::from_millis(config.call_latency_ms),
    );
    let services = CampaignServices::new(
        collaborators.discovery.clone(),
        collaborators.calls.clone(),
        collaborators.outreach.clone(),
        collaborators.contracts.clone(),
    )
    .with_notifier(approver.clone())
    .with_persistence(collaborators.persistence.clone());

    let service = WorkflowService::new(services).with_gateway(gateway, Arc::clone(&events));
    let mut rx = events.subscribe();
    let workflow_id = service
        .start_workflow(brief, config.workflow.clone())
        .context("Workflow rejected at start")?;
    service.start_sweeper(config.workflow.approval_sweep_interval());
    info!(%workflow_id, strategy = %config.workflow.strategy, "Dry run started");

    let state = service
        .wait_for_completion(&workflow_id)
        .await
        .with_context(|| format!("Workflow {workflow_id} vanished from the registry"))?;
    let leftover = service.shutdown().await;
    if leftover.iter().any(|s| !s.is_terminal()) {
        warn!("Some workflows were still running at shutdown");
    }

    let mut summary = RunSummary::from_state(&state, config.workflow.strategy, total_budget);
    summary.event_counts = drain_event_counts(&mut rx);
    summary.approvals_decided = approver.decisions().len();
    summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    info!(
        %workflow_id,
        phase = %state.phase,
        confirmed = state.successful_negotiations,
        cost = state.total_cost,
        "Dry run finished"
    );

    Ok(DryRunOutcome {
        state,
        summary,
        collaborators,
        approver,
    })
}

fn drain_event_counts(rx: &mut broadcast::Receiver<WorkflowEvent>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    loop {
        match rx.try_recv() {
            Ok(event) => *counts.entry(event.event_type().to_string()).or_insert(0) += 1,
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Event counts are incomplete");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    counts
}
