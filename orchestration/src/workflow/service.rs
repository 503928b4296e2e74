//! Workflow service: the API surface over engine, registry and gateway.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::engine::{new_workflow_id, WorkflowEngine};
use super::policy::ProgressPolicy;
use super::registry::{SharedWorkflowRegistry, WorkflowEntry, WorkflowRegistry};
use super::state::WorkflowState;
use crate::approval::{
    ApprovalGateway, ApprovalRequest, HumanDecision, ResolveOutcome, SharedApprovalGateway,
    SponsorDecision,
};
use crate::config::WorkflowConfig;
use crate::error::{CampaignError, CampaignResult};
use crate::events::{EventBus, SharedEventBus};
use crate::models::CampaignBrief;
use crate::services::CampaignServices;

/// Starts, tracks and cancels campaign workflows.
///
/// All workflows started through one service share a single approval
/// gateway and event bus.
pub struct WorkflowService {
    services: CampaignServices,
    gateway: SharedApprovalGateway,
    registry: SharedWorkflowRegistry,
    events: SharedEventBus,
    policy: Option<Arc<dyn ProgressPolicy>>,
    sweeper_cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl WorkflowService {
    pub fn new(services: CampaignServices) -> Self {
        let events = EventBus::new().shared();
        let gateway = ApprovalGateway::with_events(Arc::clone(&events)).shared();
        Self {
            services,
            gateway,
            registry: WorkflowRegistry::new().shared(),
            events,
            policy: None,
            sweeper_cancel: CancellationToken::new(),
            sweeper: Mutex::new(None),
        }
    }

    /// Use an existing gateway (and its event bus) instead of fresh ones.
    pub fn with_gateway(mut self, gateway: SharedApprovalGateway, events: SharedEventBus) -> Self {
        self.gateway = gateway;
        self.events = events;
        self
    }

    pub fn with_registry(mut self, registry: SharedWorkflowRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Override the default threshold policy for every workflow.
    pub fn with_policy(mut self, policy: Arc<dyn ProgressPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn gateway(&self) -> &SharedApprovalGateway {
        &self.gateway
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn registry(&self) -> &SharedWorkflowRegistry {
        &self.registry
    }

    /// Start the periodic approval sweeper. Calling again replaces it.
    pub fn start_sweeper(&self, interval: Duration) {
        let handle = self
            .gateway
            .spawn_sweeper(interval, self.sweeper_cancel.child_token());
        let previous = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Spawn a workflow for `brief` and return its id immediately.
    ///
    /// The config is validated first; nothing is spawned when it is rejected.
    pub fn start_workflow(
        &self,
        brief: CampaignBrief,
        config: WorkflowConfig,
    ) -> CampaignResult<String> {
        config
            .validate()
            .map_err(|e| CampaignError::invalid_config(e.to_string()))?;
        let workflow_id = new_workflow_id();
        let (tx, rx) = watch::channel(WorkflowState::new(&workflow_id, &brief.id));
        let cancel = CancellationToken::new();

        let mut engine =
            WorkflowEngine::new(config, self.services.clone(), Arc::clone(&self.gateway))
                .with_events(Arc::clone(&self.events));
        if let Some(policy) = &self.policy {
            engine = engine.with_policy(Arc::clone(policy));
        }

        info!(workflow_id = %workflow_id, campaign_id = %brief.id, "Starting workflow");
        let task_id = workflow_id.clone();
        let task_cancel = cancel.clone();
        let handle =
            tokio::spawn(async move { engine.run(task_id, brief, &tx, task_cancel).await });

        self.registry.create(
            workflow_id.clone(),
            WorkflowEntry {
                cancel,
                state: rx,
                handle: Some(handle),
            },
        );
        Ok(workflow_id)
    }

    /// Latest snapshot of a workflow.
    pub fn get_state(&self, workflow_id: &str) -> CampaignResult<WorkflowState> {
        self.registry
            .get(workflow_id)
            .ok_or_else(|| CampaignError::workflow_not_found(workflow_id))
    }

    /// Request cancellation. The workflow task finishes asynchronously.
    pub fn cancel(&self, workflow_id: &str) -> CampaignResult<()> {
        let token = self
            .registry
            .cancel_token(workflow_id)
            .ok_or_else(|| CampaignError::workflow_not_found(workflow_id))?;
        info!(workflow_id, "Cancelling workflow");
        token.cancel();
        Ok(())
    }

    pub fn submit_human_decision(
        &self,
        request_id: &str,
        decision: HumanDecision,
        notes: Option<String>,
    ) -> CampaignResult<ResolveOutcome> {
        Ok(self
            .gateway
            .submit_human_decision(request_id, decision, notes)?)
    }

    pub fn submit_sponsor_decision(
        &self,
        request_id: &str,
        decision: SponsorDecision,
        notes: Option<String>,
    ) -> CampaignResult<ResolveOutcome> {
        Ok(self
            .gateway
            .submit_sponsor_decision(request_id, decision, notes)?)
    }

    /// Pending human-review and sponsor-approval requests, oldest first.
    pub fn pending_approvals(&self) -> (Vec<ApprovalRequest>, Vec<ApprovalRequest>) {
        (self.gateway.pending_human(), self.gateway.pending_sponsor())
    }

    /// Wait until the workflow reaches a terminal phase.
    pub async fn wait_for_completion(&self, workflow_id: &str) -> CampaignResult<WorkflowState> {
        let mut rx = self
            .registry
            .subscribe(workflow_id)
            .ok_or_else(|| CampaignError::workflow_not_found(workflow_id))?;
        let finished = rx
            .wait_for(|state| state.is_terminal())
            .await
            .map(|state| state.clone());
        Ok(match finished {
            Ok(state) => state,
            // Task gone; the last published snapshot is final.
            Err(_) => rx.borrow().clone(),
        })
    }

    /// Workflows that have not reached a terminal phase.
    pub fn active_workflows(&self) -> Vec<WorkflowState> {
        self.registry.active()
    }

    /// Drop a workflow from the registry, cancelling it if still running.
    pub fn remove(&self, workflow_id: &str) -> CampaignResult<WorkflowState> {
        let entry = self
            .registry
            .remove(workflow_id)
            .ok_or_else(|| CampaignError::workflow_not_found(workflow_id))?;
        let state = entry.snapshot();
        if !state.is_terminal() {
            entry.cancel.cancel();
        }
        Ok(state)
    }

    /// Cancel everything and wait for the workflow tasks to finish.
    pub async fn shutdown(&self) -> Vec<WorkflowState> {
        self.registry.cancel_all();
        let handles = self.registry.take_all_handles();
        let (ids, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        let mut finished = Vec::with_capacity(results.len());
        for (workflow_id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(state) => finished.push(state),
                Err(e) => warn!(%workflow_id, error = %e, "Workflow task did not finish cleanly"),
            }
        }

        self.sweeper_cancel.cancel();
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.await;
        }
        info!(workflows = finished.len(), "Workflow service shut down");
        finished
    }
}
