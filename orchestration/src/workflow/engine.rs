//! Workflow engine: runs one campaign from brief to monitoring.
//!
//! The engine owns the `WorkflowState` for the duration of a run and pushes
//! a snapshot through the watch channel after every observable change.
//! Negotiations run strictly one at a time.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::phase::WorkflowPhase;
use super::policy::{PolicyDecision, ProgressPolicy, ProgressSnapshot, ThresholdPolicy};
use super::state::{ContractRecord, WorkflowState};
use crate::approval::SharedApprovalGateway;
use crate::config::WorkflowConfig;
use crate::error::{CampaignError, CampaignResult};
use crate::events::{SharedEventBus, WorkflowEvent};
use crate::models::{CampaignBrief, Candidate};
use crate::negotiation::{FailureReason, NegotiationContext, NegotiationStateMachine};
use crate::pool::CandidatePoolSelector;
use crate::services::{CampaignContext, CampaignServices};

/// Generate a new workflow id.
pub fn new_workflow_id() -> String {
    format!("wf-{}", uuid::Uuid::new_v4())
}

/// Runs campaign workflows against one set of collaborators.
#[derive(Clone)]
pub struct WorkflowEngine {
    config: WorkflowConfig,
    services: CampaignServices,
    gateway: SharedApprovalGateway,
    policy: Arc<dyn ProgressPolicy>,
    events: Option<SharedEventBus>,
}

impl WorkflowEngine {
    pub fn new(
        config: WorkflowConfig,
        services: CampaignServices,
        gateway: SharedApprovalGateway,
    ) -> Self {
        let policy = Arc::new(ThresholdPolicy::new(config.policy.clone()));
        Self {
            config,
            services,
            gateway,
            policy,
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ProgressPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, events: SharedEventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn gateway(&self) -> &SharedApprovalGateway {
        &self.gateway
    }

    /// Run without an external observer and return the final state.
    pub async fn execute(&self, brief: CampaignBrief, cancel: CancellationToken) -> WorkflowState {
        let workflow_id = new_workflow_id();
        let (tx, _rx) = watch::channel(WorkflowState::new(&workflow_id, &brief.id));
        self.run(workflow_id, brief, &tx, cancel).await
    }

    /// Run a workflow to a terminal phase, publishing snapshots on `tx`.
    pub async fn run(
        &self,
        workflow_id: String,
        brief: CampaignBrief,
        tx: &watch::Sender<WorkflowState>,
        cancel: CancellationToken,
    ) -> WorkflowState {
        info!(
            workflow_id = %workflow_id,
            campaign_id = %brief.id,
            budget = brief.total_budget,
            strategy = %self.config.strategy,
            "Workflow started"
        );
        let mut run = WorkflowRun {
            engine: self,
            state: WorkflowState::new(&workflow_id, &brief.id),
            brief: Arc::new(brief),
            tx,
            cancel,
        };

        if let Err(error) = run.execute().await {
            run.abort(error).await;
        }
        run.finish();
        run.state
    }
}

/// State for one in-flight run.
struct WorkflowRun<'a> {
    engine: &'a WorkflowEngine,
    state: WorkflowState,
    brief: Arc<CampaignBrief>,
    tx: &'a watch::Sender<WorkflowState>,
    cancel: CancellationToken,
}

impl WorkflowRun<'_> {
    fn workflow_id(&self) -> &str {
        &self.state.workflow_id
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Some(bus) = &self.engine.events {
            bus.publish(event);
        }
    }

    fn emit(&self) {
        self.tx.send_replace(self.state.clone());
    }

    fn check_cancelled(&self) -> CampaignResult<()> {
        if self.cancel.is_cancelled() {
            Err(CampaignError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn enter(&mut self, phase: WorkflowPhase) -> CampaignResult<()> {
        self.check_cancelled()?;
        self.state.enter_phase(phase);
        info!(
            workflow_id = %self.state.workflow_id,
            phase = %phase,
            progress = self.state.progress,
            "Workflow phase entered"
        );
        self.publish(WorkflowEvent::PhaseEntered {
            workflow_id: self.state.workflow_id.clone(),
            phase,
            progress: self.state.progress,
            timestamp: Utc::now(),
        });
        self.emit();
        Ok(())
    }

    fn advance(&mut self, fraction: f64) {
        let progress = self.state.phase.progress_at(fraction);
        self.state.set_progress(progress);
        self.emit();
    }

    fn warn(&mut self, message: String) {
        warn!(workflow_id = %self.state.workflow_id, "{}", message);
        self.state.warn(message);
    }

    async fn execute(&mut self) -> CampaignResult<()> {
        self.data_collection()?;
        self.validation()?;
        let candidates = self.discovery().await?;
        self.selection(candidates)?;
        self.negotiation_sequence().await?;
        self.approvals()?;
        self.contract_generation().await?;
        self.contract_delivery().await?;
        self.monitoring().await?;
        self.enter(WorkflowPhase::Completed)
    }

    // ── Phases ───────────────────────────────────────────────────────────

    fn data_collection(&mut self) -> CampaignResult<()> {
        self.enter(WorkflowPhase::DataCollection)?;
        debug!(
            workflow_id = %self.state.workflow_id,
            brand = %self.brief.brand_name,
            product = %self.brief.product_name,
            niche = %self.brief.niche,
            "Campaign data collected"
        );
        self.advance(1.0);
        Ok(())
    }

    fn validation(&mut self) -> CampaignResult<()> {
        self.enter(WorkflowPhase::Validation)?;
        let warnings = self.brief.validate(self.engine.config.min_budget)?;
        for warning in warnings {
            self.warn(warning);
        }
        self.advance(1.0);
        Ok(())
    }

    async fn discovery(&mut self) -> CampaignResult<Vec<Candidate>> {
        self.enter(WorkflowPhase::Discovery)?;
        let discovered = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(CampaignError::Cancelled),
            res = self.engine.services.discovery.discover(&self.brief) => res,
        };
        let candidates = match discovered {
            Ok(candidates) => candidates,
            Err(e) => {
                self.warn(format!("discovery failed: {e}"));
                Vec::new()
            }
        };
        if candidates.is_empty() {
            return Err(CampaignError::DiscoveryEmpty {
                campaign_id: self.brief.id.clone(),
            });
        }
        info!(
            workflow_id = %self.state.workflow_id,
            count = candidates.len(),
            "Candidates discovered"
        );
        self.advance(1.0);
        Ok(candidates)
    }

    fn selection(&mut self, candidates: Vec<Candidate>) -> CampaignResult<()> {
        self.enter(WorkflowPhase::Selection)?;
        let selection = CandidatePoolSelector::new(self.engine.config.strategy)
            .with_max_candidates(self.engine.config.max_candidates)
            .select(candidates, self.brief.total_budget);

        if selection.pool.primary.is_empty() {
            return Err(CampaignError::budget_infeasible(
                self.brief.total_budget,
                "no discovered candidate fits the per-creator budget",
            ));
        }
        if !selection.pool.is_disjoint() {
            return Err(CampaignError::invariant(
                "candidate pool tiers overlap after selection",
            ));
        }
        for warning in &selection.pool.warnings {
            self.state.warn(warning.clone());
        }
        info!(
            workflow_id = %self.state.workflow_id,
            primary = selection.pool.primary.len(),
            reserve = selection.pool.reserve.len(),
            backup = selection.pool.backup.len(),
            optimal_count = selection.optimal_count,
            "Candidate pool ready"
        );
        self.state.allocation = Some(selection.allocation);
        self.state.pool = selection.pool;
        self.advance(1.0);
        Ok(())
    }

    async fn negotiation_sequence(&mut self) -> CampaignResult<()> {
        self.enter(WorkflowPhase::NegotiationSequence)?;
        let config = &self.engine.config;
        let mut machine = NegotiationStateMachine::new(
            config.negotiation.clone(),
            &self.engine.services,
            Arc::clone(&self.engine.gateway),
        );
        if let Some(bus) = &self.engine.events {
            machine = machine.with_events(Arc::clone(bus));
        }

        let target = self.brief.desired_creator_count;
        let total_budget = self.brief.total_budget;
        let pool_size = self.state.pool.len().max(1);
        let evaluate_every = config.policy.evaluate_every.max(1);
        let mut max_offer_multiplier = config.negotiation.max_offer_multiplier;

        loop {
            self.check_cancelled()?;
            if self.state.successful_negotiations >= target {
                break;
            }
            let remaining = (total_budget - self.state.total_cost).max(0.0);
            let Some((tier, candidate)) = self.state.pool.next_to_contact(remaining) else {
                debug!(workflow_id = %self.state.workflow_id, remaining, "No affordable candidates left");
                break;
            };
            self.state.current_activity = format!("negotiating with {}", candidate.name);
            self.emit();

            let ctx = NegotiationContext {
                workflow_id: self.state.workflow_id.clone(),
                campaign: CampaignContext::from_brief(&self.state.workflow_id, &self.brief),
                max_offer_multiplier,
                remaining_budget: remaining,
                cancel: self.cancel.clone(),
            };
            let record = machine.run(&candidate, tier, &ctx).await;

            if let Err(e) = self
                .engine
                .services
                .persistence
                .record_negotiation(&self.state.workflow_id, &record)
                .await
            {
                warn!(negotiation_id = %record.id, error = %e, "Failed to persist negotiation");
            }
            let cancelled = record.failure_reason == Some(FailureReason::Cancelled);
            let broken = match &record.failure_reason {
                Some(FailureReason::OverBudget { rate, .. }) => {
                    self.warn(format!(
                        "{} agreed {rate:.2}, more than the {remaining:.2} left in the budget",
                        record.candidate_name
                    ));
                    None
                }
                Some(FailureReason::InvalidTransition(detail)) => Some(format!(
                    "negotiation {} broke the phase graph: {detail}",
                    record.id
                )),
                _ => None,
            };
            self.state.record_negotiation(record);
            if let Some(message) = broken {
                return Err(CampaignError::invariant(message));
            }
            if self.state.total_cost > total_budget + 1e-6 {
                return Err(CampaignError::invariant(format!(
                    "committed cost {:.2} exceeds budget {total_budget:.2}",
                    self.state.total_cost
                )));
            }

            let by_success = self.state.successful_negotiations as f64 / target.max(1) as f64;
            let by_contact = self.state.pool.contacted.len() as f64 / pool_size as f64;
            self.advance(by_success.max(by_contact));

            if cancelled {
                return Err(CampaignError::Cancelled);
            }

            let attempts = self.state.attempts();
            if attempts % evaluate_every == 0 {
                let snapshot = ProgressSnapshot::new(
                    attempts,
                    self.state.successful_negotiations,
                    self.state.total_cost,
                    total_budget,
                    target,
                    max_offer_multiplier,
                );
                let decision = self.engine.policy.evaluate(&snapshot);
                info!(
                    workflow_id = %self.state.workflow_id,
                    attempts,
                    success_rate = snapshot.success_rate,
                    decision = %decision,
                    "Progress policy evaluated"
                );
                self.publish(WorkflowEvent::PolicyEvaluated {
                    workflow_id: self.state.workflow_id.clone(),
                    decision: decision.clone(),
                    timestamp: Utc::now(),
                });
                match decision {
                    PolicyDecision::Continue => {}
                    PolicyDecision::AdjustApproach {
                        max_offer_multiplier: adjusted,
                        ..
                    } => max_offer_multiplier = adjusted,
                    PolicyDecision::StopEarly { .. } => break,
                }
            }
        }

        if self.state.successful_negotiations < target {
            let message = format!(
                "confirmed {} of {} desired creators",
                self.state.successful_negotiations, target
            );
            self.warn(message);
        }
        self.advance(1.0);
        Ok(())
    }

    fn approvals(&mut self) -> CampaignResult<()> {
        self.enter(WorkflowPhase::Approvals)?;
        let stragglers = self.engine.gateway.withdraw_workflow(self.workflow_id());
        if stragglers > 0 {
            self.warn(format!("withdrew {stragglers} unresolved approval request(s)"));
        }
        let status = self.state.pool.status();
        info!(
            workflow_id = %self.state.workflow_id,
            confirmed = status.confirmed,
            declined = status.declined,
            success_rate = status.success_rate,
            "Approvals reconciled"
        );
        self.advance(1.0);
        Ok(())
    }

    async fn contract_generation(&mut self) -> CampaignResult<()> {
        self.enter(WorkflowPhase::ContractGeneration)?;
        let contracts = Arc::clone(&self.engine.services.contracts);
        let successful: Vec<_> = self
            .state
            .negotiations
            .iter()
            .filter(|r| r.is_successful())
            .cloned()
            .collect();

        for record in successful {
            self.check_cancelled()?;
            match contracts.generate(&record, &self.brief).await {
                Ok(contract_id) => {
                    debug!(%contract_id, negotiation_id = %record.id, "Contract generated");
                    self.state.contracts.push(ContractRecord {
                        contract_id,
                        negotiation_id: record.id.clone(),
                        candidate_id: record.candidate_id.clone(),
                        rate: record.agreed_rate(),
                        dispatched: false,
                        generated_at: Utc::now(),
                    });
                }
                Err(e) => self.warn(format!(
                    "contract generation failed for {}: {e}",
                    record.candidate_name
                )),
            }
        }
        self.advance(1.0);
        Ok(())
    }

    async fn contract_delivery(&mut self) -> CampaignResult<()> {
        self.enter(WorkflowPhase::ContractDelivery)?;
        if !self.engine.config.auto_dispatch_contracts {
            debug!(workflow_id = %self.state.workflow_id, "Contract auto-dispatch disabled");
            self.advance(1.0);
            return Ok(());
        }

        let contracts = Arc::clone(&self.engine.services.contracts);
        for i in 0..self.state.contracts.len() {
            self.check_cancelled()?;
            let contract_id = self.state.contracts[i].contract_id.clone();
            match contracts.dispatch(&contract_id).await {
                Ok(()) => self.state.contracts[i].dispatched = true,
                Err(e) => self.warn(format!("contract dispatch failed for {contract_id}: {e}")),
            }
        }
        self.advance(1.0);
        Ok(())
    }

    async fn monitoring(&mut self) -> CampaignResult<()> {
        self.enter(WorkflowPhase::Monitoring)?;
        self.persist_state().await;
        self.advance(1.0);
        Ok(())
    }

    async fn persist_state(&self) {
        if let Err(e) = self
            .engine
            .services
            .persistence
            .record_campaign_state(&self.state)
            .await
        {
            warn!(workflow_id = %self.state.workflow_id, error = %e, "Failed to persist campaign state");
        }
    }

    // ── Termination ──────────────────────────────────────────────────────

    async fn abort(&mut self, error: CampaignError) {
        if error == CampaignError::Cancelled {
            let withdrawn = self.engine.gateway.withdraw_workflow(self.workflow_id());
            debug!(workflow_id = %self.state.workflow_id, withdrawn, "Cancelled workflow approvals withdrawn");
        }
        warn!(
            workflow_id = %self.state.workflow_id,
            phase = %self.state.phase,
            code = error.code(),
            %error,
            "Workflow failed"
        );
        self.state.fail(error);
        self.persist_state().await;
    }

    fn finish(&self) {
        info!(
            workflow_id = %self.state.workflow_id,
            summary = %self.state.summary_line(),
            "Workflow finished"
        );
        self.publish(WorkflowEvent::WorkflowFinished {
            workflow_id: self.state.workflow_id.clone(),
            phase: self.state.phase,
            progress: self.state.progress,
            timestamp: Utc::now(),
        });
        self.emit();
    }
}
