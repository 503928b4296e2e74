//! In-process collaborators for dry runs.
//!
//! Every engine seam gets a deterministic implementation driven by the
//! fixture: discovery returns the fixture's creators, calls and follow-ups
//! answer from per-creator scripts (or from the creator's availability
//! when unscripted), and an [`AutoApprover`] answers the approval gateway
//! by rule so no human has to be present.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use campaign_orchestration::{
    ApprovalDecision, ApprovalKind, ApprovalNotifier, ApprovalRequest, Availability, CallError,
    CallHandle, CallOutcome, CallResult, CallService, CampaignBrief, CampaignContext, Candidate,
    ConfirmationRequest, ContactMethod, ContactWindow, ContractService, DiscoveryService,
    FollowUpRequest, FollowUpResult, HumanDecision, NegotiationRecord, OutreachService,
    PersistenceService, PricingStrategy, ServiceError, SharedApprovalGateway, SponsorDecision,
    WorkflowState,
};
use tracing::{debug, info};

use crate::config::ApprovalRules;
use crate::fixtures::CandidateScript;

type Scripts = Arc<HashMap<String, CandidateScript>>;

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Discovery over a fixed creator list.
pub struct SimulatedDiscovery {
    candidates: Vec<Candidate>,
}

impl SimulatedDiscovery {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl DiscoveryService for SimulatedDiscovery {
    async fn discover(&self, brief: &CampaignBrief) -> Result<Vec<Candidate>, ServiceError> {
        let found: Vec<Candidate> = self
            .candidates
            .iter()
            .filter(|c| c.niche.is_empty() || c.niche.eq_ignore_ascii_case(&brief.niche))
            .cloned()
            .collect();
        debug!(niche = %brief.niche, found = found.len(), "Simulated discovery");
        Ok(found)
    }
}

/// Call provider that answers from scripts or creator availability.
pub struct ScriptedCallService {
    scripts: Scripts,
    latency: Duration,
    in_flight: Mutex<HashMap<String, (Candidate, PricingStrategy)>>,
    placed: AtomicUsize,
}

impl ScriptedCallService {
    fn new(scripts: Scripts, latency: Duration) -> Self {
        Self {
            scripts,
            latency,
            in_flight: Mutex::new(HashMap::new()),
            placed: AtomicUsize::new(0),
        }
    }

    /// Calls placed so far.
    pub fn placed(&self) -> usize {
        self.placed.load(Ordering::SeqCst)
    }

    /// Outcome for an unscripted creator.
    fn by_availability(call_id: &str, candidate: &Candidate, pricing: &PricingStrategy) -> CallResult {
        match candidate.availability {
            Availability::Excellent => {
                let mut result = CallResult::new(call_id, CallOutcome::Accepted, 0.92)
                    .with_rate(pricing.initial_offer)
                    .with_deliverables(["1 dedicated video", "2 stories"]);
                result.enthusiasm = 8;
                result.timeline = Some("2 weeks".into());
                result
            }
            Availability::Good => {
                let midpoint = (pricing.initial_offer + pricing.max_offer) / 2.0;
                CallResult::new(call_id, CallOutcome::Accepted, 0.8)
                    .with_rate(midpoint)
                    .with_deliverables(["1 dedicated video"])
                    .with_objections(["wants usage rights capped at 90 days"])
            }
            Availability::Limited => CallResult::new(call_id, CallOutcome::NeedsFollowUp, 0.7)
                .with_contact(ContactMethod::Email, ContactWindow::BusinessHours),
            Availability::Busy => CallResult::new(call_id, CallOutcome::Declined, 0.9)
                .with_objections(["fully booked this quarter"]),
        }
    }
}

#[async_trait]
impl CallService for ScriptedCallService {
    async fn initiate(
        &self,
        candidate: &Candidate,
        _campaign: &CampaignContext,
        pricing: &PricingStrategy,
    ) -> Result<CallHandle, CallError> {
        if let Some(message) = self
            .scripts
            .get(&candidate.id)
            .and_then(|s| s.call_error.as_ref())
        {
            return Err(CallError::Failed(message.clone()));
        }
        let n = self.placed.fetch_add(1, Ordering::SeqCst) + 1;
        let call_id = format!("sim-call-{n:03}");
        locked(&self.in_flight).insert(call_id.clone(), (candidate.clone(), *pricing));
        Ok(CallHandle {
            call_id,
            candidate_id: candidate.id.clone(),
        })
    }

    async fn await_completion(
        &self,
        handle: &CallHandle,
        _timeout: Duration,
    ) -> Result<CallResult, CallError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let Some((candidate, pricing)) = locked(&self.in_flight).remove(&handle.call_id) else {
            return Err(CallError::Failed(format!("unknown call {}", handle.call_id)));
        };
        let result = match self.scripts.get(&candidate.id).and_then(|s| s.call.clone()) {
            Some(scripted) => scripted,
            None => Self::by_availability(&handle.call_id, &candidate, &pricing),
        };
        debug!(
            call_id = %handle.call_id,
            candidate = %candidate.name,
            outcome = %result.outcome,
            "Simulated call finished"
        );
        Ok(result)
    }
}

/// Follow-up and confirmation messaging.
pub struct ScriptedOutreach {
    scripts: Scripts,
    attempts: Mutex<HashMap<String, usize>>,
    confirmed: Mutex<Vec<String>>,
}

impl ScriptedOutreach {
    fn new(scripts: Scripts) -> Self {
        Self {
            scripts,
            attempts: Mutex::new(HashMap::new()),
            confirmed: Mutex::new(Vec::new()),
        }
    }

    /// Candidate ids that received a confirmation.
    pub fn confirmed(&self) -> Vec<String> {
        locked(&self.confirmed).clone()
    }
}

#[async_trait]
impl OutreachService for ScriptedOutreach {
    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResult, ServiceError> {
        let candidate_id = &request.candidate.id;
        let index = {
            let mut attempts = locked(&self.attempts);
            let seen = attempts.entry(candidate_id.clone()).or_insert(0);
            *seen += 1;
            *seen - 1
        };

        let scripted = self
            .scripts
            .get(candidate_id)
            .filter(|s| !s.follow_ups.is_empty())
            .map(|s| s.follow_ups[index.min(s.follow_ups.len() - 1)].clone());

        Ok(scripted.unwrap_or_else(|| {
            let rate = request.candidate.estimated_rate.min(request.max_offer);
            let mut result = FollowUpResult::new(CallOutcome::Accepted).with_rate(rate);
            result.notes = Some(format!("agreed over {}", request.channel));
            result
        }))
    }

    async fn confirm(&self, request: &ConfirmationRequest) -> Result<(), ServiceError> {
        let rejects = self
            .scripts
            .get(&request.candidate.id)
            .is_some_and(|s| s.reject_confirmation);
        if rejects {
            return Err(ServiceError::Rejected(format!(
                "{} did not confirm final terms",
                request.candidate.name
            )));
        }
        locked(&self.confirmed).push(request.candidate.id.clone());
        Ok(())
    }
}

/// Contract store that numbers contracts sequentially.
#[derive(Default)]
pub struct InMemoryContracts {
    generated: Mutex<Vec<String>>,
    dispatched: Mutex<Vec<String>>,
}

impl InMemoryContracts {
    pub fn generated(&self) -> Vec<String> {
        locked(&self.generated).clone()
    }

    pub fn dispatched(&self) -> Vec<String> {
        locked(&self.dispatched).clone()
    }
}

#[async_trait]
impl ContractService for InMemoryContracts {
    async fn generate(
        &self,
        record: &NegotiationRecord,
        brief: &CampaignBrief,
    ) -> Result<String, ServiceError> {
        let mut generated = locked(&self.generated);
        let contract_id = format!("{}-{:03}-{}", brief.id, generated.len() + 1, record.candidate_id);
        generated.push(contract_id.clone());
        Ok(contract_id)
    }

    async fn dispatch(&self, contract_id: &str) -> Result<(), ServiceError> {
        locked(&self.dispatched).push(contract_id.to_string());
        Ok(())
    }
}

/// Keeps every persisted record and the latest workflow snapshot.
#[derive(Default)]
pub struct InMemoryPersistence {
    negotiations: Mutex<Vec<NegotiationRecord>>,
    latest: Mutex<Option<WorkflowState>>,
}

impl InMemoryPersistence {
    pub fn negotiations(&self) -> Vec<NegotiationRecord> {
        locked(&self.negotiations).clone()
    }

    pub fn latest_state(&self) -> Option<WorkflowState> {
        locked(&self.latest).clone()
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn record_negotiation(
        &self,
        _workflow_id: &str,
        record: &NegotiationRecord,
    ) -> Result<(), ServiceError> {
        locked(&self.negotiations).push(record.clone());
        Ok(())
    }

    async fn record_campaign_state(&self, state: &WorkflowState) -> Result<(), ServiceError> {
        *locked(&self.latest) = Some(state.clone());
        Ok(())
    }
}

/// Notifier that answers approval requests itself, by rule.
pub struct AutoApprover {
    gateway: SharedApprovalGateway,
    rules: ApprovalRules,
    decisions: Mutex<Vec<(String, ApprovalDecision)>>,
}

impl AutoApprover {
    pub fn new(gateway: SharedApprovalGateway, rules: ApprovalRules) -> Self {
        Self {
            gateway,
            rules,
            decisions: Mutex::new(Vec::new()),
        }
    }

    /// Decisions submitted so far, as `(request_id, decision)`.
    pub fn decisions(&self) -> Vec<(String, ApprovalDecision)> {
        locked(&self.decisions).clone()
    }

    /// What the rules say for `request`.
    pub fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision {
        match request.kind {
            ApprovalKind::HumanReview => {
                let too_expensive = self
                    .rules
                    .human_reject_above
                    .is_some_and(|limit| request.proposed_rate > limit);
                if too_expensive {
                    HumanDecision::Reject.into()
                } else {
                    self.rules.human_decision.into()
                }
            }
            ApprovalKind::SponsorApproval => match self.rules.sponsor_rate_ceiling {
                Some(ceiling) if request.proposed_rate > ceiling => SponsorDecision::Rejected.into(),
                _ => SponsorDecision::Approved.into(),
            },
        }
    }

    fn answer(&self, request: &ApprovalRequest) -> Result<(), ServiceError> {
        if self.rules.leave_pending {
            info!(request = %request.summary_line(), "Leaving approval pending");
            return Ok(());
        }
        let decision = self.decide(request);
        self.gateway
            .resolve(&request.id, decision, Some("auto-approver".into()))
            .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        info!(request = %request.summary_line(), ?decision, "Auto-approver decided");
        locked(&self.decisions).push((request.id.clone(), decision));
        Ok(())
    }
}

#[async_trait]
impl ApprovalNotifier for AutoApprover {
    async fn notify_human_review(&self, request: &ApprovalRequest) -> Result<(), ServiceError> {
        self.answer(request)
    }

    async fn notify_sponsor_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<(), ServiceError> {
        self.answer(request)
    }
}

/// The scripted collaborators for one fixture, kept around for inspection.
pub struct SimulatedCollaborators {
    pub discovery: Arc<SimulatedDiscovery>,
    pub calls: Arc<ScriptedCallService>,
    pub outreach: Arc<ScriptedOutreach>,
    pub contracts: Arc<InMemoryContracts>,
    pub persistence: Arc<InMemoryPersistence>,
}

impl SimulatedCollaborators {
    pub fn new(
        candidates: Vec<Candidate>,
        scripts: HashMap<String, CandidateScript>,
        call_latency: Duration,
    ) -> Self {
        let scripts: Scripts = Arc::new(scripts);
        Self {
            discovery: Arc::new(SimulatedDiscovery::new(candidates)),
            calls: Arc::new(ScriptedCallService::new(Arc::clone(&scripts), call_latency)),
            outreach: Arc::new(ScriptedOutreach::new(scripts)),
            contracts: Arc::new(InMemoryContracts::default()),
            persistence: Arc::new(InMemoryPersistence::default()),
        }
    }
}
