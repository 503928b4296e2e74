//! Hand-written collaborator doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use campaign_orchestration::approval::ApprovalGateway;
use campaign_orchestration::events::EventBus;
use campaign_orchestration::{
    ApprovalKind, ApprovalNotifier, ApprovalRequest, CallError, CallHandle, CallOutcome,
    CallResult, CallService, CampaignBrief, CampaignContext, CampaignServices, Candidate,
    ConfirmationRequest, ContractService, DiscoveryService, FollowUpRequest, FollowUpResult,
    HumanDecision, NegotiationRecord, OutreachService, PersistenceService, PricingStrategy,
    ServiceError, SharedApprovalGateway, SharedEventBus, SponsorDecision, WorkflowConfig,
    WorkflowState,
};

// ── Fixtures ─────────────────────────────────────────────────────────

pub fn candidate(id: &str, rate: f64) -> Candidate {
    Candidate::new(id, format!("Creator {id}"), 50_000, 3.0, rate).with_similarity(0.8)
}

pub fn brief(budget: f64) -> CampaignBrief {
    CampaignBrief::new("camp-1", "Acme", "Trail Shoe", "outdoor", budget)
        .with_description("Lightweight trail running shoe with recycled upper and grippy sole")
        .with_target_audience("Trail runners aged 25-40 in North America")
        .with_desired_creator_count(3)
}

pub fn accepted(rate: f64) -> CallResult {
    CallResult::new("conv", CallOutcome::Accepted, 0.9)
        .with_rate(rate)
        .with_deliverables(["1 video", "2 stories"])
}

/// Config with second-scale timeouts.
pub fn fast_config() -> WorkflowConfig {
    let mut config = WorkflowConfig::default();
    config.negotiation.call_timeout_secs = 1.0;
    config.negotiation.human_review_timeout_secs = 1.0;
    config.negotiation.sponsor_approval_timeout_secs = 1.0;
    config
}

// ── Discovery ────────────────────────────────────────────────────────

pub struct StaticDiscovery {
    pub candidates: Vec<Candidate>,
}

#[async_trait]
impl DiscoveryService for StaticDiscovery {
    async fn discover(&self, _brief: &CampaignBrief) -> Result<Vec<Candidate>, ServiceError> {
        Ok(self.candidates.clone())
    }
}

// ── Calls ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum CallScript {
    Respond(CallResult),
    Fail(String),
    /// Never completes.
    Hang,
}

pub struct ScriptedCalls {
    scripts: HashMap<String, CallScript>,
    default: CallScript,
    /// (candidate id, pricing) per initiated call.
    pub log: Mutex<Vec<(String, PricingStrategy)>>,
}

impl ScriptedCalls {
    pub fn new(default: CallScript) -> Self {
        Self {
            scripts: HashMap::new(),
            default,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn script(mut self, candidate_id: &str, script: CallScript) -> Self {
        self.scripts.insert(candidate_id.to_string(), script);
        self
    }

    pub fn called(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }

    fn script_for(&self, candidate_id: &str) -> CallScript {
        self.scripts
            .get(candidate_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl CallService for ScriptedCalls {
    async fn initiate(
        &self,
        candidate: &Candidate,
        _campaign: &CampaignContext,
        pricing: &PricingStrategy,
    ) -> Result<CallHandle, CallError> {
        self.log
            .lock()
            .unwrap()
            .push((candidate.id.clone(), *pricing));
        if let CallScript::Fail(message) = self.script_for(&candidate.id) {
            return Err(CallError::Failed(message));
        }
        Ok(CallHandle {
            call_id: format!("call-{}", candidate.id),
            candidate_id: candidate.id.clone(),
        })
    }

    async fn await_completion(
        &self,
        handle: &CallHandle,
        _timeout: Duration,
    ) -> Result<CallResult, CallError> {
        match self.script_for(&handle.candidate_id) {
            CallScript::Respond(result) => Ok(result),
            CallScript::Fail(message) => Err(CallError::Failed(message)),
            CallScript::Hang => std::future::pending().await,
        }
    }
}

// ── Outreach ─────────────────────────────────────────────────────────

pub struct ScriptedOutreach {
    follow_ups: Mutex<HashMap<String, VecDeque<FollowUpResult>>>,
    default: FollowUpResult,
    pub fail_confirm: bool,
    pub requests: Mutex<Vec<FollowUpRequest>>,
    pub confirmations: Mutex<Vec<ConfirmationRequest>>,
}

impl ScriptedOutreach {
    pub fn new(default: FollowUpResult) -> Self {
        Self {
            follow_ups: Mutex::new(HashMap::new()),
            default,
            fail_confirm: false,
            requests: Mutex::new(Vec::new()),
            confirmations: Mutex::new(Vec::new()),
        }
    }

    pub fn script(self, candidate_id: &str, results: Vec<FollowUpResult>) -> Self {
        self.follow_ups
            .lock()
            .unwrap()
            .insert(candidate_id.to_string(), results.into());
        self
    }
}

impl Default for ScriptedOutreach {
    fn default() -> Self {
        Self::new(FollowUpResult::new(CallOutcome::NeedsFollowUp))
    }
}

#[async_trait]
impl OutreachService for ScriptedOutreach {
    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResult, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = self
            .follow_ups
            .lock()
            .unwrap()
            .get_mut(&request.candidate.id)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| self.default.clone()))
    }

    async fn confirm(&self, request: &ConfirmationRequest) -> Result<(), ServiceError> {
        if self.fail_confirm {
            return Err(ServiceError::Unavailable("mailer down".into()));
        }
        self.confirmations.lock().unwrap().push(request.clone());
        Ok(())
    }
}

// ── Approvals ────────────────────────────────────────────────────────

/// Answers approval requests by rule, straight from the notification.
/// `None` leaves the request unanswered.
pub struct ScriptedApprover {
    gateway: SharedApprovalGateway,
    pub human: Option<HumanDecision>,
    pub sponsor: Option<SponsorDecision>,
    pub seen: Mutex<Vec<ApprovalRequest>>,
}

impl ScriptedApprover {
    pub fn new(
        gateway: SharedApprovalGateway,
        human: Option<HumanDecision>,
        sponsor: Option<SponsorDecision>,
    ) -> Self {
        Self {
            gateway,
            human,
            sponsor,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn kinds(&self) -> Vec<ApprovalKind> {
        self.seen.lock().unwrap().iter().map(|r| r.kind).collect()
    }
}

#[async_trait]
impl ApprovalNotifier for ScriptedApprover {
    async fn notify_human_review(&self, request: &ApprovalRequest) -> Result<(), ServiceError> {
        self.seen.lock().unwrap().push(request.clone());
        if let Some(decision) = self.human {
            self.gateway
                .submit_human_decision(&request.id, decision, Some("scripted".into()))
                .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        }
        Ok(())
    }

    async fn notify_sponsor_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<(), ServiceError> {
        self.seen.lock().unwrap().push(request.clone());
        if let Some(decision) = self.sponsor {
            self.gateway
                .submit_sponsor_decision(&request.id, decision, None)
                .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        }
        Ok(())
    }
}

// ── Contracts and persistence ────────────────────────────────────────

#[derive(Default)]
pub struct RecordingContracts {
    pub fail_generate: bool,
    pub generated: Mutex<Vec<String>>,
    pub dispatched: Mutex<Vec<String>>,
}

#[async_trait]
impl ContractService for RecordingContracts {
    async fn generate(
        &self,
        record: &NegotiationRecord,
        _brief: &CampaignBrief,
    ) -> Result<String, ServiceError> {
        if self.fail_generate {
            return Err(ServiceError::Unavailable("template engine offline".into()));
        }
        let id = format!("contract-{}", record.candidate_id);
        self.generated.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn dispatch(&self, contract_id: &str) -> Result<(), ServiceError> {
        self.dispatched.lock().unwrap().push(contract_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPersistence {
    pub negotiations: Mutex<Vec<String>>,
    pub states: Mutex<Vec<WorkflowState>>,
}

#[async_trait]
impl PersistenceService for RecordingPersistence {
    async fn record_negotiation(
        &self,
        _workflow_id: &str,
        record: &NegotiationRecord,
    ) -> Result<(), ServiceError> {
        self.negotiations.lock().unwrap().push(record.id.clone());
        Ok(())
    }

    async fn record_campaign_state(&self, state: &WorkflowState) -> Result<(), ServiceError> {
        self.states.lock().unwrap().push(state.clone());
        Ok(())
    }
}

// ── Harness ──────────────────────────────────────────────────────────

/// One gateway plus a full set of doubles wired to it.
pub struct Harness {
    pub events: SharedEventBus,
    pub gateway: SharedApprovalGateway,
    pub discovery: Arc<StaticDiscovery>,
    pub calls: Arc<ScriptedCalls>,
    pub outreach: Arc<ScriptedOutreach>,
    pub approver: Arc<ScriptedApprover>,
    pub contracts: Arc<RecordingContracts>,
    pub persistence: Arc<RecordingPersistence>,
}

pub struct HarnessBuilder {
    candidates: Vec<Candidate>,
    calls: ScriptedCalls,
    outreach: ScriptedOutreach,
    human: Option<HumanDecision>,
    sponsor: Option<SponsorDecision>,
    contracts: RecordingContracts,
}

impl HarnessBuilder {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            calls: ScriptedCalls::new(CallScript::Respond(accepted(2_000.0))),
            outreach: ScriptedOutreach::default(),
            human: Some(HumanDecision::Approve),
            sponsor: Some(SponsorDecision::Approved),
            contracts: RecordingContracts::default(),
        }
    }

    pub fn calls(mut self, calls: ScriptedCalls) -> Self {
        self.calls = calls;
        self
    }

    pub fn outreach(mut self, outreach: ScriptedOutreach) -> Self {
        self.outreach = outreach;
        self
    }

    pub fn human(mut self, decision: Option<HumanDecision>) -> Self {
        self.human = decision;
        self
    }

    pub fn sponsor(mut self, decision: Option<SponsorDecision>) -> Self {
        self.sponsor = decision;
        self
    }

    pub fn contracts(mut self, contracts: RecordingContracts) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn build(self) -> Harness {
        let events = EventBus::new().shared();
        let gateway = ApprovalGateway::with_events(Arc::clone(&events)).shared();
        let approver = ScriptedApprover::new(Arc::clone(&gateway), self.human, self.sponsor);
        Harness {
            events,
            discovery: Arc::new(StaticDiscovery {
                candidates: self.candidates,
            }),
            calls: Arc::new(self.calls),
            outreach: Arc::new(self.outreach),
            approver: Arc::new(approver),
            contracts: Arc::new(self.contracts),
            persistence: Arc::new(RecordingPersistence::default()),
            gateway,
        }
    }
}

impl Harness {
    pub fn services(&self) -> CampaignServices {
        CampaignServices::new(
            self.discovery.clone(),
            self.calls.clone(),
            self.outreach.clone(),
            self.contracts.clone(),
        )
        .with_notifier(self.approver.clone())
        .with_persistence(self.persistence.clone())
    }
}

/// Poll `check` every few milliseconds until it holds, up to two seconds.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
