//! External collaborator seams
//!
//! Everything the engine does not own (creator search, the voice/chat call
//! provider, notification transport, contract rendering, persistence) sits
//! behind one of these async traits. The engine only ever holds
//! `Arc<dyn Trait>`, so production adapters and test doubles plug in the
//! same way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::approval::ApprovalRequest;
use crate::models::{CampaignBrief, Candidate};
use crate::negotiation::{CallOutcome, ContactMethod, ContactWindow, NegotiationRecord};
use crate::workflow::WorkflowState;

/// Errors raised by the call provider
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("Call did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Call failed: {0}")]
    Failed(String),
}

/// Errors raised by the other collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Campaign details shared with collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignContext {
    pub workflow_id: String,
    pub campaign_id: String,
    pub brand_name: String,
    pub product_name: String,
    pub niche: String,
    pub campaign_goal: String,
    pub timeline_days: u32,
}

impl CampaignContext {
    pub fn from_brief(workflow_id: &str, brief: &CampaignBrief) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            campaign_id: brief.id.clone(),
            brand_name: brief.brand_name.clone(),
            product_name: brief.product_name.clone(),
            niche: brief.niche.clone(),
            campaign_goal: brief.campaign_goal.clone(),
            timeline_days: brief.timeline_days,
        }
    }
}

/// Offer bounds handed to the call provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingStrategy {
    pub estimated_rate: f64,
    pub initial_offer: f64,
    pub max_offer: f64,
}

impl PricingStrategy {
    pub fn for_rate(estimated_rate: f64, initial_multiplier: f64, max_multiplier: f64) -> Self {
        Self {
            estimated_rate,
            initial_offer: estimated_rate * initial_multiplier,
            max_offer: estimated_rate * max_multiplier,
        }
    }
}

/// Provider handle for an in-flight call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHandle {
    pub call_id: String,
    pub candidate_id: String,
}

/// Scored result of a completed call, as supplied by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub conversation_id: String,
    pub outcome: CallOutcome,
    /// Provider confidence in `outcome`, 0.0–1.0.
    pub confidence: f64,
    /// 1–10.
    #[serde(default = "default_enthusiasm")]
    pub enthusiasm: u8,
    #[serde(default)]
    pub negotiated_rate: Option<f64>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub usage_rights: Option<String>,
    #[serde(default)]
    pub payment_schedule: Option<String>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub preferred_contact_method: Option<ContactMethod>,
    #[serde(default)]
    pub best_time_to_contact: Option<ContactWindow>,
    #[serde(default)]
    pub duration_seconds: u32,
}

fn default_enthusiasm() -> u8 {
    5
}

impl CallResult {
    pub fn new(conversation_id: impl Into<String>, outcome: CallOutcome, confidence: f64) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            outcome,
            confidence,
            enthusiasm: default_enthusiasm(),
            negotiated_rate: None,
            deliverables: Vec::new(),
            timeline: None,
            usage_rights: None,
            payment_schedule: None,
            objections: Vec::new(),
            concerns: Vec::new(),
            preferred_contact_method: None,
            best_time_to_contact: None,
            duration_seconds: 0,
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.negotiated_rate = Some(rate);
        self
    }

    pub fn with_objections<I, S>(mut self, objections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.objections = objections.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deliverables<I, S>(mut self, deliverables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deliverables = deliverables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_contact(mut self, method: ContactMethod, window: ContactWindow) -> Self {
        self.preferred_contact_method = Some(method);
        self.best_time_to_contact = Some(window);
        self
    }
}

/// One scheduled follow-up attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpRequest {
    pub workflow_id: String,
    pub negotiation_id: String,
    pub candidate: Candidate,
    /// 1-based attempt number.
    pub attempt: u32,
    pub channel: ContactMethod,
    pub scheduled_for: DateTime<Utc>,
    pub max_offer: f64,
}

/// What a follow-up attempt produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpResult {
    pub outcome: CallOutcome,
    #[serde(default)]
    pub negotiated_rate: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl FollowUpResult {
    pub fn new(outcome: CallOutcome) -> Self {
        Self {
            outcome,
            negotiated_rate: None,
            notes: None,
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.negotiated_rate = Some(rate);
        self
    }
}

/// Final terms sent to the creator for confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub workflow_id: String,
    pub negotiation_id: String,
    pub candidate: Candidate,
    pub final_rate: f64,
    pub deliverables: Vec<String>,
    pub timeline: String,
}

/// Creator search.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Ranked candidates for the brief's niche.
    async fn discover(&self, brief: &CampaignBrief) -> Result<Vec<Candidate>, ServiceError>;
}

/// Conversational/voice call provider.
#[async_trait]
pub trait CallService: Send + Sync {
    async fn initiate(
        &self,
        candidate: &Candidate,
        campaign: &CampaignContext,
        pricing: &PricingStrategy,
    ) -> Result<CallHandle, CallError>;

    /// Wait for the call to end. Callers also bound this with `timeout`.
    async fn await_completion(
        &self,
        handle: &CallHandle,
        timeout: Duration,
    ) -> Result<CallResult, CallError>;
}

/// Tells humans and sponsors that a decision is waiting.
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    async fn notify_human_review(&self, request: &ApprovalRequest) -> Result<(), ServiceError>;
    async fn notify_sponsor_approval(&self, request: &ApprovalRequest)
        -> Result<(), ServiceError>;
}

/// Follow-up and confirmation messaging with creators.
#[async_trait]
pub trait OutreachService: Send + Sync {
    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResult, ServiceError>;
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<(), ServiceError>;
}

/// Contract rendering and delivery.
#[async_trait]
pub trait ContractService: Send + Sync {
    /// Returns the generated contract id.
    async fn generate(
        &self,
        record: &NegotiationRecord,
        brief: &CampaignBrief,
    ) -> Result<String, ServiceError>;
    async fn dispatch(&self, contract_id: &str) -> Result<(), ServiceError>;
}

/// Best-effort durable storage.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn record_negotiation(
        &self,
        workflow_id: &str,
        record: &NegotiationRecord,
    ) -> Result<(), ServiceError>;
    async fn record_campaign_state(&self, state: &WorkflowState) -> Result<(), ServiceError>;
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl ApprovalNotifier for TracingNotifier {
    async fn notify_human_review(&self, request: &ApprovalRequest) -> Result<(), ServiceError> {
        info!(request = %request.summary_line(), "Human review requested");
        Ok(())
    }

    async fn notify_sponsor_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<(), ServiceError> {
        info!(request = %request.summary_line(), "Sponsor approval requested");
        Ok(())
    }
}

/// Persistence that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersistence;

#[async_trait]
impl PersistenceService for NullPersistence {
    async fn record_negotiation(
        &self,
        _workflow_id: &str,
        _record: &NegotiationRecord,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn record_campaign_state(&self, _state: &WorkflowState) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// The collaborator set one workflow runs against.
#[derive(Clone)]
pub struct CampaignServices {
    pub discovery: Arc<dyn DiscoveryService>,
    pub calls: Arc<dyn CallService>,
    pub outreach: Arc<dyn OutreachService>,
    pub contracts: Arc<dyn ContractService>,
    pub notifier: Arc<dyn ApprovalNotifier>,
    pub persistence: Arc<dyn PersistenceService>,
}

impl CampaignServices {
    /// Services with a logging notifier and no persistence.
    pub fn new(
        discovery: Arc<dyn DiscoveryService>,
        calls: Arc<dyn CallService>,
        outreach: Arc<dyn OutreachService>,
        contracts: Arc<dyn ContractService>,
    ) -> Self {
        Self {
            discovery,
            calls,
            outreach,
            contracts,
            notifier: Arc::new(TracingNotifier),
            persistence: Arc::new(NullPersistence),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ApprovalNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PersistenceService>) -> Self {
        self.persistence = persistence;
        self
    }
}
