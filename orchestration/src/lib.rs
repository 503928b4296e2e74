//! Campaign Workflow Orchestration Library
//!
//! This library provides:
//! - Budget allocation across primary, reserve and buffer tranches
//! - Deterministic candidate pool selection under a budget
//! - A per-candidate negotiation state machine with human-review and
//!   sponsor-approval gates
//! - A process-wide approval gateway shared by concurrent workflows
//! - The campaign workflow engine, registry and service API
//!
//! External systems (discovery, voice calls, outreach, contracts,
//! persistence) are reached only through the async traits in [`services`].
//!
//! # Usage
//!
//! ```ignore
//! let service = WorkflowService::new(services);
//! service.start_sweeper(config.approval_sweep_interval());
//! let id = service.start_workflow(brief, config)?;
//! let state = service.wait_for_completion(&id).await?;
//! ```

pub mod approval;
pub mod budget;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod negotiation;
pub mod pool;
pub mod services;
pub mod workflow;

// Re-export key campaign types
pub use budget::{BudgetAllocation, BudgetAllocator, SelectionStrategy};
pub use error::{CampaignError, CampaignResult};
pub use models::{Availability, CampaignBrief, Candidate, CreatorTier};
pub use pool::{CandidatePool, CandidatePoolSelector, PoolSelection, PoolTier};

// Re-export configuration
pub use config::{ConfigError, NegotiationConfig, PolicyConfig, ReviewThresholds, WorkflowConfig};

// Re-export negotiation types
pub use negotiation::{
    CallAnalysis, CallOutcome, ContactMethod, ContactWindow, FailureReason, NegotiationContext,
    NegotiationPhase, NegotiationRecord, NegotiationStateMachine, MAX_FOLLOW_UPS,
};

// Re-export approval types
pub use approval::{
    ApprovalDecision, ApprovalError, ApprovalGateway, ApprovalKind, ApprovalPriority,
    ApprovalRequest, HumanDecision, RequestStatus, ResolveOutcome, SharedApprovalGateway,
    SponsorDecision, WaitOutcome,
};

// Re-export collaborator seams
pub use services::{
    ApprovalNotifier, CallError, CallHandle, CallResult, CallService, CampaignContext,
    CampaignServices, ConfirmationRequest, ContractService, DiscoveryService, FollowUpRequest,
    FollowUpResult, NullPersistence, OutreachService, PersistenceService, PricingStrategy,
    ServiceError, TracingNotifier,
};

// Re-export workflow types
pub use events::{EventBus, SharedEventBus, WorkflowEvent};
pub use workflow::{
    PolicyDecision, ProgressPolicy, ProgressSnapshot, ThresholdPolicy, WorkflowEngine,
    WorkflowPhase, WorkflowRegistry, WorkflowService, WorkflowState,
};
