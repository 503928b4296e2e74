//! Campaign workflow
//!
//! ```text
//! ┌─────────────────┐  start_workflow   ┌──────────────────┐
//! │ WorkflowService │──────────────────▶│ tokio task       │
//! │   (API layer)   │                   │  WorkflowEngine  │──▶ negotiation
//! └───────┬─────────┘                   └────────┬─────────┘    state machine
//!         │ get_state / cancel                   │ watch::Sender
//!         ▼                                      ▼
//! ┌─────────────────┐   watch::Receiver ┌──────────────────┐
//! │ WorkflowRegistry│◀──────────────────│  WorkflowState   │
//! └─────────────────┘                   └──────────────────┘
//! ```
//!
//! Phases: data collection → validation → discovery → selection →
//! negotiation sequence → approvals → contract generation → contract
//! delivery → monitoring → completed. Any phase may end in `Failed`.

pub mod engine;
pub mod phase;
pub mod policy;
pub mod registry;
pub mod service;
pub mod state;

pub use engine::{new_workflow_id, WorkflowEngine};
pub use phase::WorkflowPhase;
pub use policy::{PolicyDecision, ProgressPolicy, ProgressSnapshot, ThresholdPolicy};
pub use registry::{SharedWorkflowRegistry, WorkflowEntry, WorkflowRegistry};
pub use service::WorkflowService;
pub use state::{ContractRecord, WorkflowState};
