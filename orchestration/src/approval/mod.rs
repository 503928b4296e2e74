//! Approval gateway
//!
//! Two process-wide FIFO queues (human review, sponsor approval) shared by
//! every running workflow.
//!
//! ```text
//!  negotiation ──enqueue──▶ ┌──────────────┐ ◀──resolve── API / notifier
//!       ▲                   │   gateway    │
//!       │                   │ human  queue │ ◀──sweep──── sweeper task
//!       └──── oneshot ───── │ sponsor queue│
//!                           └──────────────┘
//! ```

pub mod gateway;
pub mod request;

pub use gateway::{
    ApprovalError, ApprovalGateway, ApprovalResolution, ApprovalResult, PendingApproval,
    ResolveOutcome, SharedApprovalGateway, WaitOutcome,
};
pub use request::{
    ApprovalDecision, ApprovalId, ApprovalKind, ApprovalPriority, ApprovalRequest, DecisionRecord,
    HumanDecision, RequestStatus, SponsorDecision, max_approval_ttl,
};
