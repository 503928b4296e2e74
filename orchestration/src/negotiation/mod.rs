//! Per-candidate negotiation
//!
//! ```text
//! INITIAL_CALL ──▶ POST_CALL_ANALYSIS ──┬──▶ HUMAN_REVIEW ──┬──▶ SPONSOR_APPROVAL ──▶ FINAL_CONFIRMATION ──▶ COMPLETED
//!                                       │                  │          ▲    │
//!                                       ├──▶ FOLLOW_UP ◀───┘          │    │
//!                                       │      (≤3) ──────────────────┘    │
//!                                       └──▶ SPONSOR_APPROVAL              ▼
//!                       any phase ──────────────────────────────────▶ FAILED
//! ```
//!
//! [`state`] holds the phase graph and the record, [`analysis`] turns a raw
//! call result into a routing decision, and [`machine`] drives the whole
//! thing against the external collaborators.

pub mod analysis;
pub mod machine;
pub mod state;

pub use analysis::{
    follow_up_schedule, requires_human_review, CallAnalysis, CallOutcome, ContactMethod,
    ContactWindow, NegotiatedTerms,
};
pub use machine::{NegotiationContext, NegotiationStateMachine, MAX_FOLLOW_UPS};
pub use state::{
    DealStatus, FailureReason, FinalOutcome, FollowUpAttempt, NegotiationPhase, NegotiationRecord,
    PhaseTransition, RecordError,
};
