//! Candidate pool selection
//!
//! Turns a discovered candidate list into three disjoint, ordered contact
//! tiers under a budget.
//!
//! ```text
//!  discovered ──▶ rank (score, dedupe) ──▶ optimal count
//!                                             │
//!        ┌────────────────────────────────────┘
//!        ▼
//!   primary  (rate ≤ per-candidate × 1.2, strategy order)
//!   reserve  (rate ≤ reserve-per-candidate × 1.3, top 8)
//!   backup   (next 10, unfiltered)
//! ```

pub mod candidate_pool;
pub mod scoring;
pub mod selector;

pub use candidate_pool::{CandidatePool, PoolStatus, PoolTier, TierStatus};
pub use selector::{CandidatePoolSelector, PoolSelection};
