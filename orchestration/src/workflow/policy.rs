//! Stop-early / adjust-approach policy consulted during the negotiation
//! sequence.

use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;

/// Inputs handed to a [`ProgressPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Terminal negotiations so far.
    pub attempts: u32,
    pub successes: u32,
    pub success_rate: f64,
    /// Sum of confirmed rates.
    pub committed: f64,
    pub total_budget: f64,
    pub remaining_budget: f64,
    /// Desired number of confirmed creators.
    pub target: u32,
    /// Max-offer multiplier currently in effect.
    pub max_offer_multiplier: f64,
}

impl ProgressSnapshot {
    pub fn new(
        attempts: u32,
        successes: u32,
        committed: f64,
        total_budget: f64,
        target: u32,
        max_offer_multiplier: f64,
    ) -> Self {
        let success_rate = if attempts == 0 {
            0.0
        } else {
            successes as f64 / attempts as f64
        };
        Self {
            attempts,
            successes,
            success_rate,
            committed,
            total_budget,
            remaining_budget: (total_budget - committed).max(0.0),
            target,
            max_offer_multiplier,
        }
    }
}

/// What the engine should do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PolicyDecision {
    Continue,
    AdjustApproach {
        reason: String,
        max_offer_multiplier: f64,
    },
    StopEarly {
        reason: String,
    },
}

impl std::fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::AdjustApproach {
                reason,
                max_offer_multiplier,
            } => write!(f, "adjust (max offer x{max_offer_multiplier:.2}): {reason}"),
            Self::StopEarly { reason } => write!(f, "stop early: {reason}"),
        }
    }
}

/// Pluggable progress policy.
pub trait ProgressPolicy: Send + Sync {
    fn evaluate(&self, snapshot: &ProgressSnapshot) -> PolicyDecision;
}

/// Default policy driven by [`PolicyConfig`] thresholds.
#[derive(Debug, Clone, Default)]
pub struct ThresholdPolicy {
    config: PolicyConfig,
}

impl ThresholdPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }
}

impl ProgressPolicy for ThresholdPolicy {
    fn evaluate(&self, s: &ProgressSnapshot) -> PolicyDecision {
        if s.target > 0 && s.successes >= s.target {
            return PolicyDecision::StopEarly {
                reason: format!("target of {} creators reached", s.target),
            };
        }

        let floor = s.total_budget * self.config.stop_below_budget_fraction;
        if s.attempts > 0 && s.remaining_budget <= floor {
            return PolicyDecision::StopEarly {
                reason: format!(
                    "remaining budget {:.2} at or below reserve floor {floor:.2}",
                    s.remaining_budget
                ),
            };
        }

        let adjusted = self.config.adjusted_max_offer_multiplier;
        if s.attempts >= self.config.min_attempts_before_adjust
            && s.success_rate < self.config.min_success_rate
            && s.max_offer_multiplier < adjusted
        {
            return PolicyDecision::AdjustApproach {
                reason: format!(
                    "success rate {:.0}% below {:.0}% after {} attempts",
                    s.success_rate * 100.0,
                    self.config.min_success_rate * 100.0,
                    s.attempts
                ),
                max_offer_multiplier: adjusted,
            };
        }

        PolicyDecision::Continue
    }
}
