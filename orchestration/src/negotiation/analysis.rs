//! Post-call analysis: review triggers, routing and follow-up scheduling.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use super::state::NegotiationPhase;
use crate::approval::ApprovalPriority;
use crate::config::ReviewThresholds;
use crate::services::CallResult;

/// Outcome reported for a call or follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Accepted,
    Declined,
    NeedsFollowUp,
    Unclear,
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Declined => write!(f, "declined"),
            Self::NeedsFollowUp => write!(f, "needs_follow_up"),
            Self::Unclear => write!(f, "unclear"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    #[default]
    Email,
    Call,
    Message,
}

impl std::fmt::Display for ContactMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Call => write!(f, "call"),
            Self::Message => write!(f, "message"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactWindow {
    Morning,
    Afternoon,
    Evening,
    Weekday,
    Weekend,
    #[default]
    BusinessHours,
}

impl ContactWindow {
    /// Base wait before the first follow-up in this window.
    fn base_delay(self) -> ChronoDuration {
        match self {
            Self::Morning | Self::Afternoon | Self::Evening | Self::BusinessHours => {
                ChronoDuration::hours(24)
            }
            Self::Weekday => ChronoDuration::hours(48),
            Self::Weekend => ChronoDuration::hours(72),
        }
    }
}

/// Longest wait between follow-ups.
const MAX_FOLLOW_UP_DELAY_HOURS: i64 = 72;

/// Channel and time for follow-up `attempt` (1-based).
///
/// The delay grows linearly with the attempt number and is capped at
/// three days.
pub fn follow_up_schedule(
    method: ContactMethod,
    window: ContactWindow,
    attempt: u32,
    from: DateTime<Utc>,
) -> (ContactMethod, DateTime<Utc>) {
    let scaled = window.base_delay() * attempt.max(1) as i32;
    let delay = scaled.min(ChronoDuration::hours(MAX_FOLLOW_UP_DELAY_HOURS));
    (method, from + delay)
}

/// Terms discussed on the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiatedTerms {
    pub deliverables: Vec<String>,
    pub timeline: String,
    pub usage_rights: String,
    pub payment_schedule: String,
}

impl Default for NegotiatedTerms {
    fn default() -> Self {
        Self {
            deliverables: Vec::new(),
            timeline: "7 days".to_string(),
            usage_rights: "organic_only".to_string(),
            payment_schedule: "50% upfront".to_string(),
        }
    }
}

/// Whether a call outcome needs a human before it can proceed.
pub fn requires_human_review(
    outcome: CallOutcome,
    confidence: f64,
    objection_count: usize,
    negotiated_rate: Option<f64>,
    thresholds: &ReviewThresholds,
) -> bool {
    confidence < thresholds.min_confidence
        || objection_count > thresholds.max_objections
        || negotiated_rate.is_some_and(|r| r > thresholds.high_value_rate)
        || outcome == CallOutcome::Unclear
}

/// Structured analysis of a completed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallAnalysis {
    pub conversation_id: String,
    pub outcome: CallOutcome,
    pub confidence: f64,
    pub enthusiasm: u8,
    pub negotiated_rate: Option<f64>,
    pub terms: NegotiatedTerms,
    pub objections: Vec<String>,
    pub concerns: Vec<String>,
    pub preferred_contact_method: ContactMethod,
    pub best_time_to_contact: ContactWindow,
    pub requires_human_review: bool,
    pub duration_seconds: u32,
    pub analyzed_at: DateTime<Utc>,
}

impl CallAnalysis {
    /// Normalize a provider result and derive the review flag.
    pub fn from_call(result: &CallResult, thresholds: &ReviewThresholds) -> Self {
        let confidence = if result.confidence.is_nan() {
            0.0
        } else {
            result.confidence.clamp(0.0, 1.0)
        };
        let negotiated_rate = result.negotiated_rate.filter(|r| r.is_finite() && *r >= 0.0);
        let defaults = NegotiatedTerms::default();
        let terms = NegotiatedTerms {
            deliverables: result.deliverables.clone(),
            timeline: result.timeline.clone().unwrap_or(defaults.timeline),
            usage_rights: result.usage_rights.clone().unwrap_or(defaults.usage_rights),
            payment_schedule: result
                .payment_schedule
                .clone()
                .unwrap_or(defaults.payment_schedule),
        };

        Self {
            conversation_id: result.conversation_id.clone(),
            outcome: result.outcome,
            confidence,
            enthusiasm: result.enthusiasm.clamp(1, 10),
            negotiated_rate,
            terms,
            objections: result.objections.clone(),
            concerns: result.concerns.iter().take(3).cloned().collect(),
            preferred_contact_method: result.preferred_contact_method.unwrap_or_default(),
            best_time_to_contact: result.best_time_to_contact.unwrap_or_default(),
            requires_human_review: requires_human_review(
                result.outcome,
                confidence,
                result.objections.len(),
                negotiated_rate,
                thresholds,
            ),
            duration_seconds: result.duration_seconds,
            analyzed_at: Utc::now(),
        }
    }

    /// Next phase after analysis.
    pub fn route(&self) -> NegotiationPhase {
        if self.requires_human_review {
            return NegotiationPhase::HumanReview;
        }
        match self.outcome {
            CallOutcome::NeedsFollowUp => NegotiationPhase::FollowUpRequired,
            CallOutcome::Accepted => NegotiationPhase::SponsorApproval,
            CallOutcome::Declined | CallOutcome::Unclear => NegotiationPhase::Failed,
        }
    }

    /// Queue priority for a human review of this call.
    pub fn review_priority(&self, thresholds: &ReviewThresholds) -> ApprovalPriority {
        let high_value = self
            .negotiated_rate
            .is_some_and(|r| r > thresholds.high_value_rate);
        if high_value || self.objections.len() > thresholds.max_objections {
            ApprovalPriority::High
        } else if self.outcome == CallOutcome::Unclear || !self.objections.is_empty() {
            ApprovalPriority::Medium
        } else {
            ApprovalPriority::Low
        }
    }

    /// Recommendation text shown to the reviewer.
    pub fn recommendation(&self) -> String {
        let confidence = (self.confidence * 100.0).round();
        let rate = self
            .negotiated_rate
            .map(|r| format!("{r:.2}"))
            .unwrap_or_else(|| "no rate".to_string());
        match self.outcome {
            CallOutcome::Accepted => format!(
                "RECOMMEND APPROVAL: creator accepted at {rate} ({confidence}% confidence, {} objections)",
                self.objections.len()
            ),
            CallOutcome::NeedsFollowUp => format!(
                "RECOMMEND FOLLOW-UP: creator interested but undecided ({confidence}% confidence)"
            ),
            CallOutcome::Declined => format!(
                "RECOMMEND REJECTION: creator declined ({confidence}% confidence)"
            ),
            CallOutcome::Unclear => format!(
                "MANUAL REVIEW: outcome unclear ({confidence}% confidence, {} objections)",
                self.objections.len()
            ),
        }
    }
}
