//! Negotiation state: phases, legal transitions and the per-candidate record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::analysis::{CallAnalysis, CallOutcome, ContactMethod};
use crate::approval::{DecisionRecord, HumanDecision, SponsorDecision};
use crate::models::Candidate;
use crate::pool::PoolTier;

/// Phase of a single creator negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationPhase {
    /// Outreach call in progress.
    InitialCall,
    /// Call finished; deciding where it goes next.
    PostCallAnalysis,
    /// Waiting on a human reviewer.
    HumanReview,
    /// Inconclusive; another outreach attempt is due.
    FollowUpRequired,
    /// Waiting on the sponsor.
    SponsorApproval,
    /// Sending final terms to the creator.
    FinalConfirmation,
    /// Deal confirmed.
    Completed,
    /// Negotiation ended without a deal.
    Failed,
}

impl NegotiationPhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [NegotiationPhase] {
        match self {
            Self::InitialCall => &[Self::PostCallAnalysis, Self::Failed],
            Self::PostCallAnalysis => &[
                Self::HumanReview,
                Self::FollowUpRequired,
                Self::SponsorApproval,
                Self::Failed,
            ],
            Self::HumanReview => &[Self::SponsorApproval, Self::FollowUpRequired, Self::Failed],
            Self::FollowUpRequired => &[Self::FollowUpRequired, Self::SponsorApproval, Self::Failed],
            Self::SponsorApproval => {
                &[Self::FinalConfirmation, Self::FollowUpRequired, Self::Failed]
            }
            Self::FinalConfirmation => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for NegotiationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitialCall => write!(f, "initial_call"),
            Self::PostCallAnalysis => write!(f, "post_call_analysis"),
            Self::HumanReview => write!(f, "human_review"),
            Self::FollowUpRequired => write!(f, "follow_up_required"),
            Self::SponsorApproval => write!(f, "sponsor_approval"),
            Self::FinalConfirmation => write!(f, "final_confirmation"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why a negotiation ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("call failed: {0}")]
    CallFailed(String),
    #[error("call timed out")]
    CallTimeout,
    #[error("creator declined")]
    Declined,
    #[error("rejected in human review")]
    HumanRejected,
    #[error("escalated without resolution")]
    Escalated,
    #[error("human review expired")]
    HumanReviewExpired,
    #[error("follow-up failed: {0}")]
    FollowUpFailed(String),
    #[error("follow-ups exhausted after {attempts} attempts")]
    FollowUpsExhausted { attempts: u32 },
    #[error("rejected by sponsor")]
    SponsorRejected,
    #[error("sponsor approval expired")]
    SponsorApprovalExpired,
    #[error("agreed rate {rate:.2} exceeds remaining budget {remaining:.2}")]
    OverBudget { rate: f64, remaining: f64 },
    #[error("confirmation failed: {0}")]
    ConfirmationFailed(String),
    #[error("approval gateway unavailable: {0}")]
    ApprovalUnavailable(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("cancelled")]
    Cancelled,
}

/// Errors from record mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid transition {from} → {to} (allowed: {allowed:?})")]
    InvalidTransition {
        from: NegotiationPhase,
        to: NegotiationPhase,
        allowed: &'static [NegotiationPhase],
    },
    #[error("follow-up limit of {max} reached")]
    FollowUpLimit { max: u32 },
}

/// A phase transition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: NegotiationPhase,
    pub to: NegotiationPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// One executed follow-up attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpAttempt {
    /// 1-based.
    pub attempt: u32,
    pub channel: ContactMethod,
    pub scheduled_for: DateTime<Utc>,
    pub attempted_at: DateTime<Utc>,
    pub outcome: CallOutcome,
    #[serde(default)]
    pub negotiated_rate: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Confirmed,
}

/// Terms of a confirmed deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalOutcome {
    pub status: DealStatus,
    pub final_rate: f64,
    pub deliverables: Vec<String>,
    pub timeline: String,
    pub confirmed_at: DateTime<Utc>,
}

/// Typed state of one negotiation.
///
/// Phase and follow-up history only change through [`transition`],
/// [`fail`] and [`record_follow_up`], which enforce the transition table
/// and the follow-up bound.
///
/// [`transition`]: NegotiationRecord::transition
/// [`fail`]: NegotiationRecord::fail
/// [`record_follow_up`]: NegotiationRecord::record_follow_up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationRecord {
    pub id: String,
    pub workflow_id: String,
    pub candidate_id: String,
    pub candidate_name: String,
    pub pool_tier: PoolTier,
    pub estimated_rate: f64,
    phase: NegotiationPhase,
    pub call_analysis: Option<CallAnalysis>,
    pub human_decision: Option<DecisionRecord<HumanDecision>>,
    pub sponsor_decision: Option<DecisionRecord<SponsorDecision>>,
    follow_up_history: Vec<FollowUpAttempt>,
    pub final_outcome: Option<FinalOutcome>,
    pub failure_reason: Option<FailureReason>,
    pub transitions: Vec<PhaseTransition>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NegotiationRecord {
    /// Start a negotiation in `InitialCall`.
    pub fn new(workflow_id: &str, candidate: &Candidate, pool_tier: PoolTier) -> Self {
        Self {
            id: format!("neg-{}", uuid::Uuid::new_v4()),
            workflow_id: workflow_id.to_string(),
            candidate_id: candidate.id.clone(),
            candidate_name: candidate.name.clone(),
            pool_tier,
            estimated_rate: candidate.estimated_rate,
            phase: NegotiationPhase::InitialCall,
            call_analysis: None,
            human_decision: None,
            sponsor_decision: None,
            follow_up_history: Vec::new(),
            final_outcome: None,
            failure_reason: None,
            transitions: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    pub fn follow_ups(&self) -> &[FollowUpAttempt] {
        &self.follow_up_history
    }

    /// Transition to a new phase with a reason.
    pub fn transition(&mut self, to: NegotiationPhase, reason: &str) -> Result<(), RecordError> {
        let allowed = self.phase.valid_transitions();
        if !allowed.contains(&to) {
            return Err(RecordError::InvalidTransition {
                from: self.phase,
                to,
                allowed,
            });
        }

        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Move to `Failed`. Returns false if already terminal.
    pub fn fail(&mut self, reason: FailureReason) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        let text = reason.to_string();
        self.failure_reason = Some(reason);
        // Failed is reachable from every non-terminal phase.
        self.transition(NegotiationPhase::Failed, &text).is_ok()
    }

    /// Append a follow-up attempt, refusing to exceed `max`.
    pub fn record_follow_up(&mut self, attempt: FollowUpAttempt, max: u32) -> Result<(), RecordError> {
        if self.follow_up_history.len() as u32 >= max {
            return Err(RecordError::FollowUpLimit { max });
        }
        self.follow_up_history.push(attempt);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn is_successful(&self) -> bool {
        self.phase == NegotiationPhase::Completed
    }

    /// Rate the deal stands at: the latest accepted follow-up rate, then
    /// the rate negotiated on the call, then the estimate.
    pub fn agreed_rate(&self) -> f64 {
        self.follow_up_history
            .iter()
            .rev()
            .filter(|f| f.outcome == CallOutcome::Accepted)
            .find_map(|f| f.negotiated_rate)
            .or_else(|| self.call_analysis.as_ref().and_then(|a| a.negotiated_rate))
            .unwrap_or(self.estimated_rate)
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] {} ({}) | {} follow-ups | rate {:.2}",
            self.phase,
            self.candidate_name,
            self.pool_tier,
            self.follow_up_history.len(),
            self.agreed_rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> NegotiationRecord {
        let c = Candidate::new("c-1", "Ana", 40_000, 4.0, 1_200.0);
        NegotiationRecord::new("wf-1", &c, PoolTier::Primary)
    }

    fn attempt(n: u32, outcome: CallOutcome, rate: Option<f64>) -> FollowUpAttempt {
        FollowUpAttempt {
            attempt: n,
            channel: ContactMethod::Email,
            scheduled_for: Utc::now(),
            attempted_at: Utc::now(),
            outcome,
            negotiated_rate: rate,
            notes: None,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut r = record();
        assert_eq!(r.phase(), NegotiationPhase::InitialCall);
        r.transition(NegotiationPhase::PostCallAnalysis, "call done").unwrap();
        r.transition(NegotiationPhase::SponsorApproval, "accepted").unwrap();
        r.transition(NegotiationPhase::FinalConfirmation, "approved").unwrap();
        r.transition(NegotiationPhase::Completed, "confirmed").unwrap();
        assert!(r.is_successful());
        assert!(r.completed_at.is_some());
        assert_eq!(r.transitions.len(), 4);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut r = record();
        let err = r
            .transition(NegotiationPhase::Completed, "skip ahead")
            .unwrap_err();
        assert!(matches!(
            err,
            RecordError::InvalidTransition {
                from: NegotiationPhase::InitialCall,
                to: NegotiationPhase::Completed,
                ..
            }
        ));
        assert_eq!(r.phase(), NegotiationPhase::InitialCall);
    }

    #[test]
    fn test_failed_reachable_from_every_non_terminal_phase() {
        for phase in [
            NegotiationPhase::InitialCall,
            NegotiationPhase::PostCallAnalysis,
            NegotiationPhase::HumanReview,
            NegotiationPhase::FollowUpRequired,
            NegotiationPhase::SponsorApproval,
            NegotiationPhase::FinalConfirmation,
        ] {
            assert!(phase.valid_transitions().contains(&NegotiationPhase::Failed));
        }
        assert!(NegotiationPhase::Completed.valid_transitions().is_empty());
        assert!(NegotiationPhase::Failed.valid_transitions().is_empty());
    }

    #[test]
    fn test_fail_records_reason_once() {
        let mut r = record();
        assert!(r.fail(FailureReason::Cancelled));
        assert_eq!(r.phase(), NegotiationPhase::Failed);
        assert_eq!(r.failure_reason, Some(FailureReason::Cancelled));
        assert_eq!(r.transitions.last().unwrap().reason, "cancelled");
        assert!(!r.fail(FailureReason::CallTimeout));
        assert_eq!(r.failure_reason, Some(FailureReason::Cancelled));
    }

    #[test]
    fn test_follow_up_bound() {
        let mut r = record();
        for n in 1..=3 {
            r.record_follow_up(attempt(n, CallOutcome::NeedsFollowUp, None), 3)
                .unwrap();
        }
        let err = r
            .record_follow_up(attempt(4, CallOutcome::Accepted, None), 3)
            .unwrap_err();
        assert_eq!(err, RecordError::FollowUpLimit { max: 3 });
        assert_eq!(r.follow_ups().len(), 3);
    }

    #[test]
    fn test_agreed_rate_precedence() {
        let mut r = record();
        assert_eq!(r.agreed_rate(), 1_200.0);
        r.record_follow_up(attempt(1, CallOutcome::NeedsFollowUp, Some(900.0)), 3)
            .unwrap();
        // inconclusive follow-up rate does not count
        assert_eq!(r.agreed_rate(), 1_200.0);
        r.record_follow_up(attempt(2, CallOutcome::Accepted, Some(1_350.0)), 3)
            .unwrap();
        assert_eq!(r.agreed_rate(), 1_350.0);
    }

    #[test]
    fn test_status_line() {
        let r = record();
        let line = r.status_line();
        assert!(line.starts_with("[initial_call] Ana (primary)"));
        assert!(line.contains("rate 1200.00"));
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::Cancelled.to_string(), "cancelled");
        assert_eq!(
            FailureReason::FollowUpsExhausted { attempts: 3 }.to_string(),
            "follow-ups exhausted after 3 attempts"
        );
    }
}
