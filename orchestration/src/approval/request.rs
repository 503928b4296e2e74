//! Approval request and decision types.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// Approval request identifier.
pub type ApprovalId = String;

/// Which queue a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// Manual review of an ambiguous or high-value call outcome.
    HumanReview,
    /// Budget owner sign-off before a deal is finalized.
    SponsorApproval,
}

impl std::fmt::Display for ApprovalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HumanReview => write!(f, "human_review"),
            Self::SponsorApproval => write!(f, "sponsor_approval"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPriority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ApprovalPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Reviewer's answer to a human-review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanDecision {
    Approve,
    Reject,
    RequestChanges,
    ScheduleFollowUp,
    Escalate,
}

impl std::fmt::Display for HumanDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::RequestChanges => write!(f, "request_changes"),
            Self::ScheduleFollowUp => write!(f, "schedule_follow_up"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

/// Sponsor's answer to a sponsor-approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorDecision {
    Approved,
    Rejected,
    NeedsRevision,
}

impl std::fmt::Display for SponsorDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::NeedsRevision => write!(f, "needs_revision"),
        }
    }
}

/// A decision for either queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Human(HumanDecision),
    Sponsor(SponsorDecision),
}

impl ApprovalDecision {
    /// Queue this decision answers.
    pub fn kind(&self) -> ApprovalKind {
        match self {
            Self::Human(_) => ApprovalKind::HumanReview,
            Self::Sponsor(_) => ApprovalKind::SponsorApproval,
        }
    }
}

impl From<HumanDecision> for ApprovalDecision {
    fn from(d: HumanDecision) -> Self {
        Self::Human(d)
    }
}

impl From<SponsorDecision> for ApprovalDecision {
    fn from(d: SponsorDecision) -> Self {
        Self::Sponsor(d)
    }
}

/// A decision as recorded on a negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord<D> {
    pub request_id: ApprovalId,
    pub decision: D,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Lifecycle status of a request inside the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Resolved,
    Expired,
    /// Removed because its negotiation was cancelled.
    Withdrawn,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Resolved => write!(f, "resolved"),
            Self::Expired => write!(f, "expired"),
            Self::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

/// A pending human-review or sponsor-approval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub kind: ApprovalKind,
    pub workflow_id: String,
    pub negotiation_id: String,
    pub candidate_id: String,
    pub candidate_name: String,
    /// Rate the deal would be signed at.
    pub proposed_rate: f64,
    pub priority: ApprovalPriority,
    /// Short recommendation shown to the approver.
    pub recommendation: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// Longest deadline an approval request gets when its ttl cannot be
/// represented.
pub fn max_approval_ttl() -> ChronoDuration {
    ChronoDuration::weeks(52)
}

impl ApprovalRequest {
    /// Create a request with a deadline `ttl` from now.
    pub fn new(
        kind: ApprovalKind,
        workflow_id: impl Into<String>,
        negotiation_id: impl Into<String>,
        candidate_id: impl Into<String>,
        candidate_name: impl Into<String>,
        proposed_rate: f64,
        ttl: ChronoDuration,
    ) -> Self {
        let created_at = Utc::now();
        let prefix = match kind {
            ApprovalKind::HumanReview => "review",
            ApprovalKind::SponsorApproval => "sponsor",
        };
        Self {
            id: format!("{prefix}-{}", uuid::Uuid::new_v4()),
            kind,
            workflow_id: workflow_id.into(),
            negotiation_id: negotiation_id.into(),
            candidate_id: candidate_id.into(),
            candidate_name: candidate_name.into(),
            proposed_rate,
            priority: ApprovalPriority::Medium,
            recommendation: String::new(),
            created_at,
            deadline: created_at
                .checked_add_signed(ttl)
                .or_else(|| created_at.checked_add_signed(max_approval_ttl()))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn with_priority(mut self, priority: ApprovalPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Compact one-line summary for logs and notifications.
    pub fn summary_line(&self) -> String {
        format!(
            "[{}|{}] {} for {} at {:.2} (due {})",
            self.kind,
            self.priority,
            self.id,
            self.candidate_name,
            self.proposed_rate,
            self.deadline.format("%Y-%m-%d %H:%M UTC")
        )
    }
}
