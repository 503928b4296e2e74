//! Negotiation state machine driver.
//!
//! Runs one candidate from first call to a terminal phase. Every
//! collaborator failure becomes a `Failed` transition with a recorded
//! [`FailureReason`]; nothing is propagated to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::analysis::{follow_up_schedule, CallAnalysis, CallOutcome};
use super::state::{
    DealStatus, FailureReason, FinalOutcome, FollowUpAttempt, NegotiationPhase, NegotiationRecord,
};
use crate::approval::{
    ApprovalDecision, ApprovalKind, ApprovalPriority, ApprovalRequest, DecisionRecord,
    HumanDecision, SharedApprovalGateway, SponsorDecision, WaitOutcome, max_approval_ttl,
};
use crate::config::NegotiationConfig;
use crate::events::{SharedEventBus, WorkflowEvent};
use crate::models::Candidate;
use crate::pool::PoolTier;
use crate::services::{
    ApprovalNotifier, CallError, CallResult, CallService, CampaignContext, CampaignServices,
    ConfirmationRequest, FollowUpRequest, OutreachService, PricingStrategy,
};

/// Next phase plus the reason recorded on the transition.
type StepResult = Result<(NegotiationPhase, String), FailureReason>;

/// Per-workflow inputs shared by every negotiation in that workflow.
#[derive(Debug, Clone)]
pub struct NegotiationContext {
    pub workflow_id: String,
    pub campaign: CampaignContext,
    /// Current ceiling multiplier; the progress policy may raise it.
    pub max_offer_multiplier: f64,
    /// Campaign budget not yet committed to confirmed deals.
    pub remaining_budget: f64,
    pub cancel: CancellationToken,
}

/// Hard cap on follow-up attempts per negotiation, whatever the config says.
pub const MAX_FOLLOW_UPS: u32 = 3;

/// Race `fut` against cancellation.
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, FailureReason> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FailureReason::Cancelled),
        out = fut => Ok(out),
    }
}

fn chrono_ttl(timeout: Duration) -> ChronoDuration {
    ChronoDuration::from_std(timeout).unwrap_or_else(|_| max_approval_ttl())
}

/// Drives negotiations against the external collaborators.
#[derive(Clone)]
pub struct NegotiationStateMachine {
    config: NegotiationConfig,
    calls: Arc<dyn CallService>,
    outreach: Arc<dyn OutreachService>,
    notifier: Arc<dyn ApprovalNotifier>,
    gateway: SharedApprovalGateway,
    events: Option<SharedEventBus>,
}

impl NegotiationStateMachine {
    pub fn new(
        config: NegotiationConfig,
        services: &CampaignServices,
        gateway: SharedApprovalGateway,
    ) -> Self {
        Self {
            config,
            calls: Arc::clone(&services.calls),
            outreach: Arc::clone(&services.outreach),
            notifier: Arc::clone(&services.notifier),
            gateway,
            events: None,
        }
    }

    pub fn with_events(mut self, events: SharedEventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Negotiate with one candidate until a terminal phase.
    pub async fn run(
        &self,
        candidate: &Candidate,
        tier: PoolTier,
        ctx: &NegotiationContext,
    ) -> NegotiationRecord {
        let mut record = NegotiationRecord::new(&ctx.workflow_id, candidate, tier);
        let mut call_result: Option<CallResult> = None;
        info!(
            workflow_id = %ctx.workflow_id,
            negotiation_id = %record.id,
            candidate = %candidate.name,
            tier = %tier,
            "Negotiation started"
        );
        self.publish(WorkflowEvent::NegotiationStarted {
            workflow_id: ctx.workflow_id.clone(),
            negotiation_id: record.id.clone(),
            candidate_id: record.candidate_id.clone(),
            tier,
            timestamp: Utc::now(),
        });

        while !record.phase().is_terminal() {
            if ctx.cancel.is_cancelled() {
                record.fail(FailureReason::Cancelled);
                break;
            }

            let step = match record.phase() {
                NegotiationPhase::InitialCall => match self.initial_call(candidate, ctx).await {
                    Ok(result) => {
                        call_result = Some(result);
                        Ok((NegotiationPhase::PostCallAnalysis, "call completed".to_string()))
                    }
                    Err(reason) => Err(reason),
                },
                NegotiationPhase::PostCallAnalysis => {
                    self.analyze(&mut record, call_result.take())
                }
                NegotiationPhase::HumanReview => self.human_review(&mut record, ctx).await,
                NegotiationPhase::FollowUpRequired => {
                    self.follow_up(&mut record, candidate, ctx).await
                }
                NegotiationPhase::SponsorApproval => {
                    self.sponsor_approval(&mut record, ctx).await
                }
                NegotiationPhase::FinalConfirmation => {
                    self.final_confirmation(&mut record, candidate, ctx).await
                }
                NegotiationPhase::Completed | NegotiationPhase::Failed => break,
            };

            match step {
                Ok((next, reason)) => {
                    debug!(negotiation_id = %record.id, from = %record.phase(), to = %next, %reason, "Negotiation step");
                    if let Err(e) = record.transition(next, &reason) {
                        record.fail(FailureReason::InvalidTransition(e.to_string()));
                    }
                }
                Err(reason) => {
                    record.fail(reason);
                }
            }
        }

        match &record.failure_reason {
            None => info!(
                negotiation_id = %record.id,
                candidate = %record.candidate_name,
                rate = record.agreed_rate(),
                "Negotiation completed"
            ),
            Some(reason) => info!(
                negotiation_id = %record.id,
                candidate = %record.candidate_name,
                %reason,
                "Negotiation failed"
            ),
        }
        self.publish(WorkflowEvent::NegotiationFinished {
            workflow_id: ctx.workflow_id.clone(),
            negotiation_id: record.id.clone(),
            candidate_id: record.candidate_id.clone(),
            outcome: record.phase(),
            timestamp: Utc::now(),
        });
        record
    }

    // ── INITIAL_CALL ─────────────────────────────────────────────────────

    async fn initial_call(
        &self,
        candidate: &Candidate,
        ctx: &NegotiationContext,
    ) -> Result<CallResult, FailureReason> {
        let pricing = PricingStrategy::for_rate(
            candidate.estimated_rate,
            self.config.initial_offer_multiplier,
            ctx.max_offer_multiplier,
        );
        let handle = cancellable(
            &ctx.cancel,
            self.calls.initiate(candidate, &ctx.campaign, &pricing),
        )
        .await?
        .map_err(|e| FailureReason::CallFailed(e.to_string()))?;

        let timeout = self.config.call_timeout();
        let completion = tokio::time::timeout(timeout, self.calls.await_completion(&handle, timeout));
        match cancellable(&ctx.cancel, completion).await? {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(CallError::Timeout(_))) | Err(_) => {
                warn!(call_id = %handle.call_id, ?timeout, "Call did not complete in time");
                Err(FailureReason::CallTimeout)
            }
            Ok(Err(e)) => Err(FailureReason::CallFailed(e.to_string())),
        }
    }

    // ── POST_CALL_ANALYSIS ───────────────────────────────────────────────

    fn analyze(&self, record: &mut NegotiationRecord, result: Option<CallResult>) -> StepResult {
        let result = result
            .ok_or_else(|| FailureReason::CallFailed("no call result to analyze".to_string()))?;
        let analysis = CallAnalysis::from_call(&result, &self.config.review);
        let next = analysis.route();
        let reason = format!(
            "outcome {} at {:.0}% confidence{}",
            analysis.outcome,
            analysis.confidence * 100.0,
            if analysis.requires_human_review {
                ", review required"
            } else {
                ""
            }
        );
        record.call_analysis = Some(analysis);
        if next == NegotiationPhase::Failed {
            return Err(FailureReason::Declined);
        }
        Ok((next, reason))
    }

    /// Fail when the agreed rate no longer fits the remaining budget.
    fn ensure_affordable(
        &self,
        record: &NegotiationRecord,
        ctx: &NegotiationContext,
    ) -> Result<(), FailureReason> {
        let rate = record.agreed_rate();
        if rate > ctx.remaining_budget {
            warn!(
                negotiation_id = %record.id,
                rate,
                remaining = ctx.remaining_budget,
                "Agreed rate exceeds remaining budget"
            );
            return Err(FailureReason::OverBudget {
                rate,
                remaining: ctx.remaining_budget,
            });
        }
        Ok(())
    }

    // ── Approvals ────────────────────────────────────────────────────────

    /// Enqueue, notify and wait. Timeouts and expiry map to `expired`.
    async fn await_decision(
        &self,
        request: ApprovalRequest,
        timeout: Duration,
        ctx: &NegotiationContext,
        expired: FailureReason,
    ) -> Result<(String, ApprovalDecision, Option<String>), FailureReason> {
        let request_id = request.id.clone();
        let pending = self
            .gateway
            .enqueue(request.clone())
            .map_err(|e| FailureReason::ApprovalUnavailable(e.to_string()))?;

        let notified = match request.kind {
            ApprovalKind::HumanReview => self.notifier.notify_human_review(&request).await,
            ApprovalKind::SponsorApproval => self.notifier.notify_sponsor_approval(&request).await,
        };
        if let Err(e) = notified {
            warn!(request_id = %request_id, error = %e, "Approval notification failed");
        }

        match pending.wait(timeout, &ctx.cancel).await {
            WaitOutcome::Decided { decision, notes } => Ok((request_id, decision, notes)),
            WaitOutcome::Expired => Err(expired),
            WaitOutcome::TimedOut => {
                self.gateway.expire(&request_id);
                Err(expired)
            }
            WaitOutcome::Cancelled => {
                self.gateway.withdraw(&request_id);
                Err(FailureReason::Cancelled)
            }
        }
    }

    async fn human_review(
        &self,
        record: &mut NegotiationRecord,
        ctx: &NegotiationContext,
    ) -> StepResult {
        let timeout = self.config.human_review_timeout();
        let (priority, recommendation) = match &record.call_analysis {
            Some(a) => (a.review_priority(&self.config.review), a.recommendation()),
            None => (ApprovalPriority::Medium, "MANUAL REVIEW: no call analysis".to_string()),
        };
        let request = ApprovalRequest::new(
            ApprovalKind::HumanReview,
            &ctx.workflow_id,
            &record.id,
            &record.candidate_id,
            &record.candidate_name,
            record.agreed_rate(),
            chrono_ttl(timeout),
        )
        .with_priority(priority)
        .with_recommendation(recommendation);

        let (request_id, decision, notes) = self
            .await_decision(request, timeout, ctx, FailureReason::HumanReviewExpired)
            .await?;
        let ApprovalDecision::Human(decision) = decision else {
            return Err(FailureReason::InvalidTransition(
                "sponsor decision delivered to a human review".to_string(),
            ));
        };
        record.human_decision = Some(DecisionRecord {
            request_id,
            decision,
            notes,
            decided_at: Utc::now(),
        });

        match decision {
            HumanDecision::Approve => Ok((
                NegotiationPhase::SponsorApproval,
                "approved in human review".to_string(),
            )),
            HumanDecision::ScheduleFollowUp | HumanDecision::RequestChanges => Ok((
                NegotiationPhase::FollowUpRequired,
                format!("reviewer chose {decision}"),
            )),
            HumanDecision::Reject => Err(FailureReason::HumanRejected),
            HumanDecision::Escalate => Err(FailureReason::Escalated),
        }
    }

    async fn sponsor_approval(
        &self,
        record: &mut NegotiationRecord,
        ctx: &NegotiationContext,
    ) -> StepResult {
        self.ensure_affordable(record, ctx)?;
        let timeout = self.config.sponsor_approval_timeout();
        let rate = record.agreed_rate();
        let priority = if rate > self.config.review.high_value_rate {
            ApprovalPriority::High
        } else {
            ApprovalPriority::Medium
        };
        let deliverables = record
            .call_analysis
            .as_ref()
            .map(|a| a.terms.deliverables.join(", "))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "standard placement".to_string());
        let request = ApprovalRequest::new(
            ApprovalKind::SponsorApproval,
            &ctx.workflow_id,
            &record.id,
            &record.candidate_id,
            &record.candidate_name,
            rate,
            chrono_ttl(timeout),
        )
        .with_priority(priority)
        .with_recommendation(format!(
            "Approve {} at {rate:.2} for {deliverables}",
            record.candidate_name
        ));

        let (request_id, decision, notes) = self
            .await_decision(request, timeout, ctx, FailureReason::SponsorApprovalExpired)
            .await?;
        let ApprovalDecision::Sponsor(decision) = decision else {
            return Err(FailureReason::InvalidTransition(
                "human decision delivered to a sponsor approval".to_string(),
            ));
        };
        record.sponsor_decision = Some(DecisionRecord {
            request_id,
            decision,
            notes,
            decided_at: Utc::now(),
        });

        match decision {
            SponsorDecision::Approved => Ok((
                NegotiationPhase::FinalConfirmation,
                "sponsor approved".to_string(),
            )),
            SponsorDecision::NeedsRevision => Ok((
                NegotiationPhase::FollowUpRequired,
                "sponsor requested revision".to_string(),
            )),
            SponsorDecision::Rejected => Err(FailureReason::SponsorRejected),
        }
    }

    // ── FOLLOW_UP_REQUIRED ───────────────────────────────────────────────

    async fn follow_up(
        &self,
        record: &mut NegotiationRecord,
        candidate: &Candidate,
        ctx: &NegotiationContext,
    ) -> StepResult {
        let max = self.config.max_follow_ups.min(MAX_FOLLOW_UPS);
        let done = record.follow_ups().len() as u32;
        if done >= max {
            return Err(FailureReason::FollowUpsExhausted { attempts: done });
        }

        let attempt = done + 1;
        let (method, window) = record
            .call_analysis
            .as_ref()
            .map(|a| (a.preferred_contact_method, a.best_time_to_contact))
            .unwrap_or_default();
        let (channel, scheduled_for) = follow_up_schedule(method, window, attempt, Utc::now());
        let request = FollowUpRequest {
            workflow_id: ctx.workflow_id.clone(),
            negotiation_id: record.id.clone(),
            candidate: candidate.clone(),
            attempt,
            channel,
            scheduled_for,
            max_offer: candidate.estimated_rate * ctx.max_offer_multiplier,
        };

        let result = cancellable(&ctx.cancel, self.outreach.follow_up(&request))
            .await?
            .map_err(|e| FailureReason::FollowUpFailed(e.to_string()))?;
        record
            .record_follow_up(
                FollowUpAttempt {
                    attempt,
                    channel,
                    scheduled_for,
                    attempted_at: Utc::now(),
                    outcome: result.outcome,
                    negotiated_rate: result.negotiated_rate,
                    notes: result.notes,
                },
                max,
            )
            .map_err(|e| FailureReason::InvalidTransition(e.to_string()))?;

        if result.outcome == CallOutcome::Accepted {
            Ok((
                NegotiationPhase::SponsorApproval,
                format!("accepted on follow-up {attempt}"),
            ))
        } else if attempt >= max {
            Err(FailureReason::FollowUpsExhausted { attempts: attempt })
        } else {
            Ok((
                NegotiationPhase::FollowUpRequired,
                format!("follow-up {attempt} was {}", result.outcome),
            ))
        }
    }

    // ── FINAL_CONFIRMATION ───────────────────────────────────────────────

    async fn final_confirmation(
        &self,
        record: &mut NegotiationRecord,
        candidate: &Candidate,
        ctx: &NegotiationContext,
    ) -> StepResult {
        self.ensure_affordable(record, ctx)?;
        let (deliverables, timeline) = record
            .call_analysis
            .as_ref()
            .map(|a| (a.terms.deliverables.clone(), a.terms.timeline.clone()))
            .unwrap_or_else(|| (Vec::new(), format!("{} days", ctx.campaign.timeline_days)));
        let final_rate = record.agreed_rate();
        let request = ConfirmationRequest {
            workflow_id: ctx.workflow_id.clone(),
            negotiation_id: record.id.clone(),
            candidate: candidate.clone(),
            final_rate,
            deliverables: deliverables.clone(),
            timeline: timeline.clone(),
        };

        cancellable(&ctx.cancel, self.outreach.confirm(&request))
            .await?
            .map_err(|e| FailureReason::ConfirmationFailed(e.to_string()))?;
        record.final_outcome = Some(FinalOutcome {
            status: DealStatus::Confirmed,
            final_rate,
            deliverables,
            timeline,
            confirmed_at: Utc::now(),
        });
        Ok((
            NegotiationPhase::Completed,
            format!("confirmed at {final_rate:.2}"),
        ))
    }
}
