//! Negotiation state machine integration tests: one candidate driven
//! against scripted collaborators and a real approval gateway.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use campaign_orchestration::{
    ApprovalKind, CallOutcome, CallResult, CampaignContext, FailureReason, FollowUpResult,
    HumanDecision, NegotiationConfig, NegotiationContext, NegotiationPhase, NegotiationRecord,
    NegotiationStateMachine, PoolTier, RequestStatus, SponsorDecision, MAX_FOLLOW_UPS,
};
use common::{
    accepted, brief, candidate, eventually, CallScript, Harness, HarnessBuilder, ScriptedCalls,
    ScriptedOutreach,
};

fn fast_negotiation() -> NegotiationConfig {
    let mut config = NegotiationConfig::default();
    config.call_timeout_secs = 1.0;
    config.human_review_timeout_secs = 1.0;
    config.sponsor_approval_timeout_secs = 1.0;
    config
}

fn context(cancel: CancellationToken) -> NegotiationContext {
    NegotiationContext {
        workflow_id: "wf-test".into(),
        campaign: CampaignContext::from_brief("wf-test", &brief(20_000.0)),
        max_offer_multiplier: 1.25,
        remaining_budget: 20_000.0,
        cancel,
    }
}

async fn negotiate(harness: &Harness, config: NegotiationConfig) -> NegotiationRecord {
    let machine = NegotiationStateMachine::new(config, &harness.services(), harness.gateway.clone());
    machine
        .run(
            &candidate("c1", 2_000.0),
            PoolTier::Primary,
            &context(CancellationToken::new()),
        )
        .await
}

fn path(record: &NegotiationRecord) -> Vec<(NegotiationPhase, NegotiationPhase)> {
    record.transitions.iter().map(|t| (t.from, t.to)).collect()
}

// ── Happy paths ──────────────────────────────────────────────────────

#[tokio::test]
async fn confident_acceptance_skips_human_review() {
    let harness = HarnessBuilder::new(vec![]).build();
    let record = negotiate(&harness, fast_negotiation()).await;

    assert_eq!(record.phase(), NegotiationPhase::Completed);
    assert_eq!(
        path(&record),
        vec![
            (NegotiationPhase::InitialCall, NegotiationPhase::PostCallAnalysis),
            (NegotiationPhase::PostCallAnalysis, NegotiationPhase::SponsorApproval),
            (NegotiationPhase::SponsorApproval, NegotiationPhase::FinalConfirmation),
            (NegotiationPhase::FinalConfirmation, NegotiationPhase::Completed),
        ]
    );
    assert!(record.human_decision.is_none());
    assert!(!record.call_analysis.as_ref().unwrap().requires_human_review);
    assert_eq!(
        record.sponsor_decision.as_ref().unwrap().decision,
        SponsorDecision::Approved
    );

    let outcome = record.final_outcome.as_ref().unwrap();
    assert_eq!(outcome.final_rate, 2_000.0);
    assert_eq!(outcome.deliverables, vec!["1 video", "2 stories"]);
    assert_eq!(harness.approver.kinds(), vec![ApprovalKind::SponsorApproval]);
    assert_eq!(harness.outreach.confirmations.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn initial_pricing_uses_offer_multipliers() {
    let harness = HarnessBuilder::new(vec![]).build();
    negotiate(&harness, fast_negotiation()).await;

    let log = harness.calls.log.lock().unwrap();
    let (id, pricing) = &log[0];
    assert_eq!(id, "c1");
    assert!((pricing.initial_offer - 1_900.0).abs() < 1e-9);
    assert!((pricing.max_offer - 2_500.0).abs() < 1e-9);
}

#[tokio::test]
async fn low_confidence_goes_through_human_review() {
    let call = CallResult::new("conv", CallOutcome::Accepted, 0.6).with_rate(2_000.0);
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Respond(call)))
        .build();
    let record = negotiate(&harness, fast_negotiation()).await;

    assert_eq!(record.phase(), NegotiationPhase::Completed);
    assert_eq!(
        harness.approver.kinds(),
        vec![ApprovalKind::HumanReview, ApprovalKind::SponsorApproval]
    );
    let review = record.human_decision.as_ref().unwrap();
    assert_eq!(review.decision, HumanDecision::Approve);
    assert_eq!(review.notes.as_deref(), Some("scripted"));
    assert!(path(&record).contains(&(
        NegotiationPhase::PostCallAnalysis,
        NegotiationPhase::HumanReview
    )));
}

#[tokio::test]
async fn follow_up_rate_supersedes_call_rate() {
    let call = CallResult::new("conv", CallOutcome::NeedsFollowUp, 0.9).with_rate(2_500.0);
    let outreach = ScriptedOutreach::default().script(
        "c1",
        vec![FollowUpResult::new(CallOutcome::Accepted).with_rate(2_800.0)],
    );
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Respond(call)))
        .outreach(outreach)
        .build();
    let record = negotiate(&harness, fast_negotiation()).await;

    assert_eq!(record.phase(), NegotiationPhase::Completed);
    assert_eq!(record.follow_ups().len(), 1);
    assert_eq!(record.agreed_rate(), 2_800.0);
    assert_eq!(record.final_outcome.as_ref().unwrap().final_rate, 2_800.0);

    let sponsor_request = harness.approver.seen.lock().unwrap()[0].clone();
    assert_eq!(sponsor_request.proposed_rate, 2_800.0);
}

// ── Follow-up bound ──────────────────────────────────────────────────

#[tokio::test]
async fn three_inconclusive_follow_ups_fail() {
    let call = CallResult::new("conv", CallOutcome::NeedsFollowUp, 0.9);
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Respond(call)))
        .build();
    let record = negotiate(&harness, fast_negotiation()).await;

    assert_eq!(record.phase(), NegotiationPhase::Failed);
    assert_eq!(record.follow_ups().len(), 3);
    assert_eq!(
        record.failure_reason,
        Some(FailureReason::FollowUpsExhausted { attempts: 3 })
    );
    let attempts: Vec<u32> = harness
        .outreach
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.attempt)
        .collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(harness.approver.kinds().is_empty());
}

#[tokio::test]
async fn follow_ups_capped_at_three_whatever_the_config() {
    let call = CallResult::new("conv", CallOutcome::NeedsFollowUp, 0.9);
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Respond(call)))
        .build();
    let mut config = fast_negotiation();
    config.max_follow_ups = 5;
    let record = negotiate(&harness, config).await;

    assert_eq!(record.phase(), NegotiationPhase::Failed);
    assert_eq!(record.follow_ups().len(), MAX_FOLLOW_UPS as usize);
    assert_eq!(
        record.failure_reason,
        Some(FailureReason::FollowUpsExhausted { attempts: 3 })
    );
    assert_eq!(harness.outreach.requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn sponsor_revisions_share_the_follow_up_budget() {
    let outreach =
        ScriptedOutreach::new(FollowUpResult::new(CallOutcome::Accepted).with_rate(2_100.0));
    let harness = HarnessBuilder::new(vec![])
        .outreach(outreach)
        .sponsor(Some(SponsorDecision::NeedsRevision))
        .build();
    let record = negotiate(&harness, fast_negotiation()).await;

    assert_eq!(record.phase(), NegotiationPhase::Failed);
    assert_eq!(record.follow_ups().len(), 3);
    assert_eq!(
        record.failure_reason,
        Some(FailureReason::FollowUpsExhausted { attempts: 3 })
    );
    // initial + one per follow-up
    assert_eq!(harness.approver.kinds().len(), 4);
}

// ── Failure paths ────────────────────────────────────────────────────

#[tokio::test]
async fn declined_call_fails_without_approvals() {
    let call = CallResult::new("conv", CallOutcome::Declined, 0.95);
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Respond(call)))
        .build();
    let record = negotiate(&harness, fast_negotiation()).await;

    assert_eq!(record.failure_reason, Some(FailureReason::Declined));
    assert!(record.call_analysis.is_some());
    assert!(harness.approver.kinds().is_empty());
    assert!(record.is_complete());
    assert!(!record.is_successful());
}

#[tokio::test]
async fn human_reject_and_escalate_fail() {
    for (decision, reason) in [
        (HumanDecision::Reject, FailureReason::HumanRejected),
        (HumanDecision::Escalate, FailureReason::Escalated),
    ] {
        let call = CallResult::new("conv", CallOutcome::Unclear, 0.9);
        let harness = HarnessBuilder::new(vec![])
            .calls(ScriptedCalls::new(CallScript::Respond(call)))
            .human(Some(decision))
            .build();
        let record = negotiate(&harness, fast_negotiation()).await;
        assert_eq!(record.failure_reason, Some(reason));
        assert_eq!(harness.approver.kinds(), vec![ApprovalKind::HumanReview]);
    }
}

#[tokio::test]
async fn human_review_timeout_expires_request() {
    let call = CallResult::new("conv", CallOutcome::Unclear, 0.9);
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Respond(call)))
        .human(None)
        .build();
    let mut config = fast_negotiation();
    config.human_review_timeout_secs = 0.05;
    let record = negotiate(&harness, config).await;

    assert_eq!(
        record.failure_reason,
        Some(FailureReason::HumanReviewExpired)
    );
    let request_id = harness.approver.seen.lock().unwrap()[0].id.clone();
    assert_eq!(
        harness.gateway.status(&request_id),
        Some(RequestStatus::Expired)
    );
    assert!(harness.gateway.pending_human().is_empty());
}

#[tokio::test]
async fn sponsor_rejection_fails() {
    let harness = HarnessBuilder::new(vec![])
        .sponsor(Some(SponsorDecision::Rejected))
        .build();
    let record = negotiate(&harness, fast_negotiation()).await;
    assert_eq!(record.failure_reason, Some(FailureReason::SponsorRejected));
    assert!(record.final_outcome.is_none());
}

#[tokio::test]
async fn hanging_call_times_out() {
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Hang))
        .build();
    let mut config = fast_negotiation();
    config.call_timeout_secs = 0.05;
    let record = negotiate(&harness, config).await;

    assert_eq!(record.failure_reason, Some(FailureReason::CallTimeout));
    assert_eq!(record.phase(), NegotiationPhase::Failed);
    assert!(record.call_analysis.is_none());
}

#[tokio::test]
async fn call_failure_is_recorded() {
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Fail("line busy".into())))
        .build();
    let record = negotiate(&harness, fast_negotiation()).await;
    assert!(matches!(
        record.failure_reason,
        Some(FailureReason::CallFailed(ref msg)) if msg.contains("line busy")
    ));
}

#[tokio::test]
async fn confirmation_failure_is_recorded() {
    let mut outreach = ScriptedOutreach::default();
    outreach.fail_confirm = true;
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Respond(accepted(2_000.0))))
        .outreach(outreach)
        .build();
    let record = negotiate(&harness, fast_negotiation()).await;
    assert!(matches!(
        record.failure_reason,
        Some(FailureReason::ConfirmationFailed(_))
    ));
    assert!(record.final_outcome.is_none());
}

#[tokio::test]
async fn rate_above_remaining_budget_fails_before_sponsor() {
    let harness = HarnessBuilder::new(vec![]).build();
    let machine =
        NegotiationStateMachine::new(fast_negotiation(), &harness.services(), harness.gateway.clone());
    let mut ctx = context(CancellationToken::new());
    ctx.remaining_budget = 1_500.0;
    let record = machine
        .run(&candidate("c1", 1_500.0), PoolTier::Primary, &ctx)
        .await;

    assert_eq!(
        record.failure_reason,
        Some(FailureReason::OverBudget {
            rate: 2_000.0,
            remaining: 1_500.0
        })
    );
    assert!(record.sponsor_decision.is_none());
    assert!(harness.approver.kinds().is_empty());
    assert!(harness.outreach.confirmations.lock().unwrap().is_empty());
}

// ── Cancellation ─────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_during_review_withdraws_request() {
    let call = CallResult::new("conv", CallOutcome::Unclear, 0.9);
    let harness = HarnessBuilder::new(vec![])
        .calls(ScriptedCalls::new(CallScript::Respond(call)))
        .human(None)
        .build();
    let mut config = fast_negotiation();
    config.human_review_timeout_secs = 60.0;

    let machine = NegotiationStateMachine::new(config, &harness.services(), harness.gateway.clone());
    let cancel = CancellationToken::new();
    let ctx = context(cancel.clone());
    let task = tokio::spawn(async move {
        machine
            .run(&candidate("c1", 2_000.0), PoolTier::Primary, &ctx)
            .await
    });

    let gateway = Arc::clone(&harness.gateway);
    assert!(eventually(|| !gateway.pending_human().is_empty()).await);
    let request_id = gateway.pending_human()[0].id.clone();
    cancel.cancel();

    let record = task.await.unwrap();
    assert_eq!(record.failure_reason, Some(FailureReason::Cancelled));
    assert_eq!(gateway.status(&request_id), Some(RequestStatus::Withdrawn));
    assert!(gateway.pending_human().is_empty());
}

#[tokio::test]
async fn cancelled_before_start_never_calls() {
    let harness = HarnessBuilder::new(vec![]).build();
    let machine =
        NegotiationStateMachine::new(fast_negotiation(), &harness.services(), harness.gateway.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let record = machine
        .run(&candidate("c1", 2_000.0), PoolTier::Reserve, &context(cancel))
        .await;

    assert_eq!(record.failure_reason, Some(FailureReason::Cancelled));
    assert_eq!(record.pool_tier, PoolTier::Reserve);
    assert!(harness.calls.called().is_empty());
}
