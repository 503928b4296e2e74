//! Approval gateway: process-wide FIFO queues for human review and
//! sponsor approval.
//!
//! Each enqueued request carries a one-shot channel back to the negotiation
//! waiting on it, so `resolve` can be called from any task (API handler,
//! notifier callback, sweeper) without the waiter polling.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::request::{
    ApprovalDecision, ApprovalId, ApprovalKind, ApprovalRequest, HumanDecision, RequestStatus,
    SponsorDecision,
};
use crate::events::{SharedEventBus, WorkflowEvent};

/// Errors from gateway operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalError {
    #[error("Approval request already exists: {request_id}")]
    DuplicateRequest { request_id: ApprovalId },

    #[error("Approval request not found: {request_id}")]
    NotFound { request_id: ApprovalId },

    #[error("Approval request {request_id} is a {expected} request, got a {got} decision")]
    KindMismatch {
        request_id: ApprovalId,
        expected: ApprovalKind,
        got: ApprovalKind,
    },
}

/// Result type for gateway operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;

/// Shared reference to ApprovalGateway
pub type SharedApprovalGateway = Arc<ApprovalGateway>;

/// What the waiting side receives.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalResolution {
    Decided {
        decision: ApprovalDecision,
        notes: Option<String>,
    },
    Expired,
    Withdrawn,
}

/// Outcome of a `resolve` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Decision delivered.
    Resolved,
    /// Request was already closed; nothing changed.
    AlreadyClosed(RequestStatus),
}

/// Outcome of waiting on a pending approval.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Decided {
        decision: ApprovalDecision,
        notes: Option<String>,
    },
    /// Swept past its deadline by the gateway.
    Expired,
    /// Local wait bound elapsed before any decision.
    TimedOut,
    Cancelled,
}

/// Handle returned by `enqueue`; resolves when a decision arrives.
#[derive(Debug)]
pub struct PendingApproval {
    pub request_id: ApprovalId,
    pub kind: ApprovalKind,
    receiver: oneshot::Receiver<ApprovalResolution>,
}

impl PendingApproval {
    /// Wait for a decision, bounded by `timeout` and raced against `cancel`.
    pub async fn wait(self, timeout: Duration, cancel: &CancellationToken) -> WaitOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
            res = tokio::time::timeout(timeout, self.receiver) => match res {
                Ok(Ok(ApprovalResolution::Decided { decision, notes })) => {
                    WaitOutcome::Decided { decision, notes }
                }
                Ok(Ok(ApprovalResolution::Expired)) => WaitOutcome::Expired,
                Ok(Ok(ApprovalResolution::Withdrawn)) => WaitOutcome::Cancelled,
                // Sender dropped without answering: treat like an expiry.
                Ok(Err(_)) => WaitOutcome::Expired,
                Err(_) => WaitOutcome::TimedOut,
            },
        }
    }
}

struct QueuedApproval {
    request: ApprovalRequest,
    responder: oneshot::Sender<ApprovalResolution>,
}

struct ClosedApproval {
    status: RequestStatus,
    closed_at: DateTime<Utc>,
}

#[derive(Default)]
struct Queues {
    human: VecDeque<QueuedApproval>,
    sponsor: VecDeque<QueuedApproval>,
    /// Closed ids, kept so late decisions read as `AlreadyClosed`. Pruned
    /// by age on every sweep.
    closed: HashMap<ApprovalId, ClosedApproval>,
}

impl Queues {
    fn queue_mut(&mut self, kind: ApprovalKind) -> &mut VecDeque<QueuedApproval> {
        match kind {
            ApprovalKind::HumanReview => &mut self.human,
            ApprovalKind::SponsorApproval => &mut self.sponsor,
        }
    }

    fn locate(&self, request_id: &str) -> Option<(ApprovalKind, usize)> {
        if let Some(i) = self.human.iter().position(|q| q.request.id == request_id) {
            return Some((ApprovalKind::HumanReview, i));
        }
        self.sponsor
            .iter()
            .position(|q| q.request.id == request_id)
            .map(|i| (ApprovalKind::SponsorApproval, i))
    }

    /// Remove a queued request and close it with `status`.
    fn close(&mut self, request_id: &str, status: RequestStatus) -> Option<QueuedApproval> {
        let (kind, index) = self.locate(request_id)?;
        let entry = self.queue_mut(kind).remove(index)?;
        self.mark_closed(&entry.request.id, status);
        Some(entry)
    }

    fn mark_closed(&mut self, request_id: &str, status: RequestStatus) {
        self.closed.insert(
            request_id.to_string(),
            ClosedApproval {
                status,
                closed_at: Utc::now(),
            },
        );
    }

    /// Forget closed ids older than `retention`. Returns how many were dropped.
    fn prune_closed(&mut self, now: DateTime<Utc>, retention: ChronoDuration) -> usize {
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return 0;
        };
        let before = self.closed.len();
        self.closed.retain(|_, c| c.closed_at > cutoff);
        before - self.closed.len()
    }
}

/// How long a closed request id is remembered by default.
fn default_closed_retention() -> ChronoDuration {
    ChronoDuration::hours(24)
}

/// Shared human-review and sponsor-approval queues.
pub struct ApprovalGateway {
    queues: Mutex<Queues>,
    events: Option<SharedEventBus>,
    closed_retention: ChronoDuration,
}

impl ApprovalGateway {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            events: None,
            closed_retention: default_closed_retention(),
        }
    }

    /// Publish request/resolution events on `bus`.
    pub fn with_events(bus: SharedEventBus) -> Self {
        Self {
            events: Some(bus),
            ..Self::new()
        }
    }

    /// How long closed request ids are remembered before a sweep drops them.
    pub fn with_closed_retention(mut self, retention: ChronoDuration) -> Self {
        self.closed_retention = retention;
        self
    }

    /// Create a shared reference to this gateway
    pub fn shared(self) -> SharedApprovalGateway {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    fn publish_closed(&self, request: &ApprovalRequest, status: RequestStatus) {
        self.publish(WorkflowEvent::ApprovalClosed {
            workflow_id: request.workflow_id.clone(),
            request_id: request.id.clone(),
            kind: request.kind,
            status,
            timestamp: Utc::now(),
        });
    }

    /// Append a request to its queue.
    pub fn enqueue(&self, request: ApprovalRequest) -> ApprovalResult<PendingApproval> {
        let (tx, rx) = oneshot::channel();
        let pending = PendingApproval {
            request_id: request.id.clone(),
            kind: request.kind,
            receiver: rx,
        };
        let event = WorkflowEvent::ApprovalRequested {
            workflow_id: request.workflow_id.clone(),
            request_id: request.id.clone(),
            kind: request.kind,
            priority: request.priority,
            timestamp: Utc::now(),
        };

        {
            let mut queues = self.lock();
            if queues.closed.contains_key(&request.id) || queues.locate(&request.id).is_some() {
                return Err(ApprovalError::DuplicateRequest {
                    request_id: request.id,
                });
            }
            debug!(
                request_id = %request.id,
                kind = %request.kind,
                priority = %request.priority,
                "Approval request queued"
            );
            queues.queue_mut(request.kind).push_back(QueuedApproval {
                request,
                responder: tx,
            });
        }

        self.publish(event);
        Ok(pending)
    }

    /// Deliver a decision.
    ///
    /// Resolving an already-closed request is a no-op reported as
    /// [`ResolveOutcome::AlreadyClosed`].
    pub fn resolve(
        &self,
        request_id: &str,
        decision: ApprovalDecision,
        notes: Option<String>,
    ) -> ApprovalResult<ResolveOutcome> {
        let entry = {
            let mut queues = self.lock();
            match queues.locate(request_id) {
                Some((kind, _)) if kind != decision.kind() => {
                    return Err(ApprovalError::KindMismatch {
                        request_id: request_id.to_string(),
                        expected: kind,
                        got: decision.kind(),
                    });
                }
                Some(_) => queues.close(request_id, RequestStatus::Resolved),
                None => match queues.closed.get(request_id).map(|c| c.status) {
                    Some(status) => {
                        warn!(
                            request_id,
                            status = %status,
                            "Ignoring decision for closed approval request"
                        );
                        return Ok(ResolveOutcome::AlreadyClosed(status));
                    }
                    None => {
                        return Err(ApprovalError::NotFound {
                            request_id: request_id.to_string(),
                        })
                    }
                },
            }
        };

        let Some(entry) = entry else {
            return Err(ApprovalError::NotFound {
                request_id: request_id.to_string(),
            });
        };

        info!(
            request_id,
            kind = %entry.request.kind,
            candidate = %entry.request.candidate_name,
            ?decision,
            "Approval resolved"
        );
        if entry
            .responder
            .send(ApprovalResolution::Decided { decision, notes })
            .is_err()
        {
            debug!(request_id, "Approval waiter already gone");
        }
        self.publish_closed(&entry.request, RequestStatus::Resolved);
        Ok(ResolveOutcome::Resolved)
    }

    /// Resolve a human-review request.
    pub fn submit_human_decision(
        &self,
        request_id: &str,
        decision: HumanDecision,
        notes: Option<String>,
    ) -> ApprovalResult<ResolveOutcome> {
        self.resolve(request_id, decision.into(), notes)
    }

    /// Resolve a sponsor-approval request.
    pub fn submit_sponsor_decision(
        &self,
        request_id: &str,
        decision: SponsorDecision,
        notes: Option<String>,
    ) -> ApprovalResult<ResolveOutcome> {
        self.resolve(request_id, decision.into(), notes)
    }

    fn close_with(&self, request_id: &str, status: RequestStatus) -> bool {
        let entry = self.lock().close(request_id, status);
        match entry {
            Some(entry) => {
                let resolution = match status {
                    RequestStatus::Withdrawn => ApprovalResolution::Withdrawn,
                    _ => ApprovalResolution::Expired,
                };
                let _ = entry.responder.send(resolution);
                self.publish_closed(&entry.request, status);
                true
            }
            None => false,
        }
    }

    /// Expire a single request (the waiter gave up). Returns whether it was
    /// still queued.
    pub fn expire(&self, request_id: &str) -> bool {
        let expired = self.close_with(request_id, RequestStatus::Expired);
        if expired {
            info!(request_id, "Approval request expired");
        }
        expired
    }

    /// Remove a request whose negotiation was cancelled.
    pub fn withdraw(&self, request_id: &str) -> bool {
        let withdrawn = self.close_with(request_id, RequestStatus::Withdrawn);
        if withdrawn {
            debug!(request_id, "Approval request withdrawn");
        }
        withdrawn
    }

    /// Withdraw every queued request owned by `workflow_id`.
    pub fn withdraw_workflow(&self, workflow_id: &str) -> usize {
        let ids: Vec<ApprovalId> = self
            .pending_for_workflow(workflow_id)
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.iter().filter(|id| self.withdraw(id)).count()
    }

    /// Expire every request whose deadline is at or before `now`, then drop
    /// closed ids older than the retention window.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<ApprovalId> {
        let expired: Vec<QueuedApproval> = {
            let mut queues = self.lock();
            let mut out = Vec::new();
            for kind in [ApprovalKind::HumanReview, ApprovalKind::SponsorApproval] {
                let queue = queues.queue_mut(kind);
                let (due, keep): (VecDeque<_>, VecDeque<_>) = std::mem::take(queue)
                    .into_iter()
                    .partition(|q| q.request.is_expired(now));
                *queue = keep;
                out.extend(due);
            }
            for entry in &out {
                queues.mark_closed(&entry.request.id, RequestStatus::Expired);
            }
            let pruned = queues.prune_closed(now, self.closed_retention);
            if pruned > 0 {
                debug!(pruned, "Forgot closed approval requests");
            }
            out
        };

        expired
            .into_iter()
            .map(|entry| {
                warn!(
                    request_id = %entry.request.id,
                    kind = %entry.request.kind,
                    "Approval request passed its deadline"
                );
                let _ = entry.responder.send(ApprovalResolution::Expired);
                self.publish_closed(&entry.request, RequestStatus::Expired);
                entry.request.id
            })
            .collect()
    }

    /// Periodically sweep expired requests until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let expired = gateway.sweep_expired(Utc::now());
                        if !expired.is_empty() {
                            debug!(count = expired.len(), "Sweeper expired approval requests");
                        }
                    }
                }
            }
        })
    }

    /// Snapshot of the human-review queue, oldest first.
    pub fn pending_human(&self) -> Vec<ApprovalRequest> {
        self.lock().human.iter().map(|q| q.request.clone()).collect()
    }

    /// Snapshot of the sponsor-approval queue, oldest first.
    pub fn pending_sponsor(&self) -> Vec<ApprovalRequest> {
        self.lock()
            .sponsor
            .iter()
            .map(|q| q.request.clone())
            .collect()
    }

    pub fn pending_for_workflow(&self, workflow_id: &str) -> Vec<ApprovalRequest> {
        let queues = self.lock();
        queues
            .human
            .iter()
            .chain(queues.sponsor.iter())
            .filter(|q| q.request.workflow_id == workflow_id)
            .map(|q| q.request.clone())
            .collect()
    }

    /// Current status of a request, if the gateway has seen it.
    pub fn status(&self, request_id: &str) -> Option<RequestStatus> {
        let queues = self.lock();
        if queues.locate(request_id).is_some() {
            return Some(RequestStatus::Queued);
        }
        queues.closed.get(request_id).map(|c| c.status)
    }
}

impl Default for ApprovalGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn request(kind: ApprovalKind, workflow: &str) -> ApprovalRequest {
        ApprovalRequest::new(
            kind,
            workflow,
            "neg-1",
            "cand-1",
            "Ana",
            3_000.0,
            ChronoDuration::hours(24),
        )
    }

    #[tokio::test]
    async fn test_resolve_delivers_decision() {
        let gateway = ApprovalGateway::new();
        let req = request(ApprovalKind::HumanReview, "wf-1");
        let id = req.id.clone();
        let pending = gateway.enqueue(req).unwrap();
        assert_eq!(gateway.pending_human().len(), 1);

        let outcome = gateway
            .submit_human_decision(&id, HumanDecision::Approve, Some("looks good".into()))
            .unwrap();
        assert_eq!(outcome, ResolveOutcome::Resolved);
        assert!(gateway.pending_human().is_empty());

        let waited = pending
            .wait(Duration::from_secs(1), &CancellationToken::new())
            .await;
        assert_eq!(
            waited,
            WaitOutcome::Decided {
                decision: ApprovalDecision::Human(HumanDecision::Approve),
                notes: Some("looks good".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_second_resolve_is_noop() {
        let gateway = ApprovalGateway::new();
        let req = request(ApprovalKind::SponsorApproval, "wf-1");
        let id = req.id.clone();
        let _pending = gateway.enqueue(req).unwrap();

        gateway
            .submit_sponsor_decision(&id, SponsorDecision::Approved, None)
            .unwrap();
        let again = gateway
            .submit_sponsor_decision(&id, SponsorDecision::Rejected, None)
            .unwrap();
        assert_eq!(again, ResolveOutcome::AlreadyClosed(RequestStatus::Resolved));
        assert_eq!(gateway.status(&id), Some(RequestStatus::Resolved));
    }

    #[test]
    fn test_unknown_and_mismatched_requests() {
        let gateway = ApprovalGateway::new();
        let err = gateway
            .submit_human_decision("review-missing", HumanDecision::Reject, None)
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NotFound { .. }));

        let req = request(ApprovalKind::HumanReview, "wf-1");
        let id = req.id.clone();
        let _pending = gateway.enqueue(req).unwrap();
        let err = gateway
            .submit_sponsor_decision(&id, SponsorDecision::Approved, None)
            .unwrap_err();
        assert!(matches!(err, ApprovalError::KindMismatch { .. }));
        // still queued after the rejected attempt
        assert_eq!(gateway.status(&id), Some(RequestStatus::Queued));
    }

    #[test]
    fn test_duplicate_enqueue_rejected() {
        let gateway = ApprovalGateway::new();
        let req = request(ApprovalKind::HumanReview, "wf-1");
        let _pending = gateway.enqueue(req.clone()).unwrap();
        assert!(matches!(
            gateway.enqueue(req).unwrap_err(),
            ApprovalError::DuplicateRequest { .. }
        ));
    }

    #[test]
    fn test_fifo_order() {
        let gateway = ApprovalGateway::new();
        let first = request(ApprovalKind::HumanReview, "wf-1");
        let second = request(ApprovalKind::HumanReview, "wf-2");
        let ids = vec![first.id.clone(), second.id.clone()];
        let _a = gateway.enqueue(first).unwrap();
        let _b = gateway.enqueue(second).unwrap();
        let queued: Vec<_> = gateway.pending_human().into_iter().map(|r| r.id).collect();
        assert_eq!(queued, ids);
    }

    #[tokio::test]
    async fn test_sweep_expires_past_deadline() {
        let gateway = ApprovalGateway::new();
        let stale = request(ApprovalKind::SponsorApproval, "wf-1")
            .with_deadline(Utc::now() - ChronoDuration::minutes(1));
        let fresh = request(ApprovalKind::SponsorApproval, "wf-1");
        let stale_id = stale.id.clone();
        let stale_pending = gateway.enqueue(stale).unwrap();
        let _fresh_pending = gateway.enqueue(fresh).unwrap();

        let expired = gateway.sweep_expired(Utc::now());
        assert_eq!(expired, vec![stale_id.clone()]);
        assert_eq!(gateway.pending_sponsor().len(), 1);

        let waited = stale_pending
            .wait(Duration::from_secs(1), &CancellationToken::new())
            .await;
        assert_eq!(waited, WaitOutcome::Expired);

        // A late decision is ignored.
        let late = gateway
            .submit_sponsor_decision(&stale_id, SponsorDecision::Approved, None)
            .unwrap();
        assert_eq!(late, ResolveOutcome::AlreadyClosed(RequestStatus::Expired));
    }

    #[test]
    fn test_sweep_forgets_old_closed_requests() {
        let gateway = ApprovalGateway::new().with_closed_retention(ChronoDuration::hours(1));
        let req = request(ApprovalKind::HumanReview, "wf-1");
        let id = req.id.clone();
        let _pending = gateway.enqueue(req).unwrap();
        assert!(gateway.withdraw(&id));

        gateway.sweep_expired(Utc::now());
        assert_eq!(gateway.status(&id), Some(RequestStatus::Withdrawn));

        gateway.sweep_expired(Utc::now() + ChronoDuration::hours(2));
        assert_eq!(gateway.status(&id), None);
        assert!(matches!(
            gateway.submit_human_decision(&id, HumanDecision::Approve, None),
            Err(ApprovalError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let gateway = ApprovalGateway::new();
        let pending = gateway
            .enqueue(request(ApprovalKind::HumanReview, "wf-1"))
            .unwrap();
        let waited = pending
            .wait(Duration::from_millis(20), &CancellationToken::new())
            .await;
        assert_eq!(waited, WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let gateway = ApprovalGateway::new();
        let pending = gateway
            .enqueue(request(ApprovalKind::HumanReview, "wf-1"))
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let waited = pending.wait(Duration::from_secs(5), &cancel).await;
        assert_eq!(waited, WaitOutcome::Cancelled);
    }

    #[test]
    fn test_withdraw_workflow() {
        let gateway = ApprovalGateway::new();
        let _a = gateway
            .enqueue(request(ApprovalKind::HumanReview, "wf-1"))
            .unwrap();
        let _b = gateway
            .enqueue(request(ApprovalKind::SponsorApproval, "wf-1"))
            .unwrap();
        let _c = gateway
            .enqueue(request(ApprovalKind::HumanReview, "wf-2"))
            .unwrap();

        assert_eq!(gateway.withdraw_workflow("wf-1"), 2);
        assert!(gateway.pending_for_workflow("wf-1").is_empty());
        assert_eq!(gateway.pending_for_workflow("wf-2").len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_from_many_tasks() {
        let gateway = ApprovalGateway::new().shared();
        let mut waiters = Vec::new();
        let mut ids = Vec::new();
        for i in 0..16 {
            let req = request(ApprovalKind::HumanReview, &format!("wf-{i}"));
            ids.push(req.id.clone());
            waiters.push(gateway.enqueue(req).unwrap());
        }

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let gw = Arc::clone(&gateway);
                tokio::spawn(async move {
                    gw.submit_human_decision(&id, HumanDecision::Approve, None)
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), ResolveOutcome::Resolved);
        }

        let token = CancellationToken::new();
        for w in waiters {
            assert!(matches!(
                w.wait(Duration::from_secs(1), &token).await,
                WaitOutcome::Decided { .. }
            ));
        }
        assert!(gateway.pending_human().is_empty());
    }
}
