//! Workflow registry: live workflows by id.
//!
//! An explicit, injected service. Each entry owns the workflow's
//! cancellation token, the receiving end of its state channel and the task
//! running it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::state::WorkflowState;

/// Shared registry handle
pub type SharedWorkflowRegistry = Arc<WorkflowRegistry>;

/// One registered workflow.
pub struct WorkflowEntry {
    pub cancel: CancellationToken,
    pub state: watch::Receiver<WorkflowState>,
    pub handle: Option<JoinHandle<WorkflowState>>,
}

impl WorkflowEntry {
    pub fn snapshot(&self) -> WorkflowState {
        self.state.borrow().clone()
    }
}

#[derive(Default)]
pub struct WorkflowRegistry {
    entries: RwLock<HashMap<String, WorkflowEntry>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedWorkflowRegistry {
        Arc::new(self)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, WorkflowEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, WorkflowEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a workflow. Replaces (and cancels) an entry with the same id.
    pub fn create(&self, workflow_id: impl Into<String>, entry: WorkflowEntry) {
        let workflow_id = workflow_id.into();
        if let Some(old) = self.write().insert(workflow_id.clone(), entry) {
            old.cancel.cancel();
        }
        debug!(%workflow_id, "Workflow registered");
    }

    /// Latest state snapshot.
    pub fn get(&self, workflow_id: &str) -> Option<WorkflowState> {
        self.read().get(workflow_id).map(WorkflowEntry::snapshot)
    }

    pub fn contains(&self, workflow_id: &str) -> bool {
        self.read().contains_key(workflow_id)
    }

    /// A fresh receiver for the workflow's state channel.
    pub fn subscribe(&self, workflow_id: &str) -> Option<watch::Receiver<WorkflowState>> {
        self.read().get(workflow_id).map(|e| e.state.clone())
    }

    pub fn cancel_token(&self, workflow_id: &str) -> Option<CancellationToken> {
        self.read().get(workflow_id).map(|e| e.cancel.clone())
    }

    /// Take the task handle, leaving the entry registered.
    pub fn take_handle(&self, workflow_id: &str) -> Option<JoinHandle<WorkflowState>> {
        self.write().get_mut(workflow_id).and_then(|e| e.handle.take())
    }

    pub fn remove(&self, workflow_id: &str) -> Option<WorkflowEntry> {
        let removed = self.write().remove(workflow_id);
        if removed.is_some() {
            debug!(workflow_id, "Workflow removed from registry");
        }
        removed
    }

    /// Ids of every registered workflow, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshots of workflows that have not reached a terminal phase.
    pub fn active(&self) -> Vec<WorkflowState> {
        let mut active: Vec<WorkflowState> = self
            .read()
            .values()
            .map(WorkflowEntry::snapshot)
            .filter(|s| !s.is_terminal())
            .collect();
        active.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));
        active
    }

    /// Cancel every registered workflow.
    pub fn cancel_all(&self) {
        for entry in self.read().values() {
            entry.cancel.cancel();
        }
    }

    /// Drain every task handle.
    pub fn take_all_handles(&self) -> Vec<(String, JoinHandle<WorkflowState>)> {
        self.write()
            .iter_mut()
            .filter_map(|(id, e)| e.handle.take().map(|h| (id.clone(), h)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowPhase;

    fn entry(state: WorkflowState) -> (WorkflowEntry, watch::Sender<WorkflowState>) {
        let (tx, rx) = watch::channel(state);
        (
            WorkflowEntry {
                cancel: CancellationToken::new(),
                state: rx,
                handle: None,
            },
            tx,
        )
    }

    #[test]
    fn test_create_get_remove() {
        let registry = WorkflowRegistry::new();
        let (e, tx) = entry(WorkflowState::new("wf-1", "camp-1"));
        registry.create("wf-1", e);

        assert_eq!(registry.list(), vec!["wf-1".to_string()]);
        assert_eq!(registry.get("wf-1").unwrap().phase, WorkflowPhase::DataCollection);

        let mut next = WorkflowState::new("wf-1", "camp-1");
        next.enter_phase(WorkflowPhase::Validation);
        tx.send_replace(next);
        assert_eq!(registry.get("wf-1").unwrap().phase, WorkflowPhase::Validation);

        assert!(registry.remove("wf-1").is_some());
        assert!(registry.get("wf-1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replacing_entry_cancels_old() {
        let registry = WorkflowRegistry::new();
        let (first, _tx1) = entry(WorkflowState::new("wf-1", "camp-1"));
        let old_token = first.cancel.clone();
        registry.create("wf-1", first);
        let (second, _tx2) = entry(WorkflowState::new("wf-1", "camp-1"));
        registry.create("wf-1", second);

        assert!(old_token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_active_excludes_terminal() {
        let registry = WorkflowRegistry::new();
        let (running, _tx1) = entry(WorkflowState::new("wf-a", "camp-1"));
        let mut done = WorkflowState::new("wf-b", "camp-2");
        done.enter_phase(WorkflowPhase::Completed);
        let (finished, _tx2) = entry(done);
        registry.create("wf-a", running);
        registry.create("wf-b", finished);

        let active = registry.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].workflow_id, "wf-a");
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_cancel_all() {
        let registry = WorkflowRegistry::new();
        let (a, _tx1) = entry(WorkflowState::new("wf-a", "camp-1"));
        let (b, _tx2) = entry(WorkflowState::new("wf-b", "camp-1"));
        let tokens = [a.cancel.clone(), b.cancel.clone()];
        registry.create("wf-a", a);
        registry.create("wf-b", b);
        registry.cancel_all();
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
    }
}
