//! Shared application state: the latest results, the loading flag and the last error.
//!
//! Readers subscribe to a `watch` channel. Writes go through two doors only:
//! the `LoadingGuard` handed to the running flow, and the explicit reset
//! actions. `begin` hands out at most one guard at a time.

use crate::error::AgentError;
use crate::model::{AnalysisResponse, FlowKind, FlowOutput};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
pub struct AnalysisSnapshot {
    pub analysis: Option<Arc<AnalysisResponse>>,
    pub compatibility: Option<Value>,
    pub gathered: Option<Value>,
    pub loading: bool,
    pub active: Option<FlowKind>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisState {
    tx: Arc<watch::Sender<AnalysisSnapshot>>,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AnalysisSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        self.tx.borrow().clone()
    }

    /// Claim the loading slot for `flow`. Clears the previous error.
    pub fn begin(&self, flow: FlowKind) -> Result<LoadingGuard, AgentError> {
        let mut busy = None;
        self.tx.send_if_modified(|s| {
            if let Some(active) = s.active.filter(|_| s.loading) {
                busy = Some(active);
                return false;
            }
            s.loading = true;
            s.active = Some(flow);
            s.error = None;
            true
        });
        if let Some(active) = busy {
            return Err(AgentError::Busy { active });
        }
        Ok(LoadingGuard {
            state: self.clone(),
            flow,
            finished: false,
        })
    }

    /// Drop all results and the error. Refused while a flow holds the slot.
    pub fn reset(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if s.loading {
                return false;
            }
            *s = AnalysisSnapshot::default();
            true
        })
    }
}

/// Write access for one flow invocation. Clears the loading flag exactly once:
/// on `succeed`, on `fail`, or when dropped because the flow was torn down.
#[derive(Debug)]
pub struct LoadingGuard {
    state: AnalysisState,
    flow: FlowKind,
    finished: bool,
}

impl LoadingGuard {
    pub fn succeed(mut self, output: &FlowOutput) {
        self.finished = true;
        self.state.tx.send_modify(|s| {
            match output {
                FlowOutput::Analysis(a) => s.analysis = Some(Arc::new((**a).clone())),
                FlowOutput::Compatibility(v) => s.compatibility = Some(v.clone()),
                FlowOutput::DataGathering(v) => s.gathered = Some(v.clone()),
            }
            s.error = None;
            s.loading = false;
            s.active = None;
        });
    }

    pub fn fail(mut self, error: &AgentError) {
        self.finished = true;
        let message = error.to_string();
        self.state.tx.send_modify(|s| {
            s.error = Some(message);
            s.loading = false;
            s.active = None;
        });
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::debug!(flow = %self.flow, "flow torn down before completion");
        self.state.tx.send_modify(|s| {
            s.loading = false;
            s.active = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn second_begin_is_refused_while_loading() {
        let state = AnalysisState::new();
        let guard = state.begin(FlowKind::Analyze).unwrap();
        assert!(state.snapshot().loading);

        match state.begin(FlowKind::Compatibility) {
            Err(AgentError::Busy { active }) => assert_eq!(active, FlowKind::Analyze),
            other => panic!("expected busy, got {other:?}"),
        }

        guard.succeed(&FlowOutput::Compatibility(json!({"ok": true})));
        let snap = state.snapshot();
        assert!(!snap.loading);
        assert!(snap.active.is_none());
        assert_eq!(snap.compatibility, Some(json!({"ok": true})));
        assert!(state.begin(FlowKind::Gather).is_ok());
    }

    #[test]
    fn fail_records_error_and_new_invocation_clears_it() {
        let state = AnalysisState::new();
        let guard = state.begin(FlowKind::Analyze).unwrap();
        guard.fail(&AgentError::EmptyResult {
            url: "http://agent/api/Metrics".into(),
        });
        let snap = state.snapshot();
        assert!(!snap.loading);
        assert!(snap.error.as_deref().unwrap().contains("no data returned"));

        let _guard = state.begin(FlowKind::Analyze).unwrap();
        assert!(state.snapshot().error.is_none());
        assert!(state.snapshot().loading);
    }

    #[test]
    fn dropped_guard_clears_loading_without_touching_results() {
        let state = AnalysisState::new();
        state
            .begin(FlowKind::Gather)
            .unwrap()
            .succeed(&FlowOutput::DataGathering(json!(1)));

        let guard = state.begin(FlowKind::Gather).unwrap();
        drop(guard);
        let snap = state.snapshot();
        assert!(!snap.loading);
        assert_eq!(snap.gathered, Some(json!(1)));
        assert!(snap.error.is_none());
    }

    #[test]
    fn loading_flag_changes_once_per_terminal_event() {
        let state = AnalysisState::new();
        let mut rx = state.subscribe();
        rx.mark_unchanged();

        let guard = state.begin(FlowKind::Analyze).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().loading);

        guard.fail(&AgentError::Timeout {
            url: "http://agent/api/Metrics".into(),
        });
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().loading);
        // The consumed guard cannot write again.
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn reset_is_refused_while_loading() {
        let state = AnalysisState::new();
        let guard = state.begin(FlowKind::Analyze).unwrap();
        assert!(!state.reset());
        drop(guard);
        assert!(state.reset());
        assert!(state.snapshot().analysis.is_none());
    }
}
