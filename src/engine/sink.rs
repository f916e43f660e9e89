//! Presentation sink: where timeline entries, progress and outcomes are delivered.

use crate::error::AgentError;
use crate::model::{AgentEvent, FlowKind, FlowOutput, LogEntry, ProgressUpdate};
use tokio::sync::mpsc::UnboundedSender;

/// Receiver of everything a running flow wants shown. Callbacks must not block.
pub trait PresentationSink: Send + Sync {
    fn on_log_entry(&self, entry: &LogEntry);
    fn on_progress(&self, update: &ProgressUpdate);
    fn on_complete(&self, flow: FlowKind, output: &FlowOutput);
    fn on_error(&self, flow: FlowKind, error: &AgentError);
}

/// Channel-backed sink used by the TUI and text modes. Send failures mean the UI went away.
impl PresentationSink for UnboundedSender<AgentEvent> {
    fn on_log_entry(&self, entry: &LogEntry) {
        let _ = self.send(AgentEvent::Log(entry.clone()));
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        let _ = self.send(AgentEvent::Progress(update.clone()));
    }

    fn on_complete(&self, flow: FlowKind, output: &FlowOutput) {
        let _ = self.send(AgentEvent::FlowCompleted {
            flow,
            output: Box::new(output.clone()),
        });
    }

    fn on_error(&self, flow: FlowKind, error: &AgentError) {
        let _ = self.send(AgentEvent::FlowFailed {
            flow,
            message: error.to_string(),
            data_absence: error.is_data_absence(),
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Debug, Clone)]
    pub(crate) enum Recorded {
        Log(LogEntry),
        Progress(ProgressUpdate),
        Complete(FlowKind),
        Error(FlowKind, String),
    }

    /// Records every callback with the (virtual) instant it happened at.
    pub(crate) struct RecordingSink {
        started: Instant,
        events: Mutex<Vec<(u64, Recorded)>>,
    }

    impl RecordingSink {
        pub(crate) fn new() -> Self {
            Self {
                started: Instant::now(),
                events: Mutex::new(Vec::new()),
            }
        }

        fn push(&self, ev: Recorded) {
            let at = self.started.elapsed().as_millis() as u64;
            self.events.lock().unwrap().push((at, ev));
        }

        pub(crate) fn events(&self) -> Vec<(u64, Recorded)> {
            self.events.lock().unwrap().clone()
        }

        pub(crate) fn log_times(&self) -> Vec<u64> {
            self.events()
                .into_iter()
                .filter_map(|(at, ev)| matches!(ev, Recorded::Log(_)).then_some(at))
                .collect()
        }

        pub(crate) fn progress(&self) -> Vec<ProgressUpdate> {
            self.events()
                .into_iter()
                .filter_map(|(_, ev)| match ev {
                    Recorded::Progress(p) => Some(p),
                    _ => None,
                })
                .collect()
        }
    }

    impl PresentationSink for RecordingSink {
        fn on_log_entry(&self, entry: &LogEntry) {
            self.push(Recorded::Log(entry.clone()));
        }

        fn on_progress(&self, update: &ProgressUpdate) {
            self.push(Recorded::Progress(update.clone()));
        }

        fn on_complete(&self, flow: FlowKind, _output: &FlowOutput) {
            self.push(Recorded::Complete(flow));
        }

        fn on_error(&self, flow: FlowKind, error: &AgentError) {
            self.push(Recorded::Error(flow, error.to_string()));
        }
    }
}
