use crate::model::{AgentEvent, FlowKind, FlowOutput, LogEntry, ProgressUpdate};
use crate::state::AnalysisSnapshot;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::path::PathBuf;

pub const TAB_TITLES: [&str; 7] = [
    "Agent log",
    "Discovery",
    "Statistics",
    "Compatibility",
    "Recommendations",
    "Roadmap",
    "Help",
];
pub const HELP_TAB: usize = 6;

/// Failed flow as shown in the status row until the next flow starts.
#[derive(Debug, Clone)]
pub struct FlowError {
    pub flow: FlowKind,
    pub message: String,
    pub data_absence: bool,
}

#[derive(Default)]
pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub running: Option<FlowKind>,
    pub logs: Vec<LogEntry>,
    pub log_scroll: u16,
    pub progress: Option<ProgressUpdate>,
    pub error: Option<FlowError>,
    pub snapshot: AnalysisSnapshot,
    pub last_output: Option<(FlowKind, FlowOutput)>,
    pub last_exported_path: Option<String>,
    pub export_json: Option<PathBuf>,
}

impl UiState {
    fn push_log(&mut self, entry: LogEntry) {
        const MAX: usize = 500;
        self.logs.push(entry);
        if self.logs.len() > MAX {
            let _ = self.logs.drain(0..(self.logs.len() - MAX));
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

/// Fold one engine/controller event into the UI state.
pub fn apply_event(state: &mut UiState, ev: AgentEvent) {
    match ev {
        AgentEvent::FlowStarted { flow } => {
            state.running = Some(flow);
            state.logs.clear();
            state.log_scroll = 0;
            state.progress = Some(ProgressUpdate {
                percentage: 0.0,
                status: format!("Starting {flow}…"),
            });
            state.error = None;
            state.info = format!("{flow} started");
        }
        AgentEvent::Log(entry) => state.push_log(entry),
        AgentEvent::Progress(p) => state.progress = Some(p),
        AgentEvent::Info(info) => state.info = info.to_message(),
        AgentEvent::FlowCompleted { flow, output } => {
            state.running = None;
            state.progress = None;
            state.info = format!("{flow} complete");
            state.last_output = Some((flow, *output));
        }
        AgentEvent::FlowFailed {
            flow,
            message,
            data_absence,
        } => {
            state.running = None;
            state.progress = None;
            state.info = if data_absence {
                format!("{flow}: no results yet. Press 'd' to run a discovery.")
            } else {
                format!("{flow} failed. Press the flow key to retry.")
            };
            state.error = Some(FlowError {
                flow,
                message,
                data_absence,
            });
        }
        AgentEvent::FlowCancelled { flow } => {
            state.running = None;
            state.progress = None;
            state.info = format!("{flow} cancelled");
        }
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = remaining.len().min(line_width as usize);
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}
