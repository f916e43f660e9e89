//! Post-flow processing utilities.
//!
//! Handles exports after a flow completes so TUI and text modes report them the same way.

use crate::model::{FlowKind, FlowOutput};
use crate::storage::{self, ExportRecord};
use std::path::Path;

/// Result of post-flow processing, ready for presentation layers.
pub(crate) struct ProcessedFlow {
    pub record: ExportRecord,
    pub export_messages: Vec<String>,
}

/// Wrap a finished flow into an export record and write it when an export path was requested.
pub(crate) fn process_flow_completion(
    export_json: Option<&Path>,
    flow: FlowKind,
    output: &FlowOutput,
) -> ProcessedFlow {
    let record = ExportRecord::new(flow, output.clone());

    let mut export_messages = Vec::new();
    if let Some(export_path) = export_json {
        match storage::export_json(export_path, &record) {
            Ok(()) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedFlow {
        record,
        export_messages,
    }
}
