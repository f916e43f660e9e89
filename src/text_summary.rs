//! Text summary builder for CLI output.
//!
//! Formats human-readable lines for text mode from a finished flow's output.

use crate::metrics;
use crate::model::{AnalysisResponse, FlowOutput};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(output: &FlowOutput) -> TextSummary {
    let lines = match output {
        FlowOutput::Analysis(a) => analysis_lines(a),
        FlowOutput::Compatibility(v) => raw_lines("Compatibility check", v),
        FlowOutput::DataGathering(v) => raw_lines("Data gathering", v),
    };
    TextSummary { lines }
}

fn analysis_lines(a: &AnalysisResponse) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(info) = a.stats.as_ref().and_then(|s| s.database_information.as_ref()) {
        lines.push(format!(
            "Database: {} {} on {} ({})",
            info.db_name, info.db_version, info.server_name, info.os
        ));
        lines.push(format!(
            "Instance: {}  Data size: {:.2} GB  Flashback: {}  Data Guard: {}",
            info.instance_type, info.data_size_gb, info.flashback_status, info.dataguard_role
        ));
    }
    if let Some(params) = a.stats.as_ref().and_then(|s| s.parameters.as_ref()) {
        for p in params.sga_target.iter().chain(params.audit_trail.iter()) {
            lines.push(format!("Parameter {}: {}", p.name, p.value));
        }
        if !params.hidden_parameters.is_empty() {
            lines.push(format!("Hidden parameters: {}", params.hidden_parameters.len()));
        }
    }
    lines.push(format!(
        "Invalid objects: {}",
        metrics::invalid_objects_total(a)
    ));

    match metrics::sharepoint_storage_gb(a) {
        Some(gb) => {
            let sp = a.sharepoint.as_ref();
            lines.push(format!(
                "SharePoint: {} sites, {} files, {:.2} GB used",
                sp.map(|s| s.total_sites).unwrap_or(0),
                sp.map(|s| s.total_files).unwrap_or(0),
                gb
            ));
        }
        None => lines.push("SharePoint: no data".into()),
    }

    if a.compatibility.is_some() {
        let (ok, bad) = metrics::compatibility_counts(a);
        lines.push(format!(
            "Compatibility: {ok} compatible, {bad} need action, {} deprecated objects",
            metrics::deprecated_objects_total(a)
        ));
        let tally = metrics::risk_tally(a);
        if !tally.is_empty() {
            let parts: Vec<String> = tally.iter().map(|(k, v)| format!("{k} {v}")).collect();
            lines.push(format!("Impact risk: {}", parts.join(", ")));
        }
    }

    for c in &a.comparison {
        lines.push(format!(
            "  {}: {} -> {} ({})",
            c.component, c.current, c.recommended, c.why
        ));
    }
    if let Some(s) = a.strategy.as_ref() {
        lines.push(format!("Strategy: {} ({})", s.how, s.when));
    }
    if !a.recommendations.is_empty() {
        lines.push(format!("Recommendations: {}", a.recommendations.len()));
        for r in &a.recommendations {
            lines.push(format!("  - {}: {}", r.feature, r.description));
        }
    }
    if !a.roadmap.is_empty() {
        lines.push(format!("Roadmap: {} steps", a.roadmap.len()));
        for r in &a.roadmap {
            lines.push(format!("  - {}: {} -> {}", r.application, r.current, r.target));
        }
    }
    lines
}

fn raw_lines(title: &str, v: &serde_json::Value) -> Vec<String> {
    let mut lines = vec![format!("{title} finished")];
    if !v.is_null() {
        let body = serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string());
        lines.extend(body.lines().map(str::to_owned));
    }
    lines
}
