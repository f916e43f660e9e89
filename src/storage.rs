use crate::model::{FlowKind, FlowOutput};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A flow output as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub exported_at_utc: String,
    pub flow: FlowKind,
    pub output: FlowOutput,
}

impl ExportRecord {
    pub fn new(flow: FlowKind, output: FlowOutput) -> Self {
        Self {
            exported_at_utc: now_rfc3339(),
            flow,
            output,
        }
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

pub fn export_json(path: &Path, record: &ExportRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export directory {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(record)?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// File name in `dir` for an export made now, e.g. `discovery-agent-analyze-20250101T101500Z.json`.
pub fn timestamped_export_path(dir: &Path, flow: FlowKind) -> PathBuf {
    let fmt = time::macros::format_description!("[year][month][day]T[hour][minute][second]Z");
    let stamp = time::OffsetDateTime::now_utc()
        .format(&fmt)
        .unwrap_or_else(|_| "now".into());
    let flow = serde_json::to_value(flow)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_else(|| "flow".into());
    dir.join(format!("discovery-agent-{flow}-{stamp}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn export_writes_record_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        let record = ExportRecord::new(FlowKind::Gather, FlowOutput::DataGathering(json!({"os": "linux"})));
        export_json(&path, &record).unwrap();

        let back: ExportRecord =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back.flow, FlowKind::Gather);
        assert!(!back.exported_at_utc.is_empty());
        match back.output {
            FlowOutput::DataGathering(v) => assert_eq!(v["os"], "linux"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn timestamped_path_names_the_flow() {
        let p = timestamped_export_path(Path::new("/tmp"), FlowKind::Compatibility);
        let name = p.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("discovery-agent-compatibility-"));
        assert!(name.ends_with("Z.json"));
    }
}
