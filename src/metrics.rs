use crate::model::AnalysisResponse;
use std::collections::BTreeMap;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Sum of invalid objects across all owners and object types.
pub fn invalid_objects_total(a: &AnalysisResponse) -> u64 {
    a.stats
        .as_ref()
        .map(|s| s.invalid_objects.iter().map(|o| o.invalid_count).sum())
        .unwrap_or(0)
}

/// SharePoint storage in GiB, or `None` when no SharePoint block is present.
pub fn sharepoint_storage_gb(a: &AnalysisResponse) -> Option<f64> {
    a.sharepoint
        .as_ref()
        .map(|sp| sp.storage_used_bytes as f64 / BYTES_PER_GB)
}

/// (compatible, incompatible) component counts across every compatibility matrix.
pub fn compatibility_counts(a: &AnalysisResponse) -> (usize, usize) {
    a.compatibility
        .iter()
        .flatten()
        .flat_map(|c| c.matrix.iter())
        .fold((0, 0), |(ok, bad), item| {
            if item.is_compatible {
                (ok + 1, bad)
            } else {
                (ok, bad + 1)
            }
        })
}

/// Deprecated objects named by the agent's detailed reasoning.
pub fn deprecated_objects_total(a: &AnalysisResponse) -> usize {
    a.compatibility
        .iter()
        .flatten()
        .flat_map(|c| c.detailed_reasoning.iter())
        .map(|r| r.deprecated_objects.len())
        .sum()
}

/// Impact entries per risk level, keyed by the lower-cased level name.
pub fn risk_tally(a: &AnalysisResponse) -> BTreeMap<String, usize> {
    let mut tally = BTreeMap::new();
    for impact in a
        .compatibility
        .iter()
        .flatten()
        .flat_map(|c| c.impact_analysis.iter())
    {
        *tally.entry(impact.risk_level.to_lowercase()).or_insert(0) += 1;
    }
    tally
}
