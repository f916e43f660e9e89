//! Fill in optional blocks missing from a primary analysis response.
//!
//! Each missing block gets exactly one supplementary request; the requests run
//! in parallel and a failed one only leaves its block absent.

use crate::engine::agent::AgentClient;
use reqwest::{Method, Url};
use serde_json::Value;

const STATS_KEY: &str = "stats";
const SHAREPOINT_KEY: &str = "sharepoint";
const COMPATIBILITY_KEY: &str = "compatibility";

fn is_missing(primary: &Value, key: &str) -> bool {
    primary.get(key).map_or(true, Value::is_null)
}

/// Blocks of `primary` that enrichment would fetch, in request order.
pub(crate) fn missing_blocks(primary: &Value) -> Vec<&'static str> {
    [STATS_KEY, SHAREPOINT_KEY, COMPATIBILITY_KEY]
        .into_iter()
        .filter(|key| is_missing(primary, key))
        .collect()
}

pub(crate) async fn enrich_analysis(client: &AgentClient, mut primary: Value) -> Value {
    if !primary.is_object() {
        return primary;
    }
    let missing = missing_blocks(&primary);
    if missing.is_empty() {
        return primary;
    }
    tracing::debug!(?missing, "enriching analysis");
    let need_stats = missing.contains(&STATS_KEY);
    let need_sharepoint = missing.contains(&SHAREPOINT_KEY);
    let need_compatibility = missing.contains(&COMPATIBILITY_KEY);
    let endpoints = client.endpoints();

    let stats = async {
        if need_stats {
            fetch_stats_block(client, &endpoints.database_stats, "database").await
        } else {
            None
        }
    };
    let sharepoint = async {
        if need_sharepoint {
            fetch_stats_block(client, &endpoints.sharepoint_stats, "sharepoint").await
        } else {
            None
        }
    };
    let compatibility = async {
        if need_compatibility {
            fetch_compatibility(client, &endpoints.compatibility_matrix).await
        } else {
            None
        }
    };

    let (stats, sharepoint, compatibility) = tokio::join!(stats, sharepoint, compatibility);

    let Some(obj) = primary.as_object_mut() else {
        return primary;
    };
    if let Some(v) = stats {
        obj.insert(STATS_KEY.into(), v);
    }
    if let Some(v) = sharepoint {
        obj.insert(SHAREPOINT_KEY.into(), v);
    }
    if let Some(v) = compatibility {
        obj.insert(COMPATIBILITY_KEY.into(), v);
    }
    primary
}

/// Stats endpoints answer with a list of typed blocks; only the one matching
/// `stats_type` is used. Without a match the block stays absent.
async fn fetch_stats_block(client: &AgentClient, url: &Url, stats_type: &str) -> Option<Value> {
    match client.request_json(Method::GET, url).await {
        Ok(Value::Array(items)) => {
            let picked = items
                .into_iter()
                .find(|item| item.get("stats_type").and_then(Value::as_str) == Some(stats_type));
            if picked.is_none() {
                tracing::warn!(url = url.as_str(), stats_type, "no matching stats block, leaving block absent");
            }
            picked
        }
        Ok(v @ Value::Object(_)) => Some(v),
        Ok(_) => {
            tracing::warn!(url = url.as_str(), stats_type, "unexpected stats payload, leaving block absent");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, stats_type, "supplementary stats fetch failed");
            None
        }
    }
}

/// Only the first matrix is kept, as a one-element list.
async fn fetch_compatibility(client: &AgentClient, url: &Url) -> Option<Value> {
    match client.request_json(Method::GET, url).await {
        Ok(Value::Array(items)) => items.into_iter().next().map(|first| Value::Array(vec![first])),
        Ok(_) => {
            tracing::warn!(url = url.as_str(), "unexpected compatibility payload, leaving block absent");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "supplementary compatibility fetch failed");
            None
        }
    }
}
