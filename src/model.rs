mod lenient;

use crate::engine::timeline::Timelines;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub endpoints: Endpoints,
    pub request_timeout: Option<Duration>,
    pub timeline_scale: f64,
    pub timelines: Timelines,
    pub user_agent: String,
}

/// Fully resolved URLs of every remote call the client makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub discover: Url,
    pub compatibility: Url,
    pub data_gathering: Url,
    pub metrics: Url,
    pub database_stats: Url,
    pub sharepoint_stats: Url,
    pub compatibility_matrix: Url,
}

/// One user-triggerable action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Discover the agent environment, then run the full analysis
    Discover,
    /// Run the diagnostic analysis without the discover step
    Analyze,
    /// Ask the agent for a compatibility check
    Compatibility,
    /// Ask the agent to gather OS, GitHub, Oracle and SharePoint data
    Gather,
    /// Re-fetch the latest analysis without the agent log
    Refresh,
}

impl FlowKind {
    pub fn label(self) -> &'static str {
        match self {
            FlowKind::Discover => "Discovery",
            FlowKind::Analyze => "Analysis",
            FlowKind::Compatibility => "Compatibility Check",
            FlowKind::Gather => "Data Gathering",
            FlowKind::Refresh => "Refresh",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    System,
    Success,
    Warning,
}

/// One line of an authored agent log. `offset_ms` is measured from timeline start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub category: LogCategory,
    pub offset_ms: u64,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, category: LogCategory, offset_ms: u64) -> Self {
        Self {
            message: message.into(),
            category,
            offset_ms,
        }
    }

    /// Message without the leading shell-style prompt.
    pub fn status_text(&self) -> &str {
        self.message
            .strip_prefix("> ")
            .unwrap_or(self.message.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub percentage: f64,
    pub status: String,
}

impl ProgressUpdate {
    /// Progress reached after emitting entry `index` of a timeline of `len` entries.
    pub fn for_entry(index: usize, len: usize, entry: &LogEntry) -> Self {
        Self {
            percentage: (index + 1) as f64 / len.max(1) as f64 * 100.0,
            status: entry.status_text().to_string(),
        }
    }

    pub fn complete(status: impl Into<String>) -> Self {
        Self {
            percentage: 100.0,
            status: status.into(),
        }
    }
}

/// What a successful flow hands back to presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum FlowOutput {
    Analysis(Box<AnalysisResponse>),
    Compatibility(serde_json::Value),
    DataGathering(serde_json::Value),
}

#[derive(Debug, Clone)]
pub enum AgentEvent {
    FlowStarted {
        flow: FlowKind,
    },
    Log(LogEntry),
    Progress(ProgressUpdate),
    Info(InfoEvent),
    FlowCompleted {
        flow: FlowKind,
        // Boxed to keep the event small; analysis payloads are large.
        output: Box<FlowOutput>,
    },
    FlowFailed {
        flow: FlowKind,
        message: String,
        data_absence: bool,
    },
    FlowCancelled {
        flow: FlowKind,
    },
}

/// Structured info events emitted by the controller and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    Refused { requested: FlowKind, active: FlowKind },
    Cancelling { flow: FlowKind },
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Refused { requested, active } => {
                format!("{requested} not started: {active} is still running")
            }
            InfoEvent::Cancelling { flow } => format!("Cancelling {flow}…"),
        }
    }
}

// Analysis payload. Every field tolerates absence, `null` and loosely typed
// values; enrichment may leave optional blocks empty when supplementary
// fetches fail.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResponse {
    #[serde(deserialize_with = "lenient::list")]
    pub comparison: Vec<ComparisonItem>,
    #[serde(deserialize_with = "lenient::list")]
    pub recommendations: Vec<Recommendation>,
    #[serde(deserialize_with = "lenient::list")]
    pub roadmap: Vec<RoadmapItem>,
    #[serde(deserialize_with = "lenient::maybe")]
    pub sharepoint: Option<SharePointData>,
    #[serde(deserialize_with = "lenient::maybe")]
    pub stats: Option<DatabaseStats>,
    #[serde(deserialize_with = "lenient::maybe")]
    pub strategy: Option<Strategy>,
    #[serde(deserialize_with = "lenient::maybe_list")]
    pub compatibility: Option<Vec<CompatibilityData>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonItem {
    #[serde(deserialize_with = "lenient::string")]
    pub component: String,
    #[serde(deserialize_with = "lenient::string")]
    pub current: String,
    #[serde(deserialize_with = "lenient::string")]
    pub recommended: String,
    #[serde(deserialize_with = "lenient::string")]
    pub why: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendation {
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string")]
    pub feature: String,
    #[serde(deserialize_with = "lenient::strings")]
    pub impacted_objects: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapItem {
    #[serde(deserialize_with = "lenient::string")]
    pub application: String,
    #[serde(deserialize_with = "lenient::string")]
    pub current: String,
    #[serde(deserialize_with = "lenient::string")]
    pub guideline: String,
    #[serde(deserialize_with = "lenient::string")]
    pub observation: String,
    #[serde(deserialize_with = "lenient::string")]
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SharePointData {
    #[serde(deserialize_with = "lenient::counts")]
    pub file_category_distribution: BTreeMap<String, u64>,
    #[serde(deserialize_with = "lenient::list")]
    pub file_samples: Vec<FileSample>,
    #[serde(deserialize_with = "lenient::counts")]
    pub site_type_distribution: BTreeMap<String, u64>,
    #[serde(deserialize_with = "lenient::number_u64")]
    pub storage_used_bytes: u64,
    #[serde(deserialize_with = "lenient::number_u64")]
    pub total_files: u64,
    #[serde(deserialize_with = "lenient::number_u64")]
    pub total_sites: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSample {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub site: String,
    #[serde(deserialize_with = "lenient::number_u64")]
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseStats {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::list")]
    pub invalid_objects: Vec<InvalidObject>,
    #[serde(deserialize_with = "lenient::maybe")]
    pub database_information: Option<DatabaseInformation>,
    #[serde(deserialize_with = "lenient::maybe")]
    pub parameters: Option<DatabaseParameters>,
    #[serde(deserialize_with = "lenient::string")]
    pub stats_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvalidObject {
    #[serde(deserialize_with = "lenient::string")]
    pub owner: String,
    #[serde(deserialize_with = "lenient::string")]
    pub object_type: String,
    #[serde(deserialize_with = "lenient::number_u64")]
    pub invalid_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseInformation {
    #[serde(deserialize_with = "lenient::string")]
    pub db_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub db_version: String,
    #[serde(deserialize_with = "lenient::string")]
    pub server_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub os: String,
    #[serde(deserialize_with = "lenient::string")]
    pub flashback_status: String,
    #[serde(deserialize_with = "lenient::string")]
    pub dataguard_role: String,
    #[serde(deserialize_with = "lenient::string")]
    pub instance_type: String,
    #[serde(deserialize_with = "lenient::number_f64")]
    pub data_size_gb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseParameters {
    #[serde(deserialize_with = "lenient::maybe")]
    pub sga_target: Option<Parameter>,
    #[serde(deserialize_with = "lenient::maybe")]
    pub audit_trail: Option<Parameter>,
    #[serde(deserialize_with = "lenient::list")]
    pub hidden_parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Strategy {
    #[serde(deserialize_with = "lenient::string")]
    pub how: String,
    #[serde(deserialize_with = "lenient::string")]
    pub when: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityData {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub base_component: String,
    #[serde(deserialize_with = "lenient::string")]
    pub base_target_version: String,
    #[serde(deserialize_with = "lenient::list")]
    pub matrix: Vec<CompatibilityMatrixItem>,
    #[serde(deserialize_with = "lenient::list")]
    pub impact_analysis: Vec<ImpactAnalysis>,
    #[serde(deserialize_with = "lenient::list")]
    pub detailed_reasoning: Vec<DetailedReasoning>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityMatrixItem {
    #[serde(deserialize_with = "lenient::string")]
    pub component: String,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub current_version: Option<String>,
    #[serde(
        rename = "proposed_target(from developers)",
        deserialize_with = "lenient::opt_string"
    )]
    pub proposed_target_from_developers: Option<String>,
    #[serde(
        rename = "proposed_target(from agent)",
        deserialize_with = "lenient::string"
    )]
    pub proposed_target_from_agent: String,
    #[serde(deserialize_with = "lenient::string")]
    pub certified_stack_1_lts: String,
    #[serde(deserialize_with = "lenient::string")]
    pub certified_stack_2_modern: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_compatible: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub status_message: String,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub action_required: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactAnalysis {
    #[serde(deserialize_with = "lenient::string")]
    pub component: String,
    #[serde(deserialize_with = "lenient::string")]
    pub risk_level: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailedReasoning {
    #[serde(deserialize_with = "lenient::string")]
    pub component_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub transition_stack: String,
    #[serde(deserialize_with = "lenient::string")]
    pub rationale: String,
    #[serde(deserialize_with = "lenient::strings")]
    pub deprecated_objects: Vec<String>,
}
