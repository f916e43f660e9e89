use crate::model::FlowKind;
use reqwest::StatusCode;
use thiserror::Error;

/// Failures of a remote operation or of a flow invocation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{url} responded with {status}")]
    Status { url: String, status: StatusCode },
    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("unexpected response from {url}: expected {expected}")]
    UnexpectedShape { url: String, expected: &'static str },
    #[error("no data returned from {url}")]
    EmptyResult { url: String },
    #[error("{active} is already running")]
    Busy { active: FlowKind },
}

impl AgentError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::Timeout { url: url.to_string() }
        } else if err.is_decode() {
            AgentError::Decode {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            AgentError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }

    /// The server answered, but had nothing to give back.
    pub fn is_data_absence(&self) -> bool {
        matches!(self, AgentError::EmptyResult { .. })
    }

    /// Network-level failure: the agent could not be reached or answered with an error status.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            AgentError::Transport { .. } | AgentError::Timeout { .. } | AgentError::Status { .. }
        )
    }
}

/// Authoring mistakes in a log timeline. Checked when timelines are loaded, never per call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimelineConfigError {
    #[error("timeline '{name}' has no entries")]
    Empty { name: String },
    #[error(
        "timeline '{name}': entry {index} has offset {offset_ms}ms, earlier than the previous {previous_ms}ms"
    )]
    DecreasingOffset {
        name: String,
        index: usize,
        offset_ms: u64,
        previous_ms: u64,
    },
}
