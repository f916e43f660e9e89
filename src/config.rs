//! Layered configuration: built-in defaults, then the TOML config file, then CLI flags.

use crate::engine::timeline::{Timeline, Timelines};
use crate::error::TimelineConfigError;
use crate::model::{Endpoints, LogEntry, RunConfig};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_AGENT_URL: &str =
    "https://winfotest-da-agent-chdcb5h0dngff0eu.centralindia-01.azurewebsites.net";
pub const DEFAULT_API_URL: &str = "https://winfotest-da-api.azurewebsites.net";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
/// Longest playback a scaled timeline may take.
pub const MAX_TIMELINE_PLAYBACK: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid URL for {field}: '{value}' ({reason})")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("timeline scale must be a finite number >= 0, got {0}")]
    InvalidScale(f64),
    #[error("timeline '{name}' would play for longer than 24h at scale {scale}")]
    TimelineTooLong { name: String, scale: f64 },
    #[error(transparent)]
    Timeline(#[from] TimelineConfigError),
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub agent_url: Option<String>,
    pub api_url: Option<String>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub timeline_scale: Option<f64>,
    pub endpoints: EndpointOverrides,
    pub timelines: TimelineOverrides,
}

/// Full URLs replacing the ones derived from the base URLs.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointOverrides {
    pub discover: Option<String>,
    pub compatibility: Option<String>,
    pub data_gathering: Option<String>,
    pub metrics: Option<String>,
    pub database_stats: Option<String>,
    pub sharepoint_stats: Option<String>,
    pub compatibility_matrix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimelineOverrides {
    pub discovery: Option<TimelineSpec>,
    pub analysis: Option<TimelineSpec>,
    pub compatibility: Option<TimelineSpec>,
    pub gathering: Option<TimelineSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelineSpec {
    pub entries: Vec<LogEntry>,
    pub complete_status: Option<String>,
}

/// Values given on the command line; they win over the file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub agent_url: Option<String>,
    pub api_url: Option<String>,
    pub request_timeout: Option<Duration>,
    pub timeline_scale: Option<f64>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("discovery-agent").join("config.toml"))
}

/// Read the config file. An explicit path must exist; the default path is optional.
pub fn load_file(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(FileConfig::default()),
        },
    };
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let cfg = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(cfg)
}

pub fn resolve(
    file: FileConfig,
    cli: &CliOverrides,
    user_agent: String,
) -> Result<RunConfig, ConfigError> {
    let agent_base = base_url(
        "agent_url",
        cli.agent_url
            .as_deref()
            .or(file.agent_url.as_deref())
            .unwrap_or(DEFAULT_AGENT_URL),
    )?;
    let api_base = base_url(
        "api_url",
        cli.api_url
            .as_deref()
            .or(file.api_url.as_deref())
            .unwrap_or(DEFAULT_API_URL),
    )?;

    let o = &file.endpoints;
    let endpoints = Endpoints {
        discover: endpoint("discover", &o.discover, &agent_base, "agent/discover")?,
        compatibility: endpoint("compatibility", &o.compatibility, &agent_base, "agent/compatibility")?,
        data_gathering: endpoint("data_gathering", &o.data_gathering, &agent_base, "agent/data-gathering")?,
        metrics: endpoint("metrics", &o.metrics, &api_base, "api/Metrics")?,
        database_stats: endpoint("database_stats", &o.database_stats, &api_base, "api/DatabaseStats")?,
        sharepoint_stats: endpoint("sharepoint_stats", &o.sharepoint_stats, &api_base, "api/SharePointStats")?,
        compatibility_matrix: endpoint(
            "compatibility_matrix",
            &o.compatibility_matrix,
            &api_base,
            "api/CompatibilityMatrix",
        )?,
    };

    // A zero timeout means "wait forever".
    let request_timeout = cli
        .request_timeout
        .or(file.request_timeout)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    let request_timeout = (!request_timeout.is_zero()).then_some(request_timeout);

    let timeline_scale = cli.timeline_scale.or(file.timeline_scale).unwrap_or(1.0);
    if !timeline_scale.is_finite() || timeline_scale < 0.0 {
        return Err(ConfigError::InvalidScale(timeline_scale));
    }

    let timelines = apply_timeline_overrides(Timelines::builtin()?, file.timelines)?;
    for timeline in timelines.iter() {
        let fits = timeline
            .scaled_duration(timeline_scale)
            .is_some_and(|d| d <= MAX_TIMELINE_PLAYBACK);
        if !fits {
            return Err(ConfigError::TimelineTooLong {
                name: timeline.name().to_string(),
                scale: timeline_scale,
            });
        }
    }

    Ok(RunConfig {
        endpoints,
        request_timeout,
        timeline_scale,
        timelines,
        user_agent,
    })
}

fn base_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    // Without a trailing slash, `join` would replace the last path segment.
    let normalized = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&normalized).map_err(|e| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn endpoint(
    field: &'static str,
    explicit: &Option<String>,
    base: &Url,
    relative: &str,
) -> Result<Url, ConfigError> {
    let invalid = |value: &str, e: String| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: e,
    };
    match explicit {
        Some(url) => Url::parse(url).map_err(|e| invalid(url, e.to_string())),
        None => base
            .join(relative)
            .map_err(|e| invalid(base.as_str(), e.to_string())),
    }
}

fn apply_timeline_overrides(
    mut timelines: Timelines,
    overrides: TimelineOverrides,
) -> Result<Timelines, TimelineConfigError> {
    fn replace(slot: &mut Timeline, spec: Option<TimelineSpec>) -> Result<(), TimelineConfigError> {
        if let Some(spec) = spec {
            let status = spec
                .complete_status
                .unwrap_or_else(|| slot.complete_status().to_string());
            *slot = Timeline::new(slot.name().to_string(), spec.entries, status)?;
        }
        Ok(())
    }

    replace(&mut timelines.discovery, overrides.discovery)?;
    replace(&mut timelines.analysis, overrides.analysis)?;
    replace(&mut timelines.compatibility, overrides.compatibility)?;
    replace(&mut timelines.gathering, overrides.gathering)?;
    Ok(timelines)
}
