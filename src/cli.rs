use crate::config::{self, CliOverrides};
use crate::engine::AgentEngine;
use crate::model::{AgentEvent, FlowKind, LogCategory, RunConfig};
use crate::state::AnalysisState;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "discovery-agent",
    version,
    about = "Terminal client for the legacy-system discovery agent"
)]
pub struct Cli {
    /// Flow to run (in the TUI: the flow started on launch)
    #[arg(value_enum, default_value_t = FlowKind::Discover)]
    pub flow: FlowKind,

    /// Base URL of the discovery agent (discover, compatibility, data gathering)
    #[arg(long)]
    pub agent_url: Option<String>,

    /// Base URL of the results API (metrics, database stats, SharePoint, compatibility matrix)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print JSON result and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long)]
    pub silent: bool,

    /// Per-request timeout; 0 waits forever
    #[arg(long)]
    pub request_timeout: Option<humantime::Duration>,

    /// Multiplier applied to agent log offsets (0 plays the log instantly)
    #[arg(long)]
    pub timeline_scale: Option<f64>,

    /// Export the flow result as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Use --run-on-launch true or --run-on-launch false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub run_on_launch: bool,

    /// Where the TUI writes its diagnostics log
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    let tui_mode = cfg!(feature = "tui") && !args.json && !args.text && !args.silent;
    if tui_mode {
        let path = args
            .log_file
            .clone()
            .unwrap_or_else(crate::logging::default_log_path);
        crate::logging::init_file(&path)?;
    } else {
        crate::logging::init_stderr();
    }

    let cfg = build_config(&args)?;

    // Silent mode takes precedence over other output modes
    if args.silent {
        return run_json(args, cfg, true).await;
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, cfg).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args, cfg).await;
        }
    }

    if args.json {
        return run_json(args, cfg, false).await;
    }

    run_text(args, cfg).await
}

/// Build a `RunConfig` from the config file and CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    let file = config::load_file(args.config.as_deref())?;
    let overrides = CliOverrides {
        agent_url: args.agent_url.clone(),
        api_url: args.api_url.clone(),
        request_timeout: args.request_timeout.map(Duration::from),
        timeline_scale: args.timeline_scale,
    };
    let cfg = config::resolve(
        file,
        &overrides,
        format!("discovery-agent/{}", env!("CARGO_PKG_VERSION")),
    )?;
    Ok(cfg)
}

/// Run one flow and print its output as JSON. `silent` suppresses everything but errors.
async fn run_json(args: Cli, cfg: RunConfig, silent: bool) -> Result<()> {
    let flow = args.flow;
    let engine = AgentEngine::new(&cfg, AnalysisState::new()).context("build HTTP client")?;

    // Nobody listens in JSON mode; the sink drops events once the receiver is gone.
    let (evt_tx, evt_rx) = mpsc::unbounded_channel::<AgentEvent>();
    drop(evt_rx);

    let output = engine
        .run_flow(flow, &evt_tx)
        .await
        .with_context(|| format!("{flow} failed"))?;

    // Export errors propagate here, unlike the TUI which reports them inline.
    if let Some(p) = args.export_json.as_deref() {
        let record = crate::storage::ExportRecord::new(flow, output.clone());
        crate::storage::export_json(p, &record)?;
    }

    if !silent {
        let (out_tx, out_handle) = spawn_output_writer();
        let out = serde_json::to_string_pretty(&output)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
        drop(out_tx);
        let _ = out_handle.await;
    }

    Ok(())
}

async fn run_text(args: Cli, cfg: RunConfig) -> Result<()> {
    let flow = args.flow;
    let engine = AgentEngine::new(&cfg, AnalysisState::new()).context("build HTTP client")?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<AgentEvent>();

    let handle = tokio::spawn(async move { engine.run_flow(flow, &evt_tx).await });

    let _ = out_tx.send(OutputLine::Stderr(format!("== {flow} ==")));
    while let Some(ev) = evt_rx.recv().await {
        match ev {
            AgentEvent::Log(entry) => {
                let tag = match entry.category {
                    LogCategory::System => "",
                    LogCategory::Success => "[ok] ",
                    LogCategory::Warning => "[warn] ",
                };
                let _ = out_tx.send(OutputLine::Stderr(format!("{tag}{}", entry.message)));
            }
            AgentEvent::Progress(p) => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "{:>3.0}% {}",
                    p.percentage, p.status
                )));
            }
            AgentEvent::Info(info) => {
                let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
            }
            // Outcome is taken from the task result below.
            AgentEvent::FlowStarted { .. }
            | AgentEvent::FlowCompleted { .. }
            | AgentEvent::FlowFailed { .. }
            | AgentEvent::FlowCancelled { .. } => {}
        }
    }

    let result = handle.await.context("flow task failed")?;
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            drop(out_tx);
            let _ = out_handle.await;
            let hint = if e.is_data_absence() {
                "the agent has no results yet; run a discovery first"
            } else if e.is_connectivity() {
                "check the agent URL and retry"
            } else {
                "retry the flow"
            };
            return Err(anyhow::Error::new(e).context(format!("{flow} failed ({hint})")));
        }
    };

    let processed =
        crate::orchestrator::process_flow_completion(args.export_json.as_deref(), flow, &output);
    let summary = crate::text_summary::build_text_summary(&processed.record.output);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    for msg in processed.export_messages {
        let _ = out_tx.send(OutputLine::Stderr(msg));
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_flow_defaults_to_discover() {
        let args = Cli::try_parse_from(["discovery-agent"]).unwrap();
        assert_eq!(args.flow, FlowKind::Discover);
        assert!(args.run_on_launch);

        let args = Cli::try_parse_from(["discovery-agent", "gather", "--text"]).unwrap();
        assert_eq!(args.flow, FlowKind::Gather);
        assert!(args.text);
    }

    #[test]
    fn cli_values_override_defaults() {
        let args = Cli::try_parse_from([
            "discovery-agent",
            "--agent-url",
            "http://localhost:9000",
            "--request-timeout",
            "30s",
            "--timeline-scale",
            "0.5",
            "--config",
            "/nonexistent/discovery-agent.toml",
        ])
        .unwrap();
        // An explicit config path must exist.
        assert!(build_config(&args).is_err());

        let args = Cli {
            config: None,
            ..args
        };
        let file = config::FileConfig::default();
        let cfg = config::resolve(
            file,
            &CliOverrides {
                agent_url: args.agent_url.clone(),
                api_url: None,
                request_timeout: args.request_timeout.map(Duration::from),
                timeline_scale: args.timeline_scale,
            },
            "test".into(),
        )
        .unwrap();
        assert_eq!(
            cfg.endpoints.discover.as_str(),
            "http://localhost:9000/agent/discover"
        );
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.timeline_scale, 0.5);
    }

    #[tokio::test]
    async fn silent_requires_json() {
        let args = Cli::try_parse_from(["discovery-agent", "--silent"]).unwrap();
        let err = run(args).await.unwrap_err();
        assert!(err.to_string().contains("--silent can only be used with --json"));
    }
}
