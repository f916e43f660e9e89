mod charts;
mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::engine::AgentEngine;
use crate::model::{AgentEvent, AnalysisResponse, FlowKind, FlowOutput, InfoEvent, LogCategory, RunConfig};
use crate::orchestrator::{self, UiCommand};
use crate::state::{AnalysisSnapshot, AnalysisState};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{apply_event, push_wrapped_status_kv, UiState, HELP_TAB, TAB_TITLES};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

pub async fn run(args: Cli, cfg: RunConfig) -> Result<()> {
    // Unbounded channels avoid backpressure between the flow task and the render loop.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AgentEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let analysis = AnalysisState::new();
    let engine = AgentEngine::new(&cfg, analysis.clone()).context("build HTTP client")?;
    let snapshot_rx = analysis.subscribe();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(ui_args, snapshot_rx, event_rx, cmd_tx));

    let launch = args.run_on_launch.then_some(args.flow);
    let res = orchestrator::run_controller(engine, launch, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    args: Cli,
    mut snapshot_rx: watch::Receiver<AnalysisSnapshot>,
    mut event_rx: UnboundedReceiver<AgentEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        export_json: args.export_json.clone(),
        info: if args.run_on_launch {
            String::new()
        } else {
            "Press d to discover, ? for help".into()
        },
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            match ev {
                AgentEvent::FlowCompleted { flow, output } => {
                    handle_flow_completed(&mut state, flow, &output);
                    apply_event(&mut state, AgentEvent::FlowCompleted { flow, output });
                }
                AgentEvent::Info(InfoEvent::Message(m)) if m == "Results cleared" => {
                    state.last_output = None;
                    state.logs.clear();
                    state.error = None;
                    apply_event(&mut state, AgentEvent::Info(InfoEvent::Message(m)));
                }
                other => apply_event(&mut state, other),
            }
        }

        if snapshot_rx.has_changed().unwrap_or(false) {
            state.snapshot = snapshot_rx.borrow_and_update().clone();
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('d')) => {
                        let _ = cmd_tx.send(UiCommand::Run(FlowKind::Discover));
                        state.tab = 0;
                    }
                    (_, KeyCode::Char('a')) => {
                        let _ = cmd_tx.send(UiCommand::Run(FlowKind::Analyze));
                        state.tab = 0;
                    }
                    (_, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Run(FlowKind::Compatibility));
                        state.tab = 0;
                    }
                    (_, KeyCode::Char('g')) => {
                        let _ = cmd_tx.send(UiCommand::Run(FlowKind::Gather));
                        state.tab = 0;
                    }
                    (_, KeyCode::Char('f')) => {
                        let _ = cmd_tx.send(UiCommand::Run(FlowKind::Refresh));
                    }
                    (_, KeyCode::Char('x')) => {
                        if state.is_running() {
                            let _ = cmd_tx.send(UiCommand::Cancel);
                        } else {
                            state.info = "Nothing to cancel".into();
                        }
                    }
                    (_, KeyCode::Char('R')) => {
                        let _ = cmd_tx.send(UiCommand::Reset);
                    }
                    (_, KeyCode::Char('e')) => match state.last_output.as_ref() {
                        Some((flow, output)) => {
                            match export::export_output_json(std::path::Path::new("."), *flow, output) {
                                Ok(p) => {
                                    state.last_exported_path = Some(p.to_string_lossy().to_string());
                                    state.info = format!(
                                        "Exported JSON: {} (press 'y' to copy path)",
                                        p.display()
                                    );
                                }
                                Err(e) => {
                                    state.info = format!("JSON export failed: {e:#}");
                                }
                            }
                        }
                        None => state.info = "No completed flow to export yet.".into(),
                    },
                    (_, KeyCode::Char('y')) => {
                        if let Some(ref path) = state.last_exported_path {
                            match export::copy_to_clipboard(path) {
                                Ok(_) => {
                                    let display_path = if path.chars().count() > 60 {
                                        let head: String = path.chars().take(57).collect();
                                        format!("{head}...")
                                    } else {
                                        path.clone()
                                    };
                                    state.info = format!("✓ Copied to clipboard: {}", display_path);
                                }
                                Err(e) => {
                                    state.info = format!("Clipboard copy failed: {e:#}");
                                }
                            }
                        } else {
                            state.info = "No exported file path to copy. Export a file first (e)".into();
                        }
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % TAB_TITLES.len();
                    }
                    (_, KeyCode::BackTab) => {
                        state.tab = (state.tab + TAB_TITLES.len() - 1) % TAB_TITLES.len();
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = HELP_TAB;
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => {
                        if state.tab == 0 {
                            let max = state.logs.len().min(u16::MAX as usize) as u16;
                            state.log_scroll = (state.log_scroll + 1).min(max);
                        }
                    }
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => {
                        if state.tab == 0 {
                            state.log_scroll = state.log_scroll.saturating_sub(1);
                        }
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Write the requested `--export-json` file for a finished flow and surface the outcome.
fn handle_flow_completed(state: &mut UiState, flow: FlowKind, output: &FlowOutput) {
    let processed =
        orchestrator::process_flow_completion(state.export_json.as_deref(), flow, output);
    if !processed.export_messages.is_empty() {
        state.info = processed.export_messages.join("; ");
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(5)].as_ref())
        .split(area);

    let tabs = Tabs::new(TAB_TITLES.iter().map(|t| Line::from(*t)).collect::<Vec<_>>())
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("discovery-agent"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    let analysis = state.snapshot.analysis.as_deref();
    match (state.tab, analysis) {
        (0, _) => draw_agent_log(chunks[1], f, state),
        (1, _) => draw_discovery(chunks[1], f, state),
        (HELP_TAB, _) => help::draw_help(chunks[1], f),
        (_, None) if state.tab != 3 => draw_no_analysis(chunks[1], f, state),
        (2, Some(a)) => draw_statistics(chunks[1], f, a),
        (3, _) => draw_compatibility(chunks[1], f, state),
        (4, Some(a)) => draw_recommendations(chunks[1], f, a),
        (_, Some(a)) => draw_roadmap(chunks[1], f, a),
        (_, None) => draw_no_analysis(chunks[1], f, state),
    }

    draw_status(chunks[2], f, state);
}

fn draw_no_analysis(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let msg = if state.snapshot.loading {
        "Waiting for the agent…"
    } else {
        "No analysis yet. Press 'd' to discover or 'a' to analyze."
    };
    f.render_widget(
        Paragraph::new(msg)
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::ALL).title(TAB_TITLES[state.tab])),
        area,
    );
}

fn draw_agent_log(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|e| {
            let color = match e.category {
                LogCategory::System => Color::Gray,
                LogCategory::Success => Color::Green,
                LogCategory::Warning => Color::Yellow,
            };
            Line::from(Span::styled(e.message.clone(), Style::default().fg(color)))
        })
        .collect();

    // Follow the tail; `log_scroll` counts lines back from the bottom.
    let visible = area.height.saturating_sub(2) as usize;
    let tail_offset = lines.len().saturating_sub(visible) as u16;
    let offset = tail_offset.saturating_sub(state.log_scroll);

    let title = match state.running {
        Some(flow) => format!("Agent log ({flow})"),
        None => "Agent log".into(),
    };
    let p = Paragraph::new(lines)
        .scroll((offset, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_discovery(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let width = area.width;

    if let Some(a) = state.snapshot.analysis.as_deref() {
        if let Some(stats) = a.stats.as_ref() {
            if let Some(info) = stats.database_information.as_ref() {
                lines.push(section("Database"));
                push_wrapped_status_kv(&mut lines, "Name", &info.db_name, width);
                push_wrapped_status_kv(&mut lines, "Version", &info.db_version, width);
                push_wrapped_status_kv(&mut lines, "Server", &info.server_name, width);
                push_wrapped_status_kv(&mut lines, "OS", &info.os, width);
                push_wrapped_status_kv(&mut lines, "Instance", &info.instance_type, width);
                push_wrapped_status_kv(
                    &mut lines,
                    "Data size",
                    &format!("{:.2} GB", info.data_size_gb),
                    width,
                );
                push_wrapped_status_kv(&mut lines, "Flashback", &info.flashback_status, width);
                push_wrapped_status_kv(&mut lines, "Data Guard", &info.dataguard_role, width);
            }
            if let Some(params) = stats.parameters.as_ref() {
                lines.push(section("Parameters"));
                for p in params
                    .sga_target
                    .iter()
                    .chain(params.audit_trail.iter())
                    .chain(params.hidden_parameters.iter())
                {
                    push_wrapped_status_kv(&mut lines, &p.name, &p.value, width);
                }
            }
        }
        if let Some(sp) = a.sharepoint.as_ref() {
            lines.push(section("SharePoint"));
            push_wrapped_status_kv(&mut lines, "Sites", &sp.total_sites.to_string(), width);
            push_wrapped_status_kv(&mut lines, "Files", &sp.total_files.to_string(), width);
            if let Some(gb) = crate::metrics::sharepoint_storage_gb(a) {
                push_wrapped_status_kv(&mut lines, "Storage", &format!("{gb:.2} GB"), width);
            }
            for (kind, count) in &sp.site_type_distribution {
                push_wrapped_status_kv(&mut lines, kind, &count.to_string(), width);
            }
        }
    }

    if let Some(gathered) = state.snapshot.gathered.as_ref() {
        lines.push(section("Gathered data"));
        let body = serde_json::to_string_pretty(gathered).unwrap_or_else(|_| gathered.to_string());
        lines.extend(body.lines().map(|l| Line::from(l.to_string())));
    }

    if lines.is_empty() {
        return draw_no_analysis(area, f, state);
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Discovery"));
    f.render_widget(p, area);
}

fn section(title: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        title,
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))
}

fn draw_statistics(area: Rect, f: &mut ratatui::Frame, a: &AnalysisResponse) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(area);
    charts::draw_invalid_objects(rows[0], f, a);
    charts::draw_file_categories(rows[1], f, a);
}

fn draw_compatibility(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(area);

    let empty = AnalysisResponse::default();
    let a = state.snapshot.analysis.as_deref().unwrap_or(&empty);
    charts::draw_compatibility_matrix(rows[0], f, a);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for c in a.compatibility.iter().flatten() {
        for i in &c.impact_analysis {
            let color = match i.risk_level.to_lowercase().as_str() {
                "high" => Color::Red,
                "medium" => Color::Yellow,
                _ => Color::Green,
            };
            lines.push(Line::from(vec![
                Span::styled(format!("[{}] ", i.risk_level), Style::default().fg(color)),
                Span::raw(format!("{}: {}", i.component, i.description)),
            ]));
        }
        for r in &c.detailed_reasoning {
            lines.push(Line::from(format!(
                "{} → {}: {}",
                r.component_name, r.transition_stack, r.rationale
            )));
            if !r.deprecated_objects.is_empty() {
                lines.push(Line::from(format!(
                    "  deprecated: {}",
                    r.deprecated_objects.join(", ")
                )));
            }
        }
    }
    if let Some(raw) = state.snapshot.compatibility.as_ref() {
        lines.push(section("Latest compatibility check"));
        let body = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
        lines.extend(body.lines().map(|l| Line::from(l.to_string())));
    }

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Impact and reasoning"));
    f.render_widget(p, rows[1]);
}

fn draw_recommendations(area: Rect, f: &mut ratatui::Frame, a: &AnalysisResponse) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    if !a.comparison.is_empty() {
        lines.push(section("Current vs recommended"));
        for c in &a.comparison {
            lines.push(Line::from(vec![
                Span::styled(format!("{}: ", c.component), Style::default().fg(Color::Gray)),
                Span::raw(format!("{} → ", c.current)),
                Span::styled(c.recommended.clone(), Style::default().fg(Color::Green)),
                Span::raw(format!("  ({})", c.why)),
            ]));
        }
    }
    if let Some(s) = a.strategy.as_ref() {
        lines.push(section("Strategy"));
        lines.push(Line::from(format!("{} ({})", s.how, s.when)));
    }
    if !a.recommendations.is_empty() {
        lines.push(section("Recommendations"));
        for r in &a.recommendations {
            lines.push(Line::from(vec![
                Span::styled(r.feature.clone(), Style::default().fg(Color::Cyan)),
                Span::raw(format!(": {}", r.description)),
            ]));
            if !r.impacted_objects.is_empty() {
                lines.push(Line::from(format!("  impacts: {}", r.impacted_objects.join(", "))));
            }
        }
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Recommendations"));
    f.render_widget(p, area);
}

fn draw_roadmap(area: Rect, f: &mut ratatui::Frame, a: &AnalysisResponse) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for (i, r) in a.roadmap.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("{}. {}", i + 1, r.application), Style::default().fg(Color::Yellow)),
            Span::raw(format!("  {} → {}", r.current, r.target)),
        ]));
        if !r.observation.is_empty() {
            lines.push(Line::from(format!("   observed: {}", r.observation)));
        }
        if !r.guideline.is_empty() {
            lines.push(Line::from(format!("   guideline: {}", r.guideline)));
        }
    }
    if lines.is_empty() {
        lines.push(Line::from("No roadmap in the latest analysis."));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Roadmap"));
    f.render_widget(p, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    if let (Some(flow), Some(p)) = (state.running, state.progress.as_ref()) {
        let ratio = (p.percentage / 100.0).clamp(0.0, 1.0);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(format!("{flow} (x to cancel)")))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(ratio)
            .label(format!("{:.0}%  {}", p.percentage, p.status));
        f.render_widget(gauge, area);
        return;
    }

    let mut status_lines: Vec<Line<'static>> = Vec::new();
    if let Some(err) = state.error.as_ref() {
        status_lines.push(Line::from(Span::styled(
            format!("{} failed: {}", err.flow, err.message),
            Style::default().fg(Color::Red),
        )));
    }
    push_wrapped_status_kv(&mut status_lines, "Info", &state.info, area.width);

    let status =
        Paragraph::new(status_lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, area);
}
