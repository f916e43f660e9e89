//! Flow lifecycle controller.
//!
//! Owns start/cancel/reset orchestration and emits events for presentation layers.
//! At most one flow runs at a time; a second `Run` is refused, not queued.

use crate::engine::AgentEngine;
use crate::error::AgentError;
use crate::model::{AgentEvent, FlowKind, FlowOutput, InfoEvent};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Commands emitted by UI layers to control flows.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Run(FlowKind),
    Cancel,
    Reset,
    Quit,
}

/// Internal handle for a running flow task.
struct FlowCtx {
    flow: FlowKind,
    handle: Option<JoinHandle<Result<FlowOutput, AgentError>>>,
}

/// Spawn a flow and return its handle.
fn start_flow(engine: &AgentEngine, flow: FlowKind, event_tx: &UnboundedSender<AgentEvent>) -> FlowCtx {
    let _ = event_tx.send(AgentEvent::FlowStarted { flow });
    let engine = engine.clone();
    let sink = event_tx.clone();
    let handle = tokio::spawn(async move { engine.run_flow(flow, &sink).await });
    FlowCtx {
        flow,
        handle: Some(handle),
    }
}

/// Orchestrate flows based on UI commands and emit events back to presentation layers.
pub(crate) async fn run_controller(
    engine: AgentEngine,
    launch: Option<FlowKind>,
    event_tx: UnboundedSender<AgentEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut flow_ctx = launch.map(|flow| start_flow(&engine, flow, &event_tx));
    let mut quit_pending = false;

    let res = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Run(flow)) => {
                        if let Some(ctx) = &flow_ctx {
                            let _ = event_tx.send(AgentEvent::Info(InfoEvent::Refused {
                                requested: flow,
                                active: ctx.flow,
                            }));
                        } else {
                            flow_ctx = Some(start_flow(&engine, flow, &event_tx));
                        }
                    }
                    Some(UiCommand::Cancel) => {
                        if let Some(ctx) = &flow_ctx {
                            // Aborting drops the timeline and the in-flight request together;
                            // the loading guard clears the flag as it is dropped.
                            if let Some(h) = ctx.handle.as_ref() {
                                h.abort();
                            }
                            let _ = event_tx.send(AgentEvent::Info(InfoEvent::Cancelling {
                                flow: ctx.flow,
                            }));
                        }
                    }
                    Some(UiCommand::Reset) => {
                        if flow_ctx.is_some() || !engine.state().reset() {
                            let _ = event_tx.send(AgentEvent::Info(InfoEvent::Message(
                                "Cannot reset while a flow is running".into(),
                            )));
                        } else {
                            let _ = event_tx.send(AgentEvent::Info(InfoEvent::Message(
                                "Results cleared".into(),
                            )));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // Quit waits for the aborted flow to unwind so no state write races teardown.
                        quit_pending = true;
                        match &flow_ctx {
                            Some(ctx) => {
                                if let Some(h) = ctx.handle.as_ref() {
                                    h.abort();
                                }
                            }
                            None => break Ok(()),
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut flow_ctx {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    let flow = flow_ctx.take().map(|c| c.flow);
                    match join_res {
                        // Completion and failure were already reported through the sink.
                        Ok(Ok(_)) => {}
                        Ok(Err(AgentError::Busy { active })) => {
                            if let Some(requested) = flow {
                                let _ = event_tx.send(AgentEvent::Info(InfoEvent::Refused {
                                    requested,
                                    active,
                                }));
                            }
                        }
                        Ok(Err(_)) => {}
                        Err(e) if e.is_cancelled() => {
                            if let Some(flow) = flow {
                                tracing::info!(%flow, "flow cancelled");
                                let _ = event_tx.send(AgentEvent::FlowCancelled { flow });
                            }
                        }
                        Err(e) => {
                            let _ = event_tx.send(AgentEvent::Info(InfoEvent::Message(format!(
                                "Flow task failed: {e}"
                            ))));
                        }
                    }
                    if quit_pending {
                        break Ok(());
                    }
                }
            }
        }
    };

    res
}
