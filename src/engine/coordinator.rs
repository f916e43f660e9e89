//! Joins a timeline playback with the remote operation it is decorating.
//!
//! Success needs both branches: the result is held back until the last
//! timeline entry has fired, however early the request finished. A failed
//! request wins immediately; the unfinished playback is dropped with it.

use crate::engine::sink::PresentationSink;
use crate::engine::timeline::{Timeline, TimelinePlayer};
use crate::error::AgentError;
use serde_json::Value;
use std::future::Future;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorResult {
    pub data: Value,
}

pub struct Coordinator<'a, S: ?Sized> {
    sink: &'a S,
    scale: f64,
}

impl<'a, S: PresentationSink + ?Sized> Coordinator<'a, S> {
    pub fn new(sink: &'a S, scale: f64) -> Self {
        Self { sink, scale }
    }

    pub async fn run<F>(&self, timeline: &Timeline, operation: F) -> Result<CoordinatorResult, AgentError>
    where
        F: Future<Output = Result<Value, AgentError>>,
    {
        let player = TimelinePlayer::new(timeline, self.scale);
        let playback = async {
            player.play(self.sink).await;
            Ok::<(), AgentError>(())
        };

        let ((), data) = tokio::try_join!(playback, operation).map_err(|e| {
            tracing::debug!(timeline = timeline.name(), error = %e, "remote operation failed, timeline abandoned");
            e
        })?;
        Ok(CoordinatorResult { data })
    }
}
