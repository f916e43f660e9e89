//! Authored agent log timelines and the player that replays them.
//!
//! A timeline is data: an ordered list of log entries with absolute offsets
//! from the moment playback starts. The player emits each entry at its offset,
//! in order, exactly once, then forces a terminal 100% progress update.

use crate::engine::sink::PresentationSink;
use crate::error::TimelineConfigError;
use crate::model::{FlowKind, LogCategory, LogEntry, ProgressUpdate};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    name: String,
    entries: Vec<LogEntry>,
    complete_status: String,
}

impl Timeline {
    /// Validate and build a timeline: at least one entry, offsets never decreasing.
    pub fn new(
        name: impl Into<String>,
        entries: Vec<LogEntry>,
        complete_status: impl Into<String>,
    ) -> Result<Self, TimelineConfigError> {
        let name = name.into();
        if entries.is_empty() {
            return Err(TimelineConfigError::Empty { name });
        }
        let mut previous_ms = 0;
        for (index, entry) in entries.iter().enumerate() {
            if entry.offset_ms < previous_ms {
                return Err(TimelineConfigError::DecreasingOffset {
                    name,
                    index,
                    offset_ms: entry.offset_ms,
                    previous_ms,
                });
            }
            previous_ms = entry.offset_ms;
        }
        Ok(Self {
            name,
            entries,
            complete_status: complete_status.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn complete_status(&self) -> &str {
        &self.complete_status
    }

    /// Offset of the last entry, i.e. how long an unscaled playback takes.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.entries.last().map(|e| e.offset_ms).unwrap_or(0))
    }

    /// Playback length at `scale`; `None` when it does not fit in a `Duration`.
    pub fn scaled_duration(&self, scale: f64) -> Option<Duration> {
        scale_offset(self.duration(), scale)
    }
}

/// Upper bound for any single scheduled wait.
pub const MAX_SCALED_OFFSET: Duration = Duration::from_secs(86_400 * 365 * 30);

fn scale_offset(offset: Duration, scale: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(offset.as_secs_f64() * scale).ok()
}

/// The per-flow timelines in use by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Timelines {
    pub discovery: Timeline,
    pub analysis: Timeline,
    pub compatibility: Timeline,
    pub gathering: Timeline,
}

impl Timelines {
    pub fn iter(&self) -> impl Iterator<Item = &Timeline> {
        [&self.discovery, &self.analysis, &self.compatibility, &self.gathering].into_iter()
    }

    pub fn for_flow(&self, flow: FlowKind) -> Option<&Timeline> {
        match flow {
            FlowKind::Discover => Some(&self.discovery),
            FlowKind::Analyze => Some(&self.analysis),
            FlowKind::Compatibility => Some(&self.compatibility),
            FlowKind::Gather => Some(&self.gathering),
            FlowKind::Refresh => None,
        }
    }

    pub fn builtin() -> Result<Self, TimelineConfigError> {
        use LogCategory::{Success, System, Warning};

        let discovery = Timeline::new(
            "discovery",
            vec![
                LogEntry::new("> INITIATING DISCOVERY PROCESS...", System, 10_000),
                LogEntry::new("> Preparing agent environment...", System, 11_000),
                LogEntry::new("> DISCOVERY ENDPOINT ACTIVATED", Success, 12_000),
                LogEntry::new("> DISCOVERY In Progress... Please Wait...", Success, 13_000),
            ],
            "Discovery Complete",
        )?;

        let analysis = Timeline::new(
            "analysis",
            vec![
                LogEntry::new("> INITIALIZING DISCOVERY AGENT...", System, 10_000),
                LogEntry::new("> Connecting to local OCI environment...", System, 11_000),
                LogEntry::new("> FOUND: Legacy Oracle 18c XE Instance", Success, 12_000),
                LogEntry::new("> SCANNING SCHEMA: WATS_PROD", System, 13_000),
                LogEntry::new("> INFO: 24 Tables identified", System, 14_000),
                LogEntry::new(
                    "> WARNING: Deprecated data types detected (LONG, VARCHAR2)",
                    Warning,
                    15_000,
                ),
                LogEntry::new("> ANALYZING UPGRADE COMPATIBILITY...", System, 16_000),
                LogEntry::new("> Checking 21c Feature Alignment...", System, 17_000),
                LogEntry::new("> FETCHING SHAREPOINT DIAGNOSTICS...", System, 18_000),
                LogEntry::new("> COMPILING FINAL REPORT...", Success, 19_000),
                LogEntry::new("> Analysis In Progress... Please Wait...", Success, 20_000),
            ],
            "Analysis Complete",
        )?;

        let compatibility = Timeline::new(
            "compatibility",
            vec![
                LogEntry::new("> INITIALIZING COMPATIBILITY CHECK...", System, 500),
                LogEntry::new("> Analyzing current environment...", System, 1_000),
                LogEntry::new("> Checking Oracle version compatibility...", System, 1_500),
                LogEntry::new("> Validating Java requirements...", System, 2_000),
                LogEntry::new("> Verifying ORDS compatibility...", System, 2_500),
                LogEntry::new("> Analyzing component dependencies...", System, 3_000),
                LogEntry::new("> COMPATIBILITY In Progress", Success, 3_500),
            ],
            "Compatibility Check Complete",
        )?;

        let gathering = Timeline::new(
            "gathering",
            vec![
                LogEntry::new("> INITIALIZING DATA GATHERING...", System, 10_000),
                LogEntry::new("> Collecting OS information...", System, 12_000),
                LogEntry::new("> Retrieving GitHub information...", System, 14_000),
                LogEntry::new("> Fetching Oracle information...", System, 16_000),
                LogEntry::new("> Gathering SharePoint information...", System, 18_000),
                LogEntry::new("> DATA GATHERING IN PROGRESS...", Success, 20_000),
            ],
            "Data Gathering Complete",
        )?;

        Ok(Self {
            discovery,
            analysis,
            compatibility,
            gathering,
        })
    }
}

/// Replays one timeline against a sink. Dropping the `play` future stops all further emissions.
pub struct TimelinePlayer<'a> {
    timeline: &'a Timeline,
    scale: f64,
}

impl<'a> TimelinePlayer<'a> {
    /// `scale` stretches (>1) or compresses (<1) every offset; 0 plays without waiting.
    pub fn new(timeline: &'a Timeline, scale: f64) -> Self {
        let scale = if scale.is_finite() { scale.max(0.0) } else { 1.0 };
        Self { timeline, scale }
    }

    /// Saturates at `MAX_SCALED_OFFSET` instead of overflowing.
    fn scaled(&self, offset_ms: u64) -> Duration {
        scale_offset(Duration::from_millis(offset_ms), self.scale)
            .map_or(MAX_SCALED_OFFSET, |d| d.min(MAX_SCALED_OFFSET))
    }

    pub async fn play<S: PresentationSink + ?Sized>(&self, sink: &S) {
        let start = Instant::now();
        let entries = self.timeline.entries();
        let len = entries.len();
        tracing::debug!(
            timeline = self.timeline.name(),
            duration = ?self.timeline.scaled_duration(self.scale),
            "timeline started"
        );

        for (index, entry) in entries.iter().enumerate() {
            // Scheduling against the start instant keeps later entries from drifting.
            match start.checked_add(self.scaled(entry.offset_ms)) {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
            // Log and progress for one entry go out together, with no await in between.
            sink.on_log_entry(entry);
            sink.on_progress(&ProgressUpdate::for_entry(index, len, entry));
        }

        sink.on_progress(&ProgressUpdate::complete(self.timeline.complete_status()));
        tracing::debug!(timeline = self.timeline.name(), entries = len, "timeline finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sink::testing::{Recorded, RecordingSink};

    fn three_step() -> Timeline {
        Timeline::new(
            "diagnostic",
            vec![
                LogEntry::new("> one", LogCategory::System, 500),
                LogEntry::new("> two", LogCategory::Warning, 1_000),
                LogEntry::new("> three", LogCategory::Success, 1_500),
            ],
            "Diagnostic Complete",
        )
        .unwrap()
    }

    #[test]
    fn builtin_timelines_are_valid() {
        let t = Timelines::builtin().unwrap();
        assert_eq!(t.analysis.entries().len(), 11);
        assert_eq!(t.compatibility.duration(), Duration::from_millis(3_500));
        assert!(t.for_flow(FlowKind::Refresh).is_none());
        assert_eq!(t.for_flow(FlowKind::Discover).unwrap().name(), "discovery");
    }

    #[test]
    fn rejects_empty_and_decreasing_timelines() {
        assert_eq!(
            Timeline::new("empty", vec![], "done"),
            Err(TimelineConfigError::Empty {
                name: "empty".into()
            })
        );
        let err = Timeline::new(
            "bad",
            vec![
                LogEntry::new("a", LogCategory::System, 200),
                LogEntry::new("b", LogCategory::System, 100),
            ],
            "done",
        )
        .unwrap_err();
        assert_eq!(
            err,
            TimelineConfigError::DecreasingOffset {
                name: "bad".into(),
                index: 1,
                offset_ms: 100,
                previous_ms: 200,
            }
        );
    }

    #[test]
    fn equal_offsets_are_allowed() {
        let t = Timeline::new(
            "burst",
            vec![
                LogEntry::new("a", LogCategory::System, 100),
                LogEntry::new("b", LogCategory::System, 100),
            ],
            "done",
        );
        assert!(t.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn emits_n_logs_and_n_plus_one_progress_updates() {
        let timeline = three_step();
        let sink = RecordingSink::new();
        TimelinePlayer::new(&timeline, 1.0).play(&sink).await;

        assert_eq!(sink.log_times(), vec![500, 1_000, 1_500]);
        let progress = sink.progress();
        assert_eq!(progress.len(), 4);
        assert_eq!(progress[0].percentage.round(), 33.0);
        assert_eq!(progress[1].percentage.round(), 67.0);
        assert_eq!(progress[2].percentage, 100.0);
        let last = progress.last().unwrap();
        assert_eq!(last.percentage, 100.0);
        assert_eq!(last.status, "Diagnostic Complete");
    }

    #[tokio::test(start_paused = true)]
    async fn log_and_progress_alternate_in_entry_order() {
        let timeline = three_step();
        let sink = RecordingSink::new();
        TimelinePlayer::new(&timeline, 1.0).play(&sink).await;

        let kinds: Vec<String> = sink
            .events()
            .into_iter()
            .map(|(_, ev)| match ev {
                Recorded::Log(e) => format!("log:{}", e.status_text()),
                Recorded::Progress(p) => format!("progress:{}", p.status),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "log:one",
                "progress:one",
                "log:two",
                "progress:two",
                "log:three",
                "progress:three",
                "progress:Diagnostic Complete",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn final_progress_is_forced_to_full() {
        // A single entry whose own percentage is already 100 still gets the terminal update.
        let timeline = Timeline::new(
            "single",
            vec![LogEntry::new("> only", LogCategory::System, 0)],
            "Single Complete",
        )
        .unwrap();
        let sink = RecordingSink::new();
        TimelinePlayer::new(&timeline, 1.0).play(&sink).await;

        let progress = sink.progress();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[1].percentage, 100.0);
        assert_eq!(progress[1].status, "Single Complete");
    }

    #[tokio::test(start_paused = true)]
    async fn scale_compresses_offsets() {
        let timeline = three_step();
        let sink = RecordingSink::new();
        TimelinePlayer::new(&timeline, 0.1).play(&sink).await;
        assert_eq!(sink.log_times(), vec![50, 100, 150]);

        let instant = RecordingSink::new();
        TimelinePlayer::new(&timeline, 0.0).play(&instant).await;
        assert_eq!(instant.log_times(), vec![0, 0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_scale_waits_instead_of_overflowing() {
        let timeline = three_step();
        for scale in [1e20, f64::MAX] {
            let sink = RecordingSink::new();
            let player = TimelinePlayer::new(&timeline, scale);
            let played = tokio::time::timeout(Duration::from_secs(60), player.play(&sink)).await;
            assert!(played.is_err());
            assert!(sink.events().is_empty());
        }
        assert_eq!(timeline.scaled_duration(f64::MAX), None);
        assert_eq!(
            timeline.scaled_duration(2.0),
            Some(Duration::from_millis(3_000))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_playback_suppresses_remaining_entries() {
        let timeline = three_step();
        let sink = RecordingSink::new();
        let player = TimelinePlayer::new(&timeline, 1.0);
        let _ = tokio::time::timeout(Duration::from_millis(1_200), player.play(&sink)).await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.log_times(), vec![500, 1_000]);
        assert!(sink.progress().iter().all(|p| p.percentage < 100.0));
    }
}
