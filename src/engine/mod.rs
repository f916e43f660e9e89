pub(crate) mod agent;
pub(crate) mod coordinator;
mod enrich;
pub(crate) mod remote;
pub(crate) mod sink;
pub(crate) mod timeline;

use crate::error::AgentError;
use crate::model::{AnalysisResponse, FlowKind, FlowOutput, RunConfig};
use crate::state::AnalysisState;
use agent::AgentClient;
use anyhow::Result;
use coordinator::Coordinator;
use remote::RemoteOperation;
use serde_json::Value;
use sink::PresentationSink;
use timeline::Timelines;

/// Runs flows against the agent and writes their outcome into the shared state.
#[derive(Debug, Clone)]
pub struct AgentEngine {
    client: AgentClient,
    timelines: Timelines,
    timeline_scale: f64,
    state: AnalysisState,
}

impl AgentEngine {
    pub fn new(cfg: &RunConfig, state: AnalysisState) -> Result<Self> {
        Ok(Self {
            client: AgentClient::new(cfg)?,
            timelines: cfg.timelines.clone(),
            timeline_scale: cfg.timeline_scale,
            state,
        })
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    /// Run one flow end to end. Refused with `AgentError::Busy` while another flow holds the slot.
    pub async fn run_flow<S: PresentationSink + ?Sized>(
        &self,
        flow: FlowKind,
        sink: &S,
    ) -> Result<FlowOutput, AgentError> {
        let guard = self.state.begin(flow)?;
        tracing::info!(%flow, "flow started");

        let outcome = match flow {
            FlowKind::Discover => self.discover_then_analyze(sink).await,
            FlowKind::Analyze => self.analyze(sink).await,
            FlowKind::Compatibility => {
                self.coordinate(flow, sink, RemoteOperation::compatibility(&self.client))
                    .await
                    .map(FlowOutput::Compatibility)
            }
            FlowKind::Gather => {
                self.coordinate(flow, sink, RemoteOperation::data_gathering(&self.client))
                    .await
                    .map(FlowOutput::DataGathering)
            }
            FlowKind::Refresh => {
                let data = RemoteOperation::analysis(&self.client).execute().await;
                data.and_then(|v| decode_analysis(&self.client.endpoints().metrics, v))
            }
        };

        match outcome {
            Ok(output) => {
                tracing::info!(%flow, "flow completed");
                guard.succeed(&output);
                sink.on_complete(flow, &output);
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(%flow, error = %e, "flow failed");
                guard.fail(&e);
                sink.on_error(flow, &e);
                Err(e)
            }
        }
    }

    /// Discovery must succeed before the analysis coordinator starts.
    async fn discover_then_analyze<S: PresentationSink + ?Sized>(
        &self,
        sink: &S,
    ) -> Result<FlowOutput, AgentError> {
        let discovered = self
            .coordinate(FlowKind::Discover, sink, RemoteOperation::discover(&self.client))
            .await?;
        tracing::debug!(response = %discovered, "discover accepted, starting analysis");
        self.analyze(sink).await
    }

    async fn analyze<S: PresentationSink + ?Sized>(&self, sink: &S) -> Result<FlowOutput, AgentError> {
        let data = self
            .coordinate(FlowKind::Analyze, sink, RemoteOperation::analysis(&self.client))
            .await?;
        decode_analysis(&self.client.endpoints().metrics, data)
    }

    async fn coordinate<S: PresentationSink + ?Sized>(
        &self,
        flow: FlowKind,
        sink: &S,
        op: RemoteOperation<'_>,
    ) -> Result<Value, AgentError> {
        let coordinator = Coordinator::new(sink, self.timeline_scale);
        match self.timelines.for_flow(flow) {
            Some(timeline) => Ok(coordinator.run(timeline, op.execute()).await?.data),
            None => op.execute().await,
        }
    }
}

fn decode_analysis(url: &reqwest::Url, data: Value) -> Result<FlowOutput, AgentError> {
    let parsed: AnalysisResponse =
        serde_json::from_value(data).map_err(|e| AgentError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(FlowOutput::Analysis(Box::new(parsed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::agent::testing::config_for;
    use crate::engine::sink::testing::{Recorded, RecordingSink};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn metrics_body() -> Value {
        json!([{
            "comparison": [{"component": "Database", "current": "18c XE", "recommended": "21c", "why": "EOL"}],
            "recommendations": [],
            "roadmap": [],
            "strategy": {"how": "in place", "when": "Q3"},
            "stats": {"stats_type": "database", "invalid_objects": [{"owner": "WATS", "object_type": "VIEW", "invalid_count": 4}]},
            "sharepoint": {"total_files": 10, "total_sites": 2, "storage_used_bytes": 1073741824u64},
            "compatibility": []
        }])
    }

    fn engine_for(server: &MockServer) -> AgentEngine {
        AgentEngine::new(&config_for(&server.uri()), AnalysisState::new()).unwrap()
    }

    #[tokio::test]
    async fn discover_chains_into_analysis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent/discover"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "started"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/Metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metrics_body()))
            .expect(1)
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        let sink = RecordingSink::new();
        let out = engine.run_flow(FlowKind::Discover, &sink).await.unwrap();

        let FlowOutput::Analysis(a) = out else {
            panic!("discover should end with analysis output");
        };
        assert_eq!(a.comparison[0].recommended, "21c");

        let timelines = Timelines::builtin().unwrap();
        let expected_logs =
            timelines.discovery.entries().len() + timelines.analysis.entries().len();
        assert_eq!(sink.log_times().len(), expected_logs);
        let statuses: Vec<String> = sink
            .progress()
            .into_iter()
            .filter(|p| p.percentage == 100.0)
            .map(|p| p.status)
            .collect();
        assert!(statuses.contains(&"Discovery Complete".to_string()));
        assert!(statuses.contains(&"Analysis Complete".to_string()));

        let snap = engine.state().snapshot();
        assert!(!snap.loading);
        assert!(snap.analysis.is_some());
        assert!(matches!(
            sink.events().last(),
            Some((_, Recorded::Complete(FlowKind::Discover)))
        ));
    }

    #[tokio::test]
    async fn failed_discover_never_starts_analysis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent/discover"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/Metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metrics_body()))
            .expect(0)
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        let sink = RecordingSink::new();
        let err = engine.run_flow(FlowKind::Discover, &sink).await.unwrap_err();
        assert!(err.is_connectivity());

        let snap = engine.state().snapshot();
        assert!(!snap.loading);
        assert!(snap.error.is_some());
        assert!(snap.analysis.is_none());
        match sink.events().last() {
            Some((_, Recorded::Error(FlowKind::Discover, message))) => {
                assert!(message.contains("/agent/discover"), "{message}");
                assert!(message.contains("500"), "{message}");
            }
            other => panic!("expected a discover error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scaled_timeline_stops_when_request_fails_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/Metrics"))
            .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config_for(&server.uri());
        cfg.timeline_scale = 1.0;
        let first_entry = cfg.timelines.analysis.entries()[0].offset_ms;
        let engine = AgentEngine::new(&cfg, AnalysisState::new()).unwrap();
        let sink = RecordingSink::new();

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            Duration::from_millis(first_entry),
            engine.run_flow(FlowKind::Analyze, &sink),
        )
        .await
        .expect("failure should end the flow before the timeline does");
        assert!(result.unwrap_err().is_connectivity());
        assert!(started.elapsed() < Duration::from_millis(first_entry));

        let snap = engine.state().snapshot();
        assert!(!snap.loading);
        assert!(snap.error.is_some());
        assert!(sink.log_times().is_empty());
        assert!(sink.progress().iter().all(|p| p.percentage < 100.0));
    }

    #[tokio::test]
    async fn analysis_with_null_fields_still_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/Metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "comparison": [{"component": "Database", "current": null, "recommended": "21c", "why": null}],
                "recommendations": null,
                "strategy": {"how": null, "when": "Q3"},
                "stats": {"stats_type": "database", "invalid_objects": [{"owner": "WATS", "object_type": "VIEW", "invalid_count": 4.0}]},
                "sharepoint": {"total_files": 10.0, "total_sites": null, "storage_used_bytes": 2147483648.0},
                "compatibility": []
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        let sink = RecordingSink::new();
        let out = engine.run_flow(FlowKind::Analyze, &sink).await.unwrap();

        let FlowOutput::Analysis(a) = out else {
            panic!("analyze should return analysis output");
        };
        assert_eq!(a.comparison[0].why, "");
        assert!(a.recommendations.is_empty());
        let sp = a.sharepoint.as_ref().unwrap();
        assert_eq!(sp.storage_used_bytes, 2_147_483_648);
        assert_eq!(sp.total_files, 10);
        assert_eq!(crate::metrics::invalid_objects_total(&a), 4);
        assert!(engine.state().snapshot().error.is_none());
    }

    #[tokio::test]
    async fn empty_metrics_surfaces_as_state_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/Metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        let sink = RecordingSink::new();
        let err = engine.run_flow(FlowKind::Analyze, &sink).await.unwrap_err();
        assert!(err.is_data_absence());
        let snap = engine.state().snapshot();
        assert!(snap.error.unwrap().contains("no data returned"));
        assert!(!snap.loading);

        // Refresh reports the same absence rather than succeeding quietly.
        let err = engine.run_flow(FlowKind::Refresh, &sink).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyResult { .. }));
        assert!(engine.state().snapshot().error.is_some());
    }

    #[tokio::test]
    async fn compatibility_result_is_stored_separately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent/compatibility"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"matrix": [1, 2]})))
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        let sink = RecordingSink::new();
        engine
            .run_flow(FlowKind::Compatibility, &sink)
            .await
            .unwrap();

        let snap = engine.state().snapshot();
        assert_eq!(snap.compatibility, Some(json!({"matrix": [1, 2]})));
        assert!(snap.analysis.is_none());
        assert_eq!(
            sink.progress().last().unwrap().status,
            "Compatibility Check Complete"
        );
    }

    #[tokio::test]
    async fn refresh_plays_no_timeline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/Metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metrics_body()))
            .expect(1)
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        let sink = RecordingSink::new();
        engine.run_flow(FlowKind::Refresh, &sink).await.unwrap();
        assert!(sink.log_times().is_empty());
        assert!(sink.progress().is_empty());
    }

    #[tokio::test]
    async fn busy_slot_refuses_without_touching_state() {
        let server = MockServer::start().await;
        let engine = engine_for(&server);
        let _held = engine.state().begin(FlowKind::Gather).unwrap();

        let sink = RecordingSink::new();
        let err = engine.run_flow(FlowKind::Analyze, &sink).await.unwrap_err();
        assert!(matches!(err, AgentError::Busy { active: FlowKind::Gather }));
        assert!(sink.events().is_empty());
        assert!(engine.state().snapshot().loading);
    }
}
