use crate::engine::agent::AgentClient;
use crate::engine::enrich::enrich_analysis;
use crate::error::AgentError;
use reqwest::{Method, Url};
use serde_json::Value;

/// What to do with a successful response body before handing it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    AsIs,
    /// The body must be a non-empty array of objects; keep the first one and
    /// fetch any of its missing optional blocks.
    FirstElementEnriched,
}

/// Exactly one primary request, normalized into `Result<Value, AgentError>`.
pub struct RemoteOperation<'a> {
    client: &'a AgentClient,
    method: Method,
    url: Url,
    post: PostProcess,
}

impl<'a> RemoteOperation<'a> {
    pub fn new(client: &'a AgentClient, method: Method, url: Url) -> Self {
        Self {
            client,
            method,
            url,
            post: PostProcess::AsIs,
        }
    }

    pub fn post_process(mut self, post: PostProcess) -> Self {
        self.post = post;
        self
    }

    pub fn discover(client: &'a AgentClient) -> Self {
        Self::new(client, Method::POST, client.endpoints().discover.clone())
    }

    pub fn analysis(client: &'a AgentClient) -> Self {
        Self::new(client, Method::GET, client.endpoints().metrics.clone())
            .post_process(PostProcess::FirstElementEnriched)
    }

    pub fn compatibility(client: &'a AgentClient) -> Self {
        Self::new(client, Method::POST, client.endpoints().compatibility.clone())
    }

    pub fn data_gathering(client: &'a AgentClient) -> Self {
        Self::new(client, Method::POST, client.endpoints().data_gathering.clone())
    }

    pub async fn execute(self) -> Result<Value, AgentError> {
        let body = self.client.request_json(self.method, &self.url).await?;
        match self.post {
            PostProcess::AsIs => Ok(body),
            PostProcess::FirstElementEnriched => {
                let first = first_element(&self.url, body)?;
                if !first.is_object() {
                    return Err(AgentError::UnexpectedShape {
                        url: self.url.to_string(),
                        expected: "an array of objects",
                    });
                }
                Ok(enrich_analysis(self.client, first).await)
            }
        }
    }
}

fn first_element(url: &Url, body: Value) -> Result<Value, AgentError> {
    match body {
        Value::Array(items) => items.into_iter().next().ok_or_else(|| AgentError::EmptyResult {
            url: url.to_string(),
        }),
        Value::Null => Err(AgentError::EmptyResult {
            url: url.to_string(),
        }),
        _ => Err(AgentError::UnexpectedShape {
            url: url.to_string(),
            expected: "a JSON array",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::agent::testing::config_for;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn first_element_distinguishes_empty_from_wrong_shape() {
        let url = Url::parse("http://agent/api/Metrics").unwrap();
        assert_eq!(
            first_element(&url, json!([{"a": 1}, {"a": 2}])).unwrap(),
            json!({"a": 1})
        );
        assert!(first_element(&url, json!([])).unwrap_err().is_data_absence());
        assert!(first_element(&url, Value::Null).unwrap_err().is_data_absence());
        assert!(matches!(
            first_element(&url, json!({"a": 1})),
            Err(AgentError::UnexpectedShape { .. })
        ));
    }

    #[tokio::test]
    async fn empty_analysis_array_is_empty_result_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/Metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        // No enrichment may happen for a missing primary.
        Mock::given(method("GET"))
            .and(path("/api/DatabaseStats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let client = AgentClient::new(&config_for(&server.uri())).unwrap();
        let err = RemoteOperation::analysis(&client).execute().await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyResult { .. }));
        assert!(err.to_string().starts_with("no data returned"));
    }

    #[tokio::test]
    async fn analysis_takes_first_element_and_enriches_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/Metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"stats": {"id": "s"}, "sharepoint": {"total_files": 1}, "roadmap": []},
                {"ignored": true}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/CompatibilityMatrix"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "m"}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = AgentClient::new(&config_for(&server.uri())).unwrap();
        let v = RemoteOperation::analysis(&client).execute().await.unwrap();
        assert_eq!(v["stats"]["id"], "s");
        assert_eq!(v["compatibility"][0]["id"], "m");
        assert!(v.get("ignored").is_none());
    }

    #[tokio::test]
    async fn compatibility_passes_body_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent/compatibility"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"matrix": []})))
            .mount(&server)
            .await;

        let client = AgentClient::new(&config_for(&server.uri())).unwrap();
        let v = RemoteOperation::compatibility(&client).execute().await.unwrap();
        assert_eq!(v, json!({"matrix": []}));
    }
}
