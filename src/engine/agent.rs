use crate::error::AgentError;
use crate::model::{Endpoints, RunConfig};
use anyhow::{Context, Result};
use reqwest::{Method, Url};
use serde_json::Value;

/// HTTP client for the discovery agent and its metrics API.
#[derive(Debug, Clone)]
pub struct AgentClient {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoints: Endpoints,
}

impl AgentClient {
    pub fn new(cfg: &RunConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(cfg.user_agent.clone());
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("build HTTP client")?;
        Ok(Self {
            http,
            endpoints: cfg.endpoints.clone(),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Issue one request and decode its JSON body. POSTs carry an empty JSON object.
    ///
    /// An empty success body decodes to `Value::Null`: several agent endpoints
    /// answer `200` with nothing to say.
    pub async fn request_json(&self, method: Method, url: &Url) -> Result<Value, AgentError> {
        let url_str = url.as_str();
        tracing::debug!(%method, url = url_str, "issuing request");

        let mut req = self.http.request(method.clone(), url.clone());
        if method == Method::POST {
            req = req.json(&serde_json::json!({}));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(url_str, e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%method, url = url_str, %status, "agent returned error status");
            return Err(AgentError::Status {
                url: url_str.to_string(),
                status,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| AgentError::from_reqwest(url_str, e))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| AgentError::Decode {
            url: url_str.to_string(),
            reason: e.to_string(),
        })
    }
}
