use std::fmt;

use async_trait::async_trait;
use lattice_config::Config;
use lattice_document::WorkflowDocument;
use lattice_resource_id::{PROVIDER_NAMESPACE, WorkflowId};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::client::WorkflowClient;
use crate::error::ClientError;

/// Response of `listCallbackUrl`.
#[derive(Debug, Deserialize)]
struct CallbackUrl {
  value: Option<String>,
}

/// Workflow client backed by the resource manager REST API.
pub struct HttpWorkflowClient {
  http: reqwest::Client,
  endpoint: Url,
  api_version: String,
  token: String,
}

impl HttpWorkflowClient {
  /// Create a client with an explicit bearer token.
  pub fn new(config: &Config, token: impl Into<String>) -> Result<Self, ClientError> {
    let endpoint = Url::parse(&config.endpoint)
      .map_err(|e| ClientError::Endpoint(format!("{}: {}", config.endpoint, e)))?;
    if endpoint.cannot_be_a_base() {
      return Err(ClientError::Endpoint(format!(
        "{}: not a base URL",
        config.endpoint
      )));
    }

    let http = reqwest::Client::builder()
      .timeout(config.request_timeout())
      .build()?;

    Ok(Self {
      http,
      endpoint,
      api_version: config.api_version.clone(),
      token: token.into(),
    })
  }

  /// Create a client, reading the bearer token from `config.token_env`.
  pub fn from_env(config: &Config) -> Result<Self, ClientError> {
    let token = std::env::var(&config.token_env)
      .ok()
      .filter(|token| !token.trim().is_empty())
      .ok_or_else(|| ClientError::MissingToken {
        var: config.token_env.clone(),
      })?;

    Self::new(config, token)
  }

  /// URL of a workflow, with `extra` path segments appended.
  fn workflow_url(&self, id: &WorkflowId, extra: &[&str]) -> Result<Url, ClientError> {
    let mut url = self.endpoint.clone();
    url
      .path_segments_mut()
      .map_err(|_| ClientError::Endpoint(format!("{}: not a base URL", self.endpoint)))?
      .pop_if_empty()
      .extend([
        "subscriptions",
        id.subscription_id.as_str(),
        "resourceGroups",
        id.resource_group_name.as_str(),
        "providers",
        PROVIDER_NAMESPACE,
        "workflows",
        id.workflow_name.as_str(),
      ])
      .extend(extra);
    url
      .query_pairs_mut()
      .append_pair("api-version", &self.api_version);
    Ok(url)
  }

  /// Send a request, mapping 404 to [`ClientError::NotFound`] and any other
  /// non-success status to [`ClientError::Status`].
  async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request.bearer_auth(&self.token).send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
      return Err(ClientError::NotFound);
    }
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(ClientError::Status {
        status: status.as_u16(),
        body,
      });
    }

    Ok(response)
  }
}

impl fmt::Debug for HttpWorkflowClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HttpWorkflowClient")
      .field("endpoint", &self.endpoint.as_str())
      .field("api_version", &self.api_version)
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
  async fn get_workflow(&self, id: &WorkflowId) -> Result<WorkflowDocument, ClientError> {
    let url = self.workflow_url(id, &[])?;
    debug!(%url, "GET workflow");

    let response = self.send(self.http.get(url)).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
  }

  async fn replace_workflow(
    &self,
    id: &WorkflowId,
    document: &WorkflowDocument,
  ) -> Result<(), ClientError> {
    let url = self.workflow_url(id, &[])?;
    debug!(%url, "PUT workflow");

    self.send(self.http.put(url).json(document)).await?;
    Ok(())
  }

  async fn delete_workflow(&self, id: &WorkflowId) -> Result<(), ClientError> {
    let url = self.workflow_url(id, &[])?;
    debug!(%url, "DELETE workflow");

    self.send(self.http.delete(url)).await?;
    Ok(())
  }

  async fn trigger_callback_url(
    &self,
    id: &WorkflowId,
    trigger_name: &str,
  ) -> Result<String, ClientError> {
    let url = self.workflow_url(id, &["triggers", trigger_name, "listCallbackUrl"])?;
    debug!(%url, "POST listCallbackUrl");

    let response = self
      .send(self.http.post(url).json(&serde_json::Map::new()))
      .await?;
    let body = response.bytes().await?;
    let callback: CallbackUrl = serde_json::from_slice(&body)?;

    callback
      .value
      .ok_or(ClientError::MissingField { field: "value" })
  }
}
