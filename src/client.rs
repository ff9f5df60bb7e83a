//! HTTP dispatch for Orchestrate API operations.

use std::sync::Arc;

use reqwest::{Client as ReqwestClient, Method, Response};
use url::Url;

use crate::collection::Collection;
use crate::conditional::ConditionalIntent;
use crate::error::{classify, OrchestrateError, Result};
use crate::url_builder::UrlBuilder;

const DEFAULT_SCHEME: &str = "https";
const DEFAULT_HOST: &str = "api.orchestrate.io";
const DEFAULT_USER_AGENT: &str = "orchestrate-client-rust/0.1.0";

/// API version prefix shared by every request path.
pub(crate) const API_VERSION: &str = "v0";

/// Header carrying the server-assigned request id.
const REQUEST_ID_HEADER: &str = "x-orchestrate-req-id";

/// Client configuration (endpoint and credentials)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a configuration against the hosted service endpoint
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set the host
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the scheme
    pub fn with_scheme<S: Into<String>>(mut self, scheme: S) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the User-Agent header value
    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Point the configuration at a full base URL, e.g.
    /// `http://127.0.0.1:3000` for a local or test endpoint.
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        let url = Url::parse(base)?;
        let host = url
            .host_str()
            .ok_or_else(|| OrchestrateError::validation(format!("base URL has no host: {base}")))?
            .to_string();
        self.scheme = url.scheme().to_string();
        self.host = host;
        self.port = url.port();
        Ok(self)
    }
}

/// Normalized response record handed back by the dispatcher.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw `ETag` header value, empty when absent
    pub etag: String,
    /// Raw `Location` header value, empty when absent
    pub location: String,
    /// Server-assigned request id, empty when absent
    pub request_id: String,
    /// Response body text
    pub body: String,
}

impl ApiResponse {
    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for the Orchestrate API
#[derive(Debug, Clone)]
pub struct OrchestrateClient {
    http: Arc<ReqwestClient>,
    config: Arc<ClientConfig>,
}

impl OrchestrateClient {
    /// Create a client for the hosted service with the given API key
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        Self::with_config(ClientConfig::new(api_key))
    }

    /// Create a client from an explicit configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http = ReqwestClient::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http: Arc::new(http),
            config: Arc::new(config),
        })
    }

    /// Get a handle on a named collection
    pub fn collection<S: Into<String>>(&self, name: S) -> Collection {
        Collection::new(self.clone(), name.into())
    }

    /// Validate connectivity and credentials with a `HEAD` request
    pub async fn ping(&self) -> Result<()> {
        let url = self.url().to_url()?;
        self.request(Method::HEAD, url, &ConditionalIntent::Unconditional, None, None)
            .await?;
        Ok(())
    }

    /// Delete an entire collection and all of its records
    pub async fn delete_collection(&self, collection: &str) -> Result<()> {
        if collection.is_empty() {
            return Err(OrchestrateError::validation("collection must not be empty"));
        }
        let url = self
            .url()
            .append_component(collection)
            .add_query("force", "true")
            .to_url()?;
        self.request(Method::DELETE, url, &ConditionalIntent::Unconditional, None, None)
            .await?;
        Ok(())
    }

    /// Fresh builder rooted at the configured endpoint with the API
    /// version prefix attached. One builder per request.
    pub(crate) fn url(&self) -> UrlBuilder {
        UrlBuilder::from_parts(&self.config.scheme, &self.config.host, self.config.port)
            .append_path(API_VERSION)
    }

    /// Issue one request and classify a non-success response into a typed
    /// failure.
    pub(crate) async fn request(
        &self,
        method: Method,
        url: Url,
        intent: &ConditionalIntent,
        content_type: Option<&str>,
        body: Option<String>,
    ) -> Result<ApiResponse> {
        let response = self.send(method, url, intent, content_type, body).await?;
        Self::success(response)
    }

    /// One request/response unit of work: send and normalize. The status
    /// is returned as-is; no retries, no classification.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        intent: &ConditionalIntent,
        content_type: Option<&str>,
        body: Option<String>,
    ) -> Result<ApiResponse> {
        #[cfg(feature = "tracing")]
        tracing::debug!(method = %method, url = %url, "dispatching request");

        let mut request_builder = self
            .http
            .request(method, url)
            .basic_auth(&self.config.api_key, Some(""));

        if let Some((name, value)) = intent.header() {
            request_builder = request_builder.header(name, value);
        }

        if let Some(body) = body {
            request_builder = request_builder
                .header("Content-Type", content_type.unwrap_or("application/json"))
                .body(body);
        }

        let response = request_builder.send().await?;

        let status = response.status().as_u16();
        let etag = header_value(&response, "etag");
        let location = header_value(&response, "location");
        let request_id = header_value(&response, REQUEST_ID_HEADER);
        let body = response.text().await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(status, request_id = %request_id, "received response");

        Ok(ApiResponse {
            status,
            etag,
            location,
            request_id,
            body,
        })
    }

    /// Surface a non-success response as its classified failure.
    pub(crate) fn success(response: ApiResponse) -> Result<ApiResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(classify(response.status, &response.request_id, &response.body).into())
        }
    }
}

fn header_value(response: &Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("key");

        assert_eq!(config.scheme, "https");
        assert_eq!(config.host, "api.orchestrate.io");
        assert_eq!(config.port, None);
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("key")
            .with_scheme("http")
            .with_host("localhost")
            .with_port(3000)
            .with_user_agent("tests/0.0");

        assert_eq!(config.scheme, "http");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, Some(3000));
        assert_eq!(config.user_agent, "tests/0.0");
    }

    #[test]
    fn test_config_with_base_url() {
        let config = ClientConfig::new("key")
            .with_base_url("http://127.0.0.1:3000")
            .unwrap();

        assert_eq!(config.scheme, "http");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, Some(3000));
    }

    #[test]
    fn test_client_url_carries_version_prefix() {
        let client = OrchestrateClient::new("key").unwrap();

        assert_eq!(client.url().render(), "https://api.orchestrate.io/v0");
    }

    #[test]
    fn test_success_classifies_failures() {
        let response = ApiResponse {
            status: 404,
            etag: String::new(),
            location: String::new(),
            request_id: "req-1".to_string(),
            body: r#"{"message":"missing","code":"items_not_found"}"#.to_string(),
        };

        let error = OrchestrateClient::success(response).unwrap_err();
        match error {
            OrchestrateError::Request(failure) => {
                assert_eq!(failure.status, 404);
                assert!(matches!(failure.kind, FailureKind::NotFound { .. }));
            }
            other => panic!("expected a request failure, got {other:?}"),
        }
    }
}
