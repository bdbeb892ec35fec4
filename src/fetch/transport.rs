use crate::core::config::TransportConfig;
use crate::core::constants::{REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::fetch::error::FetchError;
use crate::prelude::Duration;
use crate::MapError;
use async_trait::async_trait;
use once_cell::sync::Lazy;

/// Shared async HTTP client with the default timeout and user agent
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .expect("failed to build reqwest async client")
});

/// Raw answer from an endpoint, before status classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The single network seam of the pipeline.
///
/// Implementations only move bytes: status codes are returned as data and
/// classified by the coordinator. Connectivity problems and timeouts map to
/// [`FetchError::NetworkFailure`].
#[async_trait]
pub trait GeoDataTransport: Send + Sync {
    async fn post_query(&self, endpoint: &str, query: &str)
        -> Result<TransportResponse, FetchError>;
}

/// Form-encoded POST over reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a dedicated client honouring the configured timeout and user agent
    pub fn new(config: &TransportConfig) -> Result<Self, MapError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Uses the process-wide client
    pub fn shared() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::shared()
    }
}

#[async_trait]
impl GeoDataTransport for HttpTransport {
    async fn post_query(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<TransportResponse, FetchError> {
        let network_failure = |err: reqwest::Error| FetchError::NetworkFailure {
            endpoint: endpoint.to_string(),
            message: if err.is_timeout() {
                format!("request timed out: {err}")
            } else {
                err.to_string()
            },
        };

        let response = self
            .client
            .post(endpoint)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .form(&[("data", query)])
            .send()
            .await
            .map_err(network_failure)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(network_failure)?;
        log::trace!("{endpoint} answered {status} with {} bytes", body.len());
        Ok(TransportResponse { status, body })
    }
}
