use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

use super::config::{ClientConfig, PollConfig};
use super::context::Context;
use super::entity::{EntityApi, EntityRef, EntityRegistry, EntityType};
use super::error::ApiError;
use super::options::QueryOptions;
use super::pool::{ConnectionPoolManager, ConnectionStats, RequestOutcome};
use super::response::ResponseEnvelope;
use super::task::TaskPoller;

/// cloud.ca API client. Cloning is cheap and clones share one connection pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    poll: PollConfig,
    pool_manager: ConnectionPoolManager,
}

impl Client {
    /// Create a new API client with default pool and poll configuration
    pub fn new(api_url: &str, api_key: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::with_config(ClientConfig::new(api_url, api_key).with_insecure(insecure))
    }

    /// Create a new API client from `CLOUDCA_*` environment variables
    pub fn from_env() -> Result<Self, ApiError> {
        Self::with_config(ClientConfig::from_env()?)
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url()?;

        if config.api_key.is_empty() {
            return Err(ApiError::InvalidConfig("API key is required".into()));
        }

        let pool_manager = ConnectionPoolManager::new(config.pool);
        let http_client = pool_manager.build_client(&config.api_key, config.insecure)?;

        tracing::debug!("Configured API client for {}", base_url);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                poll: config.poll,
                pool_manager,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.inner.poll
    }

    /// Get connection pool statistics
    pub async fn connection_stats(&self) -> ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    /// Task API operations
    pub fn tasks(&self) -> TaskPoller<'_> {
        TaskPoller::new(self)
    }

    /// Operations on one entity collection of a service environment
    pub fn entity(
        &self,
        service_code: &str,
        environment_name: &str,
        entity_type: EntityType,
    ) -> EntityApi {
        EntityApi::new(
            self.clone(),
            EntityRef::new(service_code, environment_name, entity_type),
        )
    }

    /// All entity collections of a service environment, keyed by type
    pub fn registry(&self, service_code: &str, environment_name: &str) -> EntityRegistry {
        EntityRegistry::with_defaults(self, service_code, environment_name)
    }

    /// Issue one request and classify its response. Non-2xx responses come
    /// back as errors; task references are left for the caller to resolve.
    pub(crate) async fn send(
        &self,
        ctx: &Context,
        method: Method,
        path: &str,
        query: &QueryOptions,
        body: Option<&Value>,
    ) -> Result<ResponseEnvelope, ApiError> {
        let url = format!("{}{}{}", self.inner.base_url, path, query.to_query_string());
        tracing::debug!("{} request to: {}", method, url);

        let mut request = self.inner.http_client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = ctx
            .run(async {
                let response = request.send().await?;
                let status = response.status().as_u16();
                let text = response.text().await?;
                Ok::<_, ApiError>((status, text))
            })
            .await;

        let (status, text) = match exchange {
            Ok(exchange) => exchange,
            Err(e) => {
                if let ApiError::Transport(ref source) = e {
                    tracing::warn!("Request to {} failed: {}", url, source);
                    self.inner
                        .pool_manager
                        .record_request(RequestOutcome::TransportError)
                        .await;
                }
                return Err(e);
            }
        };
        tracing::debug!("Response status: {}, body: {}", status, text);

        let classified = ResponseEnvelope::classify(status, &text);
        let outcome = match &classified {
            Ok(_) => RequestOutcome::Success,
            Err(ApiError::Decode(_)) => RequestOutcome::DecodeError,
            Err(_) => RequestOutcome::RemoteError,
        };
        self.inner.pool_manager.record_request(outcome).await;

        classified
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::pool::API_KEY_HEADER;
    use crate::api::test_helpers::create_test_client;
    use mockito::Server;
    use std::time::Duration;

    #[tokio::test]
    async fn client_sends_api_key_and_json_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/tasks/t-1")
            .match_header(API_KEY_HEADER, "test-api-key")
            .match_header("content-type", "application/json")
            .with_body(r#"{"data":{"id":"t-1","status":"SUCCESS"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let task = client.tasks().get(&Context::new(), "t-1").await.unwrap();
        assert_eq!(task.id, "t-1");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_strips_trailing_slash_from_endpoint() {
        let server = Server::new_async().await;

        let client = Client::new(&format!("{}/", server.url()), "key", true).unwrap();
        assert_eq!(client.base_url(), server.url());
    }

    #[tokio::test]
    async fn client_requires_api_key() {
        let result = Client::new("https://api.cloud.ca/v1", "", false);
        assert!(matches!(result, Err(ApiError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn client_handles_network_errors() {
        let client = create_test_client("http://127.0.0.1:1");

        let result = client
            .send(
                &Context::new(),
                Method::GET,
                "/tasks/t-1",
                &QueryOptions::new(),
                None,
            )
            .await;
        assert!(matches!(result, Err(ApiError::Transport(_))));

        let stats = client.connection_stats().await;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.transport_errors, 1);
    }

    #[tokio::test]
    async fn client_counts_remote_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/tasks/t-1")
            .with_status(500)
            .with_body("")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let result = client.tasks().get(&Context::new(), "t-1").await;
        assert!(matches!(
            result,
            Err(ApiError::ProtocolViolation { status: 500, .. })
        ));

        let stats = client.connection_stats().await;
        assert_eq!(stats.remote_errors, 1);
        assert_eq!(stats.transport_errors, 0);
    }

    #[tokio::test]
    async fn client_counts_undecodable_success_apart_from_remote_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/tasks/t-1")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let result = client.tasks().get(&Context::new(), "t-1").await;
        assert!(matches!(result, Err(ApiError::Decode(_))));

        let stats = client.connection_stats().await;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(stats.remote_errors, 0);
    }

    #[tokio::test]
    async fn client_respects_request_timeout() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/tasks/slow")
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(3));
                w.write_all(b"{}")
            })
            .create_async()
            .await;

        let pool = crate::api::pool::ConnectionPoolConfig {
            request_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let config = ClientConfig::new(server.url(), "key").with_pool(pool);
        let client = Client::with_config(config).unwrap();

        let start = std::time::Instant::now();
        let result = client.tasks().get(&Context::new(), "slow").await;

        assert!(matches!(result, Err(ApiError::Transport(_))));
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
