//! Shared HTTP transport for all entity operations and task polls

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::error::ApiError;

/// Header carrying the API key on every request (`MC-Api-Key` on the wire,
/// header names are case-insensitive)
pub const API_KEY_HEADER: &str = "mc-api-key";

#[derive(Debug, Clone)]
pub struct ConnectionPoolConfig {
    pub max_idle_connections: usize,
    pub idle_timeout: Duration,
    pub connection_timeout: Duration,
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 10,
            idle_timeout: Duration::from_secs(90),
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            tcp_keepalive: Some(Duration::from_secs(30)),
        }
    }
}

/// Outcome of one request as seen by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    RemoteError,
    TransportError,
    /// 2xx response whose body is not a valid envelope
    DecodeError,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub remote_errors: u64,
    pub transport_errors: u64,
    pub decode_errors: u64,
    pub last_request: Option<Instant>,
}

impl ConnectionStats {
    pub fn failed_requests(&self) -> u64 {
        self.remote_errors + self.transport_errors + self.decode_errors
    }
}

pub struct ConnectionPoolManager {
    stats: Arc<RwLock<ConnectionStats>>,
    config: ConnectionPoolConfig,
}

impl ConnectionPoolManager {
    pub fn new(config: ConnectionPoolConfig) -> Self {
        Self {
            stats: Arc::new(RwLock::new(ConnectionStats::default())),
            config,
        }
    }

    pub async fn record_request(&self, outcome: RequestOutcome) {
        let mut stats = self.stats.write().await;
        stats.total_requests += 1;
        match outcome {
            RequestOutcome::Success => {}
            RequestOutcome::RemoteError => stats.remote_errors += 1,
            RequestOutcome::TransportError => stats.transport_errors += 1,
            RequestOutcome::DecodeError => stats.decode_errors += 1,
        }
        stats.last_request = Some(Instant::now());
    }

    pub async fn get_stats(&self) -> ConnectionStats {
        self.stats.read().await.clone()
    }

    /// Build the pooled client. The API key and JSON content type are set as
    /// default headers so no call site can forget them.
    pub fn build_client(&self, api_key: &str, insecure: bool) -> Result<reqwest::Client, ApiError> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| ApiError::InvalidConfig("API key contains invalid characters".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(insecure)
            .timeout(self.config.request_timeout)
            .connect_timeout(self.config.connection_timeout)
            .pool_idle_timeout(self.config.idle_timeout)
            .pool_max_idle_per_host(self.config.max_idle_connections);

        if let Some(keepalive) = self.config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        Ok(builder.build()?)
    }
}
