//! Test helpers for the cloud.ca API

use std::time::Duration;

use super::{Client, ClientConfig, PollConfig};

pub const TEST_API_KEY: &str = "test-api-key";

/// Client with a short poll interval so polling tests run quickly
pub fn create_test_client(url: &str) -> Client {
    let poll = PollConfig::default().with_interval(Duration::from_millis(10));
    create_test_client_with_poll(url, poll)
}

pub fn create_test_client_with_poll(url: &str, poll: PollConfig) -> Client {
    init_tracing();
    let config = ClientConfig::new(url, TEST_API_KEY)
        .with_insecure(true)
        .with_poll(poll);
    Client::with_config(config).unwrap()
}

/// Route tracing output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
