//! HTTP client factory with consistent timeout configuration.
//!
//! Outbound clients are built here rather than with `reqwest::Client`
//! directly so every remote call has a connect and a total timeout.

use std::time::Duration;

use reqwest::Client;

use crate::infra::{config::GatewayConfig, error::InfraError};

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout for email delivery and other short API calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build an HTTP client with default timeouts.
pub fn try_build_client() -> Result<Client, InfraError> {
    build_with(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
}

/// Build the client used for the commerce platform, with its own timeouts.
pub fn try_build_gateway_client(config: &GatewayConfig) -> Result<Client, InfraError> {
    build_with(config.connect_timeout, config.request_timeout)
}

fn build_with(connect_timeout: Duration, request_timeout: Duration) -> Result<Client, InfraError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(InfraError::HttpClient)
}
