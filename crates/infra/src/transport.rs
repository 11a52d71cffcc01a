//! Shared outbound HTTP client.

use std::time::Duration;

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by the store clients, the forwarder and the
/// e-mail dispatcher.
///
/// Every request is bounded by `request_timeout`; connecting is bounded by the
/// smaller of `request_timeout` and ten seconds.
pub fn build_http_client(request_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(request_timeout.min(MAX_CONNECT_TIMEOUT))
        .build()
}
