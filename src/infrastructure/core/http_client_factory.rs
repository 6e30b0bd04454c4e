use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates a new HTTP client with retry middleware
    pub fn create_client(request_timeout: Duration) -> ClientWithMiddleware {
        // Transient failures (connect errors, 5xx, 429) are retried twice with
        // exponential backoff before the caller sees the error.
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    /// Plain client for one-shot liveness probes; no retries.
    pub fn create_probe_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}

/// Join a path onto a base URL, tolerating a missing trailing slash on the base.
pub fn join_url(base: &str, path: &str) -> Result<url::Url, url::ParseError> {
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    url::Url::parse(&normalized)?.join(path.trim_start_matches('/'))
}
