// # HTTP Echo Service
//
// This crate provides the HTTP(S) echo service for the public IP poster.
//
// ## Purpose
//
// Each [`HttpEchoService`] performs one GET against a plain-text
// "what is my IP" endpoint (e.g. `https://ipinfo.io/ip`) and returns the body.
//
// ## Behaviour
//
// - Fixed 5 second timeout per request
// - Non-success status codes are errors
// - The body is returned as-is; trimming and validation happen in
//   `ippost_core::AddressResolver`

use async_trait::async_trait;
use ippost_core::traits::EchoService;
use ippost_core::{Error, Result};
use std::time::Duration;

/// Request timeout for echo services
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Plain-text IP echo endpoint reached over HTTP(S)
pub struct HttpEchoService {
    /// URL to fetch the address from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpEchoService {
    /// Create an echo service sharing an existing client
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl EchoService for HttpEchoService {
    fn identity(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::echo_service(&self.url, format!("Request failed: {}", e)))?;

        let response = response
            .error_for_status()
            .map_err(|e| Error::echo_service(&self.url, format!("HTTP error: {}", e)))?;

        let body = response.text().await.map_err(|e| {
            Error::echo_service(&self.url, format!("Failed to read response: {}", e))
        })?;

        tracing::debug!("{} answered {} byte(s)", self.url, body.len());
        Ok(body)
    }
}

/// Build the shared HTTP client used by every echo service
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("ippost/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Echo services for `urls`, in order, sharing one client
pub fn services_for(urls: &[String]) -> Result<Vec<Box<dyn EchoService>>> {
    let client = build_client()?;
    Ok(urls
        .iter()
        .map(|url| {
            let service = HttpEchoService::with_client(url.clone(), client.clone());
            Box::new(service) as Box<dyn EchoService>
        })
        .collect())
}
