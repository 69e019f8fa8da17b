// # Echo Service Trait
//
// Defines the interface for a single "what is my IP" endpoint.
//
// ## Implementations
//
// - HTTP(S): `ippost-echo-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ippost_core::EchoService;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let service = /* EchoService implementation */;
//
//     let body = service.fetch().await?;
//     println!("{} says {}", service.identity(), body.trim());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for echo service implementations
///
/// An echo service is an observer: it performs one request and returns the
/// raw answer. Validation, trimming and aggregation belong to
/// [`AddressResolver`](crate::resolver::AddressResolver).
///
/// ## Forbidden Capabilities
/// - ❌ Retry failed requests (there are no retries anywhere in a run)
/// - ❌ Validate or reinterpret the body
/// - ❌ Touch the cache store
#[async_trait]
pub trait EchoService: Send + Sync {
    /// Identity of this service, used as the snapshot key (normally its URL)
    fn identity(&self) -> &str;

    /// Fetch the response body
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The raw body, possibly empty or not an address
    /// - `Err(Error)`: Network failure, timeout or non-success status
    async fn fetch(&self) -> Result<String, crate::Error>;
}
