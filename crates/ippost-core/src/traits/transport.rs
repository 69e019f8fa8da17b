// # Transport Trait
//
// Defines the interface for publishing the cache file to a destination.
//
// ## Implementations
//
// - SCP over SSH: `ippost-transport-scp` crate

use async_trait::async_trait;
use std::path::Path;

use crate::config::{DestinationKind, DestinationSpec};

/// Trait for transport implementations
///
/// A transport handles exactly one [`DestinationKind`]. It is registered in a
/// [`TransportRegistry`](crate::registry::TransportRegistry) and invoked by the
/// [`Dispatcher`](crate::dispatch::Dispatcher) once per matching destination.
///
/// # Resource Handling
///
/// Every connection opened by `publish` must be closed before it returns, on
/// success and on every error path.
///
/// ## Forbidden Capabilities
/// - ❌ Retry failed uploads
/// - ❌ Modify the cache file
/// - ❌ Decide whether a destination should be skipped (owned by `Dispatcher`)
#[async_trait]
pub trait Transport: Send + Sync {
    /// The destination kind this transport publishes to
    fn kind(&self) -> DestinationKind;

    /// Publish `cache_file` to `destination`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The file was uploaded
    /// - `Err(Error)`: Connection, authentication or transfer failure, or a
    ///   destination of the wrong kind
    async fn publish(&self, destination: &DestinationSpec, cache_file: &Path)
    -> Result<(), crate::Error>;

    /// Transport name for logs
    fn transport_name(&self) -> &'static str {
        self.kind().as_str()
    }
}
