// # ippost-core
//
// Core library for the public IP poster.
//
// ## Architecture Overview
//
// One run of the poster discovers the host's public IPv4 address, caches it
// with a TTL and publishes the cache file to every configured destination:
// - **EchoService**: Trait for a single "what is my IP" endpoint
// - **AddressResolver**: Queries echo services in order and keeps every valid answer
// - **FileCacheStore**: Timestamped JSON snapshot on disk, freshness check against a TTL
// - **Transport**: Trait for publishing the cache file to one kind of destination
// - **Dispatcher**: Best-effort fan-out of the cache file over registered transports
// - **Poster**: Wires the steps together for a single invocation
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision rules live here, network collaborators in their own crates
// 2. **Best-Effort Fan-Out**: One failing service or destination never stops the others
// 3. **Tagged Destinations**: Destination kinds are a sum type, never free-form strings in dispatch
// 4. **Library-First**: The binary is a thin layer over this crate

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod snapshot;
pub mod traits;
pub mod validate;

// Re-export core types for convenience
pub use cache::FileCacheStore;
pub use config::{DestinationKind, DestinationSpec, PosterConfig, ScpDestination};
pub use dispatch::{DispatchOutcome, DispatchReport, DispatchStatus, Dispatcher};
pub use engine::{Poster, RunOptions, RunReport, SnapshotOrigin};
pub use error::{Error, Result};
pub use registry::TransportRegistry;
pub use resolver::{AddressResolver, ResolutionReport, ServiceOutcome};
pub use snapshot::{AddressSnapshot, ResolvedAddress};
pub use traits::{EchoService, Transport};
pub use validate::is_valid_ipv4;
