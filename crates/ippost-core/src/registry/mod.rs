//! Transport registry
//!
//! Transports are registered per [`DestinationKind`], so dispatch is a lookup
//! on a closed enum rather than a chain of string comparisons.
//!
//! ## Registration
//!
//! Transport crates expose a `register()` function:
//!
//! ```rust,ignore
//! // In ippost-transport-scp
//! pub fn register(registry: &mut TransportRegistry) {
//!     registry.register(Box::new(ScpTransport::new()));
//! }
//! ```

use std::collections::HashMap;

use crate::config::DestinationKind;
use crate::traits::Transport;

/// Registry of transports, one per destination kind
#[derive(Default)]
pub struct TransportRegistry {
    transports: HashMap<DestinationKind, Box<dyn Transport>>,
}

impl TransportRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport under its own [`Transport::kind`]
    ///
    /// A transport already registered for the same kind is replaced and returned.
    pub fn register(&mut self, transport: Box<dyn Transport>) -> Option<Box<dyn Transport>> {
        self.transports.insert(transport.kind(), transport)
    }

    /// Transport for `kind`, if one is registered
    pub fn get(&self, kind: DestinationKind) -> Option<&dyn Transport> {
        self.transports.get(&kind).map(|t| t.as_ref())
    }

    /// Check if a transport is registered for `kind`
    pub fn has_transport(&self, kind: DestinationKind) -> bool {
        self.transports.contains_key(&kind)
    }

    /// List all registered destination kinds
    pub fn list_kinds(&self) -> Vec<DestinationKind> {
        self.transports.keys().copied().collect()
    }
}
