//! Best-effort fan-out of the cache file to every destination
//!
//! Destinations are processed strictly in configuration order. Each one is
//! isolated: an unknown type, a misconfigured entry, a missing transport or a
//! failed upload is logged, recorded in the [`DispatchReport`] and the next
//! destination is attempted.

use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::config::DestinationSpec;
use crate::registry::TransportRegistry;

/// Result of publishing to a single destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The cache file was uploaded
    Published,

    /// The destination was not attempted
    Skipped { reason: String },

    /// The transport reported an error
    Failed { error: String },
}

/// One destination and what happened to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Destination name
    pub destination: String,
    /// Destination `type` tag
    pub kind: String,
    pub status: DispatchStatus,
}

/// Outcomes for every destination, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn published_count(&self) -> usize {
        self.count(|s| matches!(s, DispatchStatus::Published))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, DispatchStatus::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, DispatchStatus::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&DispatchStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Routes destinations to their registered transport
pub struct Dispatcher {
    registry: TransportRegistry,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`
    pub fn new(registry: TransportRegistry) -> Self {
        Self { registry }
    }

    /// Publish `cache_file` to every destination, in order
    pub async fn dispatch_all(
        &self,
        destinations: &[DestinationSpec],
        cache_file: &Path,
    ) -> DispatchReport {
        info!("Got {} destinations", destinations.len());

        let mut report = DispatchReport::default();
        for destination in destinations {
            let status = self.dispatch(destination, cache_file).await;
            report.outcomes.push(DispatchOutcome {
                destination: destination.name(),
                kind: destination.type_name().to_string(),
                status,
            });
        }
        report
    }

    /// Publish `cache_file` to a single destination
    pub async fn dispatch(&self, destination: &DestinationSpec, cache_file: &Path) -> DispatchStatus {
        if let DestinationSpec::Invalid { reason, .. } = destination {
            error!(
                "Failed to upload to {}: invalid {} destination: {}",
                destination.name(),
                destination.type_name(),
                reason
            );
            return DispatchStatus::Failed {
                error: reason.clone(),
            };
        }

        let Some(kind) = destination.kind() else {
            warn!("Don't have option for {}", destination.type_name());
            debug!("{:?}", destination);
            return DispatchStatus::Skipped {
                reason: format!("unknown destination type: {}", destination.type_name()),
            };
        };

        let Some(transport) = self.registry.get(kind) else {
            warn!(
                "No transport registered for {} destination {}",
                kind,
                destination.name()
            );
            return DispatchStatus::Skipped {
                reason: format!("no transport registered for {}", kind),
            };
        };

        info!("Executing operation {}", destination.name());
        match transport.publish(destination, cache_file).await {
            Ok(()) => {
                debug!(
                    "Published {} to {} via {}",
                    cache_file.display(),
                    destination.name(),
                    transport.transport_name()
                );
                DispatchStatus::Published
            }
            Err(e) => {
                error!("Failed to upload to {}: {}", destination.name(), e);
                DispatchStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}
