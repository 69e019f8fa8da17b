//! Multi-source public address resolution
//!
//! The resolver asks every configured [`EchoService`] in order and keeps each
//! valid answer keyed by the service that gave it:
//!
//! | Service answer                | Outcome                     | Log      |
//! |-------------------------------|-----------------------------|----------|
//! | network / status failure      | [`ServiceOutcome::Failed`]  | `warn!`  |
//! | empty body                    | [`ServiceOutcome::Empty`]   | `debug!` |
//! | body that is not an address   | [`ServiceOutcome::Invalid`] | `debug!` |
//! | valid dotted quad             | [`ServiceOutcome::Resolved`]| `info!`  |
//!
//! Answers are not deduplicated or cross-checked. Partial success is normal.

use tracing::{debug, info, warn};

use crate::snapshot::{AddressSnapshot, ResolvedAddress};
use crate::traits::EchoService;

/// What a single echo service contributed to a resolution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// The service returned a valid address
    Resolved(ResolvedAddress),

    /// The service answered with an empty body
    Empty {
        service: String,
    },

    /// The service answered with something that is not an IPv4 address
    Invalid {
        service: String,
        body: String,
    },

    /// The request failed
    Failed {
        service: String,
        error: String,
    },
}

impl ServiceOutcome {
    /// Identity of the service this outcome belongs to
    pub fn service(&self) -> &str {
        match self {
            ServiceOutcome::Resolved(resolved) => resolved.service(),
            ServiceOutcome::Empty { service }
            | ServiceOutcome::Invalid { service, .. }
            | ServiceOutcome::Failed { service, .. } => service,
        }
    }
}

/// Per-service outcomes of one resolution pass, in query order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub outcomes: Vec<ServiceOutcome>,
}

impl ResolutionReport {
    /// Successfully resolved addresses, in query order
    pub fn addresses(&self) -> impl Iterator<Item = &ResolvedAddress> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ServiceOutcome::Resolved(resolved) => Some(resolved),
            _ => None,
        })
    }

    /// Number of services that failed outright
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ServiceOutcome::Failed { .. }))
            .count()
    }

    /// Whether no service produced an address
    pub fn is_empty(&self) -> bool {
        self.addresses().next().is_none()
    }

    /// Snapshot of the resolved addresses, stamped with the current time
    pub fn to_snapshot(&self) -> AddressSnapshot {
        AddressSnapshot::from_addresses(self.addresses().cloned())
    }
}

/// Queries echo services in order and aggregates their answers
pub struct AddressResolver {
    services: Vec<Box<dyn EchoService>>,
}

impl AddressResolver {
    /// Create a resolver over `services`, queried in the given order
    pub fn new(services: Vec<Box<dyn EchoService>>) -> Self {
        Self { services }
    }

    /// Query every service once, sequentially
    ///
    /// Never fails: each service's failure is captured in the report.
    pub async fn resolve(&self) -> ResolutionReport {
        let mut report = ResolutionReport::default();

        for service in &self.services {
            let outcome = Self::query(service.as_ref()).await;
            report.outcomes.push(outcome);
        }

        debug!(
            "Resolution pass finished: {} address(es), {} failure(s)",
            report.addresses().count(),
            report.failed_count()
        );
        report
    }

    async fn query(service: &dyn EchoService) -> ServiceOutcome {
        let identity = service.identity().to_string();
        info!("Attempting to retrieve public IP from {}", identity);

        let body = match service.fetch().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not retrieve IP from {}: {}", identity, e);
                return ServiceOutcome::Failed {
                    service: identity,
                    error: e.to_string(),
                };
            }
        };

        let text = body.trim();
        if text.is_empty() {
            debug!("Empty response from {}, skipping", identity);
            return ServiceOutcome::Empty { service: identity };
        }

        match ResolvedAddress::parse(identity.clone(), text) {
            Some(resolved) => {
                info!("Retrieved public IP: {} from {}", resolved.address(), identity);
                ServiceOutcome::Resolved(resolved)
            }
            None => {
                debug!("Response from {} is not an IPv4 address: {:?}", identity, text);
                ServiceOutcome::Invalid {
                    service: identity,
                    body: text.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;

    struct StaticService {
        url: &'static str,
        answer: std::result::Result<&'static str, &'static str>,
    }

    impl StaticService {
        fn ok(url: &'static str, body: &'static str) -> Box<dyn EchoService> {
            Box::new(Self {
                url,
                answer: Ok(body),
            })
        }

        fn failing(url: &'static str, error: &'static str) -> Box<dyn EchoService> {
            Box::new(Self {
                url,
                answer: Err(error),
            })
        }
    }

    #[async_trait]
    impl EchoService for StaticService {
        fn identity(&self) -> &str {
            self.url
        }

        async fn fetch(&self) -> Result<String, Error> {
            self.answer
                .map(|body| body.to_string())
                .map_err(|e| Error::echo_service(self.url, e))
        }
    }

    #[tokio::test]
    async fn test_network_error_is_skipped() {
        let resolver = AddressResolver::new(vec![
            StaticService::ok("https://a.example/ip", "10.0.0.1"),
            StaticService::failing("https://b.example/ip", "connection refused"),
        ]);

        let report = resolver.resolve().await;
        let snapshot = report.to_snapshot();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get("https://a.example/ip"),
            Some(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_body_adds_no_entry() {
        let resolver = AddressResolver::new(vec![
            StaticService::ok("https://a.example/ip", ""),
            StaticService::ok("https://b.example/ip", "  \n"),
        ]);

        let report = resolver.resolve().await;

        assert!(report.is_empty());
        assert!(matches!(report.outcomes[0], ServiceOutcome::Empty { .. }));
        assert!(matches!(report.outcomes[1], ServiceOutcome::Empty { .. }));
        assert_eq!(report.failed_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_body_adds_no_entry() {
        let resolver = AddressResolver::new(vec![StaticService::ok(
            "https://a.example/ip",
            "<html>rate limited</html>",
        )]);

        let report = resolver.resolve().await;

        assert!(report.is_empty());
        assert_eq!(
            report.outcomes[0],
            ServiceOutcome::Invalid {
                service: "https://a.example/ip".to_string(),
                body: "<html>rate limited</html>".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_body_is_trimmed() {
        let resolver =
            AddressResolver::new(vec![StaticService::ok("https://a.example/ip", "198.51.100.4\n")]);

        let snapshot = resolver.resolve().await.to_snapshot();
        assert_eq!(
            snapshot.get("https://a.example/ip"),
            Some(Ipv4Addr::new(198, 51, 100, 4))
        );
    }

    #[tokio::test]
    async fn test_disagreeing_services_are_both_kept() {
        let resolver = AddressResolver::new(vec![
            StaticService::ok("https://a.example/ip", "1.1.1.1"),
            StaticService::ok("https://b.example/ip", "2.2.2.2"),
        ]);

        let report = resolver.resolve().await;
        let services: Vec<&str> = report.addresses().map(|a| a.service()).collect();

        assert_eq!(services, vec!["https://a.example/ip", "https://b.example/ip"]);
    }

    #[tokio::test]
    async fn test_no_services() {
        let resolver = AddressResolver::new(Vec::new());
        assert!(resolver.resolve().await.is_empty());
    }
}
