//! Resolved addresses and the snapshot that groups them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::validate::is_valid_ipv4;

/// A validated IPv4 address bound to the service that reported it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    service: String,
    address: Ipv4Addr,
}

impl ResolvedAddress {
    /// Validate `text` and bind it to `service`
    ///
    /// Returns `None` when `text` is not a dotted-quad address.
    pub fn parse(service: impl Into<String>, text: &str) -> Option<Self> {
        if !is_valid_ipv4(text) {
            return None;
        }
        let address = text.parse().ok()?;
        Some(Self {
            service: service.into(),
            address,
        })
    }

    /// Identity (URL) of the reporting service
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The reported address
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }
}

/// Addresses keyed by service identity, with the time they were captured
///
/// `timestamp` is seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub timestamp: f64,
    pub services: BTreeMap<String, Ipv4Addr>,
}

impl AddressSnapshot {
    /// Build a snapshot stamped with the current time
    pub fn from_addresses<I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = ResolvedAddress>,
    {
        Self {
            timestamp: now_epoch_secs(),
            services: addresses
                .into_iter()
                .map(|resolved| (resolved.service, resolved.address))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Address reported by `service`, if any
    pub fn get(&self, service: &str) -> Option<Ipv4Addr> {
        self.services.get(service).copied()
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch
pub(crate) fn now_epoch_secs() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp_micros() as f64 / 1_000_000.0
}

/// Render epoch seconds as local wall-clock time for log lines
pub(crate) fn format_local(epoch_secs: f64) -> String {
    let micros = (epoch_secs * 1_000_000.0) as i64;
    match chrono::DateTime::from_timestamp_micros(micros) {
        Some(utc) => utc
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "out of range".to_string(),
    }
}
