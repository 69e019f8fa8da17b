//! Test doubles and common utilities for run contract tests
//!
//! The doubles count their calls through shared `Arc` counters so a test can
//! keep a handle after the double has been moved into a `Poster`.

#![allow(dead_code)]

use ippost_core::config::{DestinationKind, DestinationSpec, ScpDestination};
use ippost_core::error::{Error, Result};
use ippost_core::traits::{EchoService, Transport};
use ippost_core::{AddressResolver, Dispatcher, FileCacheStore, Poster, TransportRegistry};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An echo service with a scripted answer
pub struct ScriptedEchoService {
    url: String,
    answer: std::result::Result<String, String>,
    fetch_count: Arc<AtomicUsize>,
}

impl ScriptedEchoService {
    /// A service answering `body`
    pub fn answering(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            answer: Ok(body.to_string()),
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A service whose request always fails
    pub fn failing(url: &str, error: &str) -> Self {
        Self {
            url: url.to_string(),
            answer: Err(error.to_string()),
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle on the fetch counter
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetch_count)
    }
}

#[async_trait::async_trait]
impl EchoService for ScriptedEchoService {
    fn identity(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<String> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .map_err(|e| Error::echo_service(&self.url, e))
    }
}

/// A transport that records every publish call
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<(String, PathBuf)>>>,
    /// Destination names that fail to publish
    failing: Vec<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Vec::new(),
        }
    }

    /// Make publishing to `name` fail
    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    /// Shared handle on the recorded calls
    pub fn calls(&self) -> Arc<Mutex<Vec<(String, PathBuf)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Scp
    }

    async fn publish(&self, destination: &DestinationSpec, cache_file: &Path) -> Result<()> {
        let name = destination.name();
        self.calls
            .lock()
            .unwrap()
            .push((name.clone(), cache_file.to_path_buf()));

        if self.failing.contains(&name) {
            return Err(Error::transport("scp", "Authentication failed"));
        }
        Ok(())
    }
}

/// Helper to create an SCP destination for testing
pub fn scp_destination(name: &str) -> DestinationSpec {
    DestinationSpec::Scp(ScpDestination {
        name: name.to_string(),
        host: "198.51.100.10".to_string(),
        port: 22,
        username: "deploy".to_string(),
        identity_file: PathBuf::from("/home/deploy/.ssh/id_ed25519"),
        remote_dir: "/srv/ip".to_string(),
        passphrase: None,
        known_hosts_file: None,
        timeout_secs: 30,
    })
}

/// Helper to create a destination with an unrecognised type
pub fn unknown_destination(kind: &str) -> DestinationSpec {
    DestinationSpec::Unknown {
        kind: kind.to_string(),
        raw: serde_json::json!({ "type": kind, "name": format!("{}-target", kind) }),
    }
}

/// Helper to build a poster from test doubles
pub fn poster(
    services: Vec<ScriptedEchoService>,
    transport: RecordingTransport,
    cache_file: &Path,
    destinations: Vec<DestinationSpec>,
) -> Poster {
    let services: Vec<Box<dyn EchoService>> = services
        .into_iter()
        .map(|s| Box::new(s) as Box<dyn EchoService>)
        .collect();

    let mut registry = TransportRegistry::new();
    registry.register(Box::new(transport));

    Poster::new(
        AddressResolver::new(services),
        FileCacheStore::new(cache_file),
        Dispatcher::new(registry),
        destinations,
    )
}

/// Current time as epoch seconds
pub fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}

/// Write a cache file with the given timestamp
pub fn write_cache(path: &Path, timestamp: f64, services: &[(&str, &str)]) {
    let services: serde_json::Map<String, serde_json::Value> = services
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect();
    let record = serde_json::json!({ "timestamp": timestamp, "services": services });
    std::fs::write(path, serde_json::to_vec_pretty(&record).unwrap()).unwrap();
}
