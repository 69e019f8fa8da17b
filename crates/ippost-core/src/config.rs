//! Configuration types for the public IP poster
//!
//! The configuration file is JSON. Only `destination_list` is required:
//!
//! ```json
//! {
//!   "destination_list": [
//!     {
//!       "type": "scp",
//!       "name": "web-1",
//!       "host": "web-1.example.net",
//!       "port": 22,
//!       "username": "deploy",
//!       "identity_file": "/home/deploy/.ssh/id_ed25519",
//!       "remote_dir": "/srv/ip"
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Echo services queried when the configuration does not name any
pub const DEFAULT_IP_SERVICES: &[&str] = &["https://ipinfo.io/ip", "https://checkip.amazonaws.com"];

/// Main poster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosterConfig {
    /// Publish targets, processed in order
    pub destination_list: Vec<DestinationSpec>,

    /// Echo service URLs, queried in order
    #[serde(default = "default_ip_services")]
    pub ip_services: Vec<String>,
}

impl PosterConfig {
    /// Read, parse and validate a configuration file
    ///
    /// Every failure (unreadable file, empty document, malformed JSON,
    /// missing `destination_list`, entry without `type`) is reported as
    /// [`Error::Config`]. A recognised entry with bad fields loads as
    /// [`DestinationSpec::Invalid`] and only fails at dispatch.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse and validate configuration from a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(Error::config("Config file is empty"));
        }

        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Config file is not valid JSON: {}", e)))?;

        let is_empty = match &value {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if is_empty {
            return Err(Error::config("Config file is empty"));
        }

        let config: PosterConfig = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ip_services.is_empty() {
            return Err(Error::config("ip_services cannot be empty"));
        }
        for url in &self.ip_services {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(Error::config(format!(
                    "IP service URL must use HTTP or HTTPS scheme. Got: {}",
                    url
                )));
            }
        }

        for destination in &self.destination_list {
            if let DestinationSpec::Scp(scp) = destination {
                scp.validate()?;
            }
        }

        Ok(())
    }
}

fn default_ip_services() -> Vec<String> {
    DEFAULT_IP_SERVICES.iter().map(|s| s.to_string()).collect()
}

/// Destination kinds that have a transport implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    /// Secure copy over SSH
    Scp,
}

impl DestinationKind {
    /// The `type` tag used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Scp => "scp",
        }
    }
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One publish target from `destination_list`
///
/// Entries whose `type` is not recognised are kept as [`DestinationSpec::Unknown`],
/// and recognised entries with a bad body as [`DestinationSpec::Invalid`], so the
/// dispatcher can report them without failing the whole load.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationSpec {
    /// Upload over SCP
    Scp(ScpDestination),

    /// Unrecognised destination type
    Unknown {
        /// Value of the `type` tag
        kind: String,
        /// The entry as written
        raw: serde_json::Value,
    },

    /// Known destination type whose fields are missing or invalid
    Invalid {
        /// Value of the `type` tag
        kind: String,
        /// Why the entry was rejected
        reason: String,
        /// The entry as written
        raw: serde_json::Value,
    },
}

impl DestinationSpec {
    /// Kind of this destination, `None` when the type is unrecognised
    pub fn kind(&self) -> Option<DestinationKind> {
        match self {
            DestinationSpec::Scp(_) => Some(DestinationKind::Scp),
            DestinationSpec::Unknown { .. } | DestinationSpec::Invalid { .. } => None,
        }
    }

    /// The `type` tag as written in configuration
    pub fn type_name(&self) -> &str {
        match self {
            DestinationSpec::Scp(_) => DestinationKind::Scp.as_str(),
            DestinationSpec::Unknown { kind, .. } | DestinationSpec::Invalid { kind, .. } => kind,
        }
    }

    /// Human-readable name for logs and reports
    pub fn name(&self) -> String {
        match self {
            DestinationSpec::Scp(scp) => scp.name.clone(),
            DestinationSpec::Unknown { kind, raw } | DestinationSpec::Invalid { kind, raw, .. } => raw
                .get("name")
                .and_then(|n| n.as_str())
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("<{}>", kind)),
        }
    }

    /// Validate the destination configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            DestinationSpec::Scp(scp) => scp.validate(),
            DestinationSpec::Unknown { .. } => Ok(()),
            DestinationSpec::Invalid { reason, .. } => Err(Error::config(format!(
                "{} destination {}: {}",
                self.type_name(),
                self.name(),
                reason
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for DestinationSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as _;

        let raw = serde_json::Value::deserialize(deserializer)?;
        let kind = raw
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| D::Error::custom("destination entry is missing a string `type` field"))?
            .to_string();

        match kind.as_str() {
            "scp" => Ok(parse_scp(&raw)
                .map(DestinationSpec::Scp)
                .unwrap_or_else(|reason| DestinationSpec::Invalid { kind, reason, raw })),
            _ => Ok(DestinationSpec::Unknown { kind, raw }),
        }
    }
}

impl Serialize for DestinationSpec {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::Error as _;

        match self {
            DestinationSpec::Scp(scp) => {
                let mut value = serde_json::to_value(scp).map_err(S::Error::custom)?;
                if let serde_json::Value::Object(map) = &mut value {
                    map.insert("type".to_string(), "scp".into());
                }
                value.serialize(serializer)
            }
            DestinationSpec::Unknown { raw, .. } | DestinationSpec::Invalid { raw, .. } => {
                raw.serialize(serializer)
            }
        }
    }
}

fn parse_scp(raw: &serde_json::Value) -> std::result::Result<ScpDestination, String> {
    let scp: ScpDestination = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
    match scp.validate() {
        Ok(()) => Ok(scp),
        Err(Error::Config(msg)) => Err(msg),
        Err(e) => Err(e.to_string()),
    }
}

/// SCP destination configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScpDestination {
    /// Human-readable name
    pub name: String,

    /// Remote host name or address
    pub host: String,

    /// Remote SSH port
    pub port: u16,

    /// Remote user
    pub username: String,

    /// Private key used for authentication
    pub identity_file: PathBuf,

    /// Directory the cache file is uploaded into
    pub remote_dir: String,

    /// Passphrase for an encrypted private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    /// OpenSSH known_hosts file used to check and record host keys
    ///
    /// When unset, any host key is accepted and only its fingerprint is logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_file: Option<PathBuf>,

    /// Timeout for connecting and for every blocking SSH operation (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ScpDestination {
    /// Validate the SCP destination
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("SCP destination name cannot be empty"));
        }
        if self.host.is_empty() {
            return Err(Error::config(format!(
                "SCP destination {}: host cannot be empty",
                self.name
            )));
        }
        if self.port == 0 {
            return Err(Error::config(format!(
                "SCP destination {}: port must be > 0",
                self.name
            )));
        }
        if self.username.is_empty() {
            return Err(Error::config(format!(
                "SCP destination {}: username cannot be empty",
                self.name
            )));
        }
        if self.identity_file.as_os_str().is_empty() {
            return Err(Error::config(format!(
                "SCP destination {}: identity_file cannot be empty",
                self.name
            )));
        }
        if self.remote_dir.is_empty() {
            return Err(Error::config(format!(
                "SCP destination {}: remote_dir cannot be empty",
                self.name
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config(format!(
                "SCP destination {}: timeout_secs must be > 0",
                self.name
            )));
        }
        Ok(())
    }

    /// Remote path for a local file: `remote_dir/basename(local)`
    pub fn remote_path_for(&self, local: &Path) -> Result<String> {
        let file_name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "Cache file path has no usable file name: {}",
                    local.display()
                ))
            })?;

        let dir = self.remote_dir.trim_end_matches('/');
        Ok(format!("{}/{}", dir, file_name))
    }
}

fn default_timeout_secs() -> u64 {
    30
}
