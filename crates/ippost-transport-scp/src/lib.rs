// # SCP Transport
//
// This crate uploads the cache file to a remote host with SCP over SSH.
//
// ## Flow (one destination)
//
// 1. Open the local cache file (fail before touching the network if missing)
// 2. TCP connect with `timeout_secs`, SSH handshake
// 3. Host key policy (auto-add, see below)
// 4. Public key authentication with `identity_file`
// 5. SCP upload to `remote_dir/<cache file name>`, keeping the local mode bits
// 6. Disconnect, whatever happened in steps 3-5
//
// ## Host Key Policy
//
// - `known_hosts_file` set: a matching key is accepted, an unknown host is
//   appended to the file, a different key for a known host is rejected.
// - `known_hosts_file` unset: every key is accepted; its SHA-256 fingerprint
//   is logged so it can be pinned later.
//
// ## Blocking I/O
//
// libssh2 is blocking. Each upload runs on `tokio::task::spawn_blocking` and
// is awaited before the dispatcher moves on to the next destination.

use async_trait::async_trait;
use ippost_core::config::{DestinationKind, DestinationSpec, ScpDestination};
use ippost_core::traits::Transport;
use ippost_core::{Error, Result, TransportRegistry};
use ssh2::{CheckResult, HashType, HostKeyType, KnownHostFileKind, KnownHosts, Session};
use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mode used when the local file's permissions cannot be read
#[cfg(not(unix))]
const DEFAULT_FILE_MODE: i32 = 0o644;

/// SCP transport
#[derive(Debug, Default, Clone, Copy)]
pub struct ScpTransport;

impl ScpTransport {
    /// Create a new SCP transport
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for ScpTransport {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Scp
    }

    async fn publish(&self, destination: &DestinationSpec, cache_file: &Path) -> Result<()> {
        let DestinationSpec::Scp(scp) = destination else {
            return Err(Error::invalid_input(format!(
                "SCP transport cannot publish to a {} destination",
                destination.type_name()
            )));
        };

        let remote_path = scp.remote_path_for(cache_file)?;
        let scp = scp.clone();
        let local_path = cache_file.to_path_buf();

        tokio::task::spawn_blocking(move || upload(&scp, &local_path, &remote_path))
            .await
            .map_err(|e| Error::transport("scp", format!("Upload task failed: {}", e)))?
    }
}

/// Register the SCP transport with a registry
pub fn register(registry: &mut TransportRegistry) {
    registry.register(Box::new(ScpTransport::new()));
}

/// Upload `local_path` to `remote_path` on the destination host
fn upload(destination: &ScpDestination, local_path: &Path, remote_path: &str) -> Result<()> {
    let mut local = File::open(local_path).map_err(|e| {
        Error::transport(
            "scp",
            format!("Failed to open {}: {}", local_path.display(), e),
        )
    })?;
    let metadata = local.metadata()?;
    let size = metadata.len();
    let mode = file_mode(&metadata);

    let tcp = connect(destination)?;
    let session = handshake(tcp, destination)?;

    let result = verify_host_key(&session, destination)
        .and_then(|()| authenticate(&session, destination))
        .and_then(|()| send(&session, &mut local, size, mode, remote_path));

    if let Err(e) = session.disconnect(None, "upload finished", None) {
        debug!("Disconnect from {} failed: {}", destination.host, e);
    }

    if result.is_ok() {
        info!(
            "Uploaded {} to remote {}:{}",
            local_path.display(),
            destination.host,
            remote_path
        );
    }
    result
}

fn connect(destination: &ScpDestination) -> Result<TcpStream> {
    let timeout = Duration::from_secs(destination.timeout_secs);
    let addrs = (destination.host.as_str(), destination.port)
        .to_socket_addrs()
        .map_err(|e| {
            Error::transport(
                "scp",
                format!("Failed to resolve {}: {}", destination.host, e),
            )
        })?;

    let mut last_error: Option<io::Error> = None;
    for addr in addrs {
        debug!("Connecting to {} ({})", destination.host, addr);
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no addresses".to_string());
    Err(Error::transport(
        "scp",
        format!(
            "Failed to connect to {}:{}: {}",
            destination.host, destination.port, reason
        ),
    ))
}

fn handshake(tcp: TcpStream, destination: &ScpDestination) -> Result<Session> {
    let mut session = Session::new().map_err(ssh_error)?;
    session.set_timeout(timeout_millis(destination.timeout_secs));
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| {
        Error::transport(
            "scp",
            format!("SSH handshake with {} failed: {}", destination.host, e),
        )
    })?;
    Ok(session)
}

fn verify_host_key(session: &Session, destination: &ScpDestination) -> Result<()> {
    let (key, key_type) = session
        .host_key()
        .ok_or_else(|| Error::host_key(format!("{} sent no host key", destination.host)))?;
    let fingerprint = session
        .host_key_hash(HashType::Sha256)
        .map(format_fingerprint)
        .unwrap_or_default();

    let Some(known_hosts_file) = &destination.known_hosts_file else {
        info!(
            "Trusting host key of {} (SHA256 {})",
            destination.host, fingerprint
        );
        return Ok(());
    };

    debug!("Host key of {} is SHA256 {}", destination.host, fingerprint);
    let mut known_hosts = session.known_hosts().map_err(ssh_error)?;
    let status = check_known_host(
        &mut known_hosts,
        known_hosts_file,
        &destination.host,
        destination.port,
        key,
        key_type,
    )?;
    if status == KnownHostStatus::Added {
        warn!(
            "Added previously unknown host key for {} (SHA256 {}) to {}",
            destination.host,
            fingerprint,
            known_hosts_file.display()
        );
    }
    Ok(())
}

/// How a host key was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownHostStatus {
    /// Already recorded with the same key
    Matched,
    /// Unknown host, appended to the file
    Added,
}

/// Check `key` against `known_hosts_file`, recording unknown hosts
///
/// A host recorded with a different key is an [`Error::HostKey`].
fn check_known_host(
    known_hosts: &mut KnownHosts,
    known_hosts_file: &Path,
    host: &str,
    port: u16,
    key: &[u8],
    key_type: HostKeyType,
) -> Result<KnownHostStatus> {
    if known_hosts_file.exists() {
        known_hosts
            .read_file(known_hosts_file, KnownHostFileKind::OpenSSH)
            .map_err(|e| {
                Error::host_key(format!(
                    "Failed to read {}: {}",
                    known_hosts_file.display(),
                    e
                ))
            })?;
    }

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => {
            debug!("Host key of {} matches known_hosts", host);
            Ok(KnownHostStatus::Matched)
        }
        CheckResult::NotFound => {
            let entry = known_hosts_entry(host, port);
            known_hosts
                .add(&entry, key, "", key_type.into())
                .map_err(ssh_error)?;
            write_known_hosts(known_hosts, known_hosts_file)?;
            Ok(KnownHostStatus::Added)
        }
        CheckResult::Mismatch => Err(Error::host_key(format!(
            "Host key for {} does not match {}",
            host,
            known_hosts_file.display()
        ))),
        CheckResult::Failure => Err(Error::host_key(format!(
            "Could not check host key for {}",
            host
        ))),
    }
}

fn write_known_hosts(known_hosts: &KnownHosts, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    known_hosts
        .write_file(path, KnownHostFileKind::OpenSSH)
        .map_err(|e| Error::host_key(format!("Failed to write {}: {}", path.display(), e)))
}

fn authenticate(session: &Session, destination: &ScpDestination) -> Result<()> {
    session
        .userauth_pubkey_file(
            &destination.username,
            None,
            &destination.identity_file,
            destination.passphrase.as_deref(),
        )
        .map_err(|e| {
            Error::auth(format!(
                "{}@{} with {}: {}",
                destination.username,
                destination.host,
                destination.identity_file.display(),
                e
            ))
        })?;

    if !session.authenticated() {
        return Err(Error::auth(format!(
            "{}@{} rejected the key",
            destination.username, destination.host
        )));
    }
    Ok(())
}

fn send(
    session: &Session,
    local: &mut File,
    size: u64,
    mode: i32,
    remote_path: &str,
) -> Result<()> {
    let mut channel = session
        .scp_send(Path::new(remote_path), mode, size, None)
        .map_err(|e| Error::transport("scp", format!("Failed to open {}: {}", remote_path, e)))?;

    let copied = io::copy(local, &mut channel).map_err(|e| {
        Error::transport("scp", format!("Failed to send {}: {}", remote_path, e))
    })?;
    if copied != size {
        warn!("Sent {} of {} byte(s) to {}", copied, size, remote_path);
    }

    channel.send_eof().map_err(ssh_error)?;
    channel.wait_eof().map_err(ssh_error)?;
    channel.close().map_err(ssh_error)?;
    channel.wait_close().map_err(ssh_error)?;
    Ok(())
}

/// Host name as written in known_hosts (`[host]:port` for non-default ports)
fn known_hosts_entry(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_string()
    } else {
        format!("[{}]:{}", host, port)
    }
}

fn format_fingerprint(hash: &[u8]) -> String {
    hash.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn timeout_millis(secs: u64) -> u32 {
    u32::try_from(secs.saturating_mul(1000)).unwrap_or(u32::MAX)
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> i32 {
    use std::os::unix::fs::PermissionsExt;
    (metadata.permissions().mode() & 0o777) as i32
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> i32 {
    DEFAULT_FILE_MODE
}

fn ssh_error(e: ssh2::Error) -> Error {
    Error::transport("scp", e.to_string())
}
