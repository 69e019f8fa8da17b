// # public_ip_poster
//
// Thin command-line layer over `ippost-core`.
//
// The binary is responsible for:
// 1. Parsing the command line
// 2. Installing the tracing subscriber (stdout + log file)
// 3. Loading the JSON configuration
// 4. Building the echo services and registering transports
// 5. Running one `Poster` pass and mapping the outcome to an exit status
//
// ## Example
//
// ```bash
// public_ip_poster --config /etc/ippost/config.json --cache-ttl 600 -v
// ```

use anyhow::{Context, Result};
use clap::Parser;
use ippost_core::{
    AddressResolver, Dispatcher, FileCacheStore, Poster, PosterConfig, RunOptions, RunReport,
    TransportRegistry,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Exit codes for the two possible outcomes of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PosterExitCode {
    /// Run completed (individual destinations may still have failed)
    Success = 0,
    /// Unreadable configuration or no address could be resolved
    Failure = 1,
}

impl From<PosterExitCode> for ExitCode {
    fn from(code: PosterExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Discover this host's public IP address and publish it over SCP
#[derive(Parser, Debug)]
#[command(name = "public_ip_poster", version)]
struct Args {
    /// JSON configuration file with the destination list
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// File that log output is appended to
    #[arg(short, long, default_value = "public_ip_poster.log")]
    log_file: PathBuf,

    /// Log at DEBUG instead of INFO
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding the address cache
    #[arg(long, default_value = ".public_ip_poster_cache")]
    cache_dir: PathBuf,

    /// Seconds a cached snapshot stays fresh
    #[arg(long, default_value_t = ippost_core::engine::DEFAULT_CACHE_TTL_SECS)]
    cache_ttl: u64,

    /// Cache file [default: <cache-dir>/public_ip_cache.json]
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Resolve again even if the cache is fresh
    #[arg(long)]
    ignore_cache: bool,
}

impl Args {
    fn cache_file(&self) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(|| self.cache_dir.join(ippost_core::cache::DEFAULT_CACHE_FILE_NAME))
    }

    fn run_options(&self) -> RunOptions {
        RunOptions::new(&self.cache_dir)
            .with_ttl(Duration::from_secs(self.cache_ttl))
            .with_ignore_cache(self.ignore_cache)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_file, args.verbose) {
        eprintln!("Failed to set up logging: {:#}", e);
        return PosterExitCode::Failure.into();
    }

    info!("public_ip_poster starting");
    info!("Using configuration file {}", args.config.display());

    let config = match PosterConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return PosterExitCode::Failure.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PosterExitCode::Failure.into();
        }
    };

    let code = rt.block_on(async {
        match run(&args, config).await {
            Ok(report) => {
                info!(
                    "Published to {} of {} destination(s)",
                    report.dispatch.published_count(),
                    report.dispatch.outcomes.len()
                );
                info!("public_ip_poster finished");
                PosterExitCode::Success
            }
            Err(e) => {
                error!("{:#}", e);
                PosterExitCode::Failure
            }
        }
    });

    code.into()
}

/// Wire the collaborators together and run one pass
async fn run(args: &Args, config: PosterConfig) -> Result<RunReport> {
    let services = ippost_echo_http::services_for(&config.ip_services)
        .context("Failed to create echo services")?;

    let mut registry = TransportRegistry::new();
    ippost_transport_scp::register(&mut registry);

    let cache_file = args.cache_file();
    info!("Using cache file {}", cache_file.display());

    let poster = Poster::new(
        AddressResolver::new(services),
        FileCacheStore::new(&cache_file),
        Dispatcher::new(registry),
        config.destination_list,
    );

    Ok(poster.run(&args.run_options()).await?)
}

/// Install the global subscriber: stdout plus an append-mode log file
fn init_logging(log_file: &Path, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
        Err(e) => {
            eprintln!(
                "WARNING: cannot open log file {}: {}; logging to stdout only",
                log_file.display(),
                e
            );
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;

    if verbose {
        debug!("Verbose logging enabled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["public_ip_poster"]).unwrap();

        assert_eq!(args.config, PathBuf::from("config.json"));
        assert_eq!(args.log_file, PathBuf::from("public_ip_poster.log"));
        assert!(!args.verbose);
        assert_eq!(args.cache_ttl, 3600);
        assert!(!args.ignore_cache);
        assert_eq!(
            args.cache_file(),
            PathBuf::from(".public_ip_poster_cache/public_ip_cache.json")
        );
    }

    #[test]
    fn test_cache_file_follows_cache_dir() {
        let args =
            Args::try_parse_from(["public_ip_poster", "--cache-dir", "/var/cache/ippost"]).unwrap();
        assert_eq!(
            args.cache_file(),
            PathBuf::from("/var/cache/ippost/public_ip_cache.json")
        );
    }

    #[test]
    fn test_explicit_cache_file_wins() {
        let args = Args::try_parse_from([
            "public_ip_poster",
            "--cache-dir",
            "/var/cache/ippost",
            "--cache-file",
            "/tmp/ip.json",
        ])
        .unwrap();
        assert_eq!(args.cache_file(), PathBuf::from("/tmp/ip.json"));
    }

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from([
            "public_ip_poster",
            "-c",
            "/etc/ippost.json",
            "-l",
            "/var/log/ippost.log",
            "-v",
            "--ignore-cache",
            "--cache-ttl",
            "60",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("/etc/ippost.json"));
        assert_eq!(args.log_file, PathBuf::from("/var/log/ippost.log"));
        assert!(args.verbose);
        assert!(args.ignore_cache);
        assert_eq!(args.cache_ttl, 60);
    }
}
