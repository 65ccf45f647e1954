// # dnsmond - Dynamic DNS Monitor Daemon
//
// This daemon is a THIN integration layer. All scheduling, DNS and update
// logic lives in dnsmon-core; the daemon is responsible for:
// 1. Reading configuration (JSON file plus `DNSMON_*` environment overrides)
// 2. Initializing logging (stdout or the buffered file log sink)
// 3. Registering update validators and building the collaborators
// 4. Running the monitor until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Command line (each flag also reads an environment variable)
// - `--config` / `DNSMON_CONFIG`: JSON configuration file (default `dnsmon.json`)
// - `--log-folder` / `DNSMON_LOG_FOLDER`: Folder for `dnsmon_latest.log`
// - `--log-level` / `DNSMON_LOG_LEVEL`: trace, debug, info, warn, error
//
// ### Overrides applied on top of the file
// - `DNSMON_DNS_SERVER`, `DNSMON_IP_ADDRESS_PROVIDER`
// - `DNSMON_IP_REFRESH_INTERVAL`, `DNSMON_DNS_REFRESH_INTERVAL` (seconds)
// - `DNSMON_UPDATE_URL`, `DNSMON_DOMAIN`, `DNSMON_PASSWORD`, `DNSMON_PROVIDER`
//
// ## Example
//
// ```json
// {
//   "update_url_template": "https://dynamicdns.park-your-domain.com/update?host={host}&domain={domain}&password={password}&ip={ip}",
//   "domain": "example.com",
//   "hosts": [{ "host": "@", "full_name": "example.com" }, { "host": "www" }]
// }
// ```
//
// ```bash
// export DNSMON_PASSWORD=your_password
// dnsmond --config /etc/dnsmon/dnsmon.json --log-folder /var/log/dnsmon
// ```

mod log_sink;

use anyhow::{Context, Result};
use clap::Parser;
use dnsmon_core::{Monitor, MonitorConfig, MonitorEvent, ValidatorRegistry};
use dnsmon_http::ReqwestFetcher;
use dnsmon_resolver::HickoryResolver;
use log_sink::{BufferedLogSink, LOG_FILE_PREFIX};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long the monitor gets to stop after cancellation
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsmonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DnsmonExitCode> for ExitCode {
    fn from(code: DnsmonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "dnsmond",
    version,
    about = "Keeps dynamic DNS host records pointed at this network's public IP"
)]
struct Args {
    /// JSON configuration file
    #[arg(long, env = "DNSMON_CONFIG", default_value = "dnsmon.json")]
    config: PathBuf,

    /// Folder for buffered log files (logs go to stdout when unset)
    #[arg(long, env = "DNSMON_LOG_FOLDER")]
    log_folder: Option<PathBuf>,

    /// Maximum log level: trace, debug, info, warn, error
    #[arg(long, env = "DNSMON_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level: Level = match args.log_level.parse() {
        Ok(level) => level,
        Err(_) => {
            eprintln!(
                "DNSMON_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                args.log_level
            );
            return DnsmonExitCode::ConfigError.into();
        }
    };

    let sink = args.log_folder.as_deref().and_then(open_log_sink);

    let builder = FmtSubscriber::builder().with_max_level(log_level);
    let installed = match &sink {
        Some(sink) => tracing::subscriber::set_global_default(
            builder.with_writer(sink.clone()).with_ansi(false).finish(),
        ),
        None => tracing::subscriber::set_global_default(builder.finish()),
    };
    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsmonExitCode::ConfigError.into();
    }

    info!("Starting dnsmond");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            flush_log_sink(sink.as_ref());
            return DnsmonExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(run_daemon(&args, sink.clone()));

    info!(exit_code = code as u8, "dnsmond exiting");
    flush_log_sink(sink.as_ref());

    code.into()
}

/// Open the buffered sink, falling back to stdout when the folder is unusable
fn open_log_sink(folder: &Path) -> Option<BufferedLogSink> {
    if !folder.is_dir() {
        eprintln!(
            "Log folder {} does not exist, logging to stdout",
            folder.display()
        );
        return None;
    }

    match BufferedLogSink::open(folder, LOG_FILE_PREFIX) {
        Ok(sink) => {
            println!("Logging to {}", sink.path().display());
            Some(sink)
        }
        Err(e) => {
            eprintln!(
                "Failed to open log file in {}: {}, logging to stdout",
                folder.display(),
                e
            );
            None
        }
    }
}

fn flush_log_sink(sink: Option<&BufferedLogSink>) {
    if let Some(sink) = sink
        && let Err(e) = sink.flush()
    {
        eprintln!("Failed to flush log file {}: {}", sink.path().display(), e);
    }
}

/// Load the configuration file and apply environment overrides
fn load_config(path: &Path) -> Result<MonitorConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let mut config = MonitorConfig::from_json(&text)
        .with_context(|| format!("Invalid configuration file {}", path.display()))?;
    config.apply_overrides(|key| std::env::var(key).ok())?;

    Ok(config)
}

/// Run the daemon
async fn run_daemon(args: &Args, sink: Option<BufferedLogSink>) -> DnsmonExitCode {
    let cancel = CancellationToken::new();

    let flusher = sink.map(|sink| tokio::spawn(sink.run_flusher(cancel.child_token())));

    let code = monitor_until_shutdown(args, &cancel).await;

    cancel.cancel();
    if let Some(flusher) = flusher
        && let Err(e) = flusher.await
    {
        warn!(error = %e, "Log flusher task failed");
    }

    code
}

async fn monitor_until_shutdown(args: &Args, cancel: &CancellationToken) -> DnsmonExitCode {
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Configuration error");
            return DnsmonExitCode::ConfigError;
        }
    };

    // Register built-in validators
    let registry = ValidatorRegistry::new();

    #[cfg(feature = "namecheap")]
    {
        debug!("Registering Namecheap validator");
        dnsmon_provider_namecheap::register(&registry);
    }

    let validator = match registry.create_validator(&config.provider) {
        Ok(validator) => validator,
        Err(e) => {
            error!(error = %e, "Configuration error");
            return DnsmonExitCode::ConfigError;
        }
    };

    let settings = config.settings();
    let provider = validator.provider_name();

    let fetcher = match ReqwestFetcher::new(settings.http_timeout) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!(error = %e, "Failed to create HTTP client");
            return DnsmonExitCode::RuntimeError;
        }
    };
    let resolver = HickoryResolver::new(settings.dns_server);

    let (mut monitor, events) = match Monitor::with_settings(
        &config,
        settings,
        Box::new(resolver),
        Box::new(fetcher),
        validator,
    ) {
        Ok(built) => built,
        Err(e) if e.is_config() => {
            // One invalid host disables monitoring entirely
            error!(error = %e, "Configuration error, monitoring disabled");
            return DnsmonExitCode::ConfigError;
        }
        Err(e) => {
            error!(error = %e, "Failed to create monitor");
            return DnsmonExitCode::RuntimeError;
        }
    };

    let settings = monitor.settings();
    info!(
        hosts = monitor.hosts().len(),
        provider,
        dns_server = %settings.dns_server,
        ip_address_provider = %settings.ip_address_provider,
        ip_refresh_interval_secs = settings.ip_refresh_interval.as_secs(),
        dns_refresh_interval_secs = settings.dns_refresh_interval_secs,
        "Configuration loaded"
    );

    for host in monitor.hosts() {
        info!(host = host.full_name(), "Monitoring host");
    }

    tokio::spawn(trace_events(events));

    let token = cancel.clone();
    let mut monitor_task = tokio::spawn(async move { monitor.run(token).await });

    let finished = tokio::select! {
        signal = wait_for_shutdown_signal() => {
            match signal {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!(error = %e, "Signal handling failed, shutting down"),
            }
            None
        }
        joined = &mut monitor_task => Some(joined),
    };

    cancel.cancel();

    let joined = match finished {
        Some(joined) => joined,
        None => match tokio::time::timeout(SHUTDOWN_TIMEOUT, monitor_task).await {
            Ok(joined) => joined,
            Err(_) => {
                error!("Monitor did not stop within {:?}", SHUTDOWN_TIMEOUT);
                return DnsmonExitCode::RuntimeError;
            }
        },
    };

    match joined {
        Ok(Ok(())) => {
            info!("Monitor stopped");
            DnsmonExitCode::CleanShutdown
        }
        Ok(Err(e)) => {
            error!(error = %e, "Monitor error");
            DnsmonExitCode::RuntimeError
        }
        Err(e) => {
            error!(error = %e, "Monitor task failed");
            DnsmonExitCode::RuntimeError
        }
    }
}

/// Drain monitor events so the channel never fills
async fn trace_events(mut events: mpsc::Receiver<MonitorEvent>) {
    while let Some(event) = events.recv().await {
        tracing::trace!(?event, "Monitor event");
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
