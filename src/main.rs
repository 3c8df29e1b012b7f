//! LdA Relay CLI - Listen for QSO broadcasts and forward them to LdA.

use anyhow::{Context, Result};
use clap::Parser;
use lda_relay::{
    config::Config,
    listener::{RelayEvent, RelayServer},
    metrics::start_metrics_server,
    stats::RelayStats,
    submit::Submitter,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// LdA Relay - Forward UDP QSO log records to the LdA logbook
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// LdA account name (overrides the config file)
    #[arg(long, env = "LDA_USERNAME")]
    username: Option<String>,

    /// LdA account password (overrides the config file)
    #[arg(long, env = "LDA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Station callsign (overrides the config file)
    #[arg(long, env = "LDA_CALLSIGN")]
    callsign: Option<String>,

    /// Logging software to listen for: log4om, wsjtx, jtdx or n1mm
    #[arg(short, long, env = "LDA_SOFTWARE")]
    software: Option<String>,

    /// Print statistics every N seconds (0 = never)
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Enable the Prometheus metrics HTTP endpoint
    #[arg(long)]
    metrics: bool,

    /// Port for the Prometheus metrics HTTP endpoint
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Load the config file and fold the CLI overrides into it.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(callsign) = &self.callsign {
            config.callsign = callsign.clone();
        }
        if let Some(software) = &self.software {
            config.software = software.clone();
        }
        if let Some(interval) = self.stats_interval {
            config.stats_interval = interval;
        }
        if self.metrics {
            config.metrics_enabled = true;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = args.resolve_config()?;
    config
        .validate()
        .context("incomplete configuration; set username, password and callsign")?;

    info!("LdA Relay starting...");
    info!("Callsign: {}", config.callsign);
    info!(
        "Software: {} (UDP port {})",
        config.software,
        config.udp_port()
    );
    debug!("Config: {:?}", config.masked());

    // Create shared statistics
    let stats = Arc::new(RelayStats::new());

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
        let _ = shutdown_tx_clone.send(true);
    });

    // Optional Prometheus metrics endpoint
    if config.metrics_enabled {
        let metrics_port = config.metrics_port;
        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(metrics_port, stats_clone).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Start stats printer
    if config.stats_interval > 0 {
        let stats_clone = Arc::clone(&stats);
        let stats_interval = config.stats_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                println!("\n{}", stats_clone.summary());
            }
        });
    }

    // Start the relay
    let submitter = Submitter::new().context("Failed to build HTTP client")?;
    let server = RelayServer::new(config.clone(), Arc::clone(&stats), submitter);
    let (handle, mut events) = server.start();

    // Reload the config file on SIGHUP so a software change rebinds the
    // socket without restarting the process.
    #[cfg(unix)]
    {
        let handle = handle.clone();
        let config_path = args.config.clone();
        tokio::spawn(async move {
            let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to install SIGHUP handler: {}", e);
                    return;
                }
            };
            loop {
                hangup.recv().await;
                info!("SIGHUP received, reloading configuration");
                let reloaded = match &config_path {
                    Some(path) => Config::load_from(path),
                    None => Config::load(),
                };
                match reloaded {
                    Ok(update) => handle.update_config(update).await,
                    Err(e) => error!("Config reload failed: {}", e),
                }
            }
        });
    }

    // Main event loop
    loop {
        tokio::select! {
            // Check for shutdown
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    handle.shutdown().await;
                }
            }

            // Process relay events
            event = events.recv() => {
                match event {
                    Some(RelayEvent::Listening { port, software }) => {
                        info!("Listening on port {} ({})", port, software);
                    }
                    Some(RelayEvent::BindFailed { port, error }) => {
                        warn!("Could not bind port {}: {}", port, error);
                    }
                    Some(RelayEvent::SocketFault { error }) => {
                        warn!("UDP socket fault, rebinding: {}", error);
                    }
                    Some(RelayEvent::QsoReceived(qso)) => {
                        debug!("Accepted QSO: {}", qso);
                    }
                    Some(RelayEvent::Submitted { call, response }) => {
                        info!("QSO with {} confirmed: {}", call, response);
                    }
                    Some(RelayEvent::SubmitFailed { call, error }) => {
                        warn!("QSO with {} not confirmed: {}", call, error);
                    }
                    Some(RelayEvent::Dropped { reason }) => {
                        debug!("Datagram dropped: {}", reason);
                    }
                    Some(RelayEvent::Stopped) | None => {
                        break;
                    }
                }
            }
        }
    }

    // Print final statistics
    println!("\n\nFINAL STATISTICS");
    println!("{}", stats.summary());

    Ok(())
}
