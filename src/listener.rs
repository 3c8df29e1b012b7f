//! UDP listener and relay pipeline.
//!
//! Owns one bound socket per session. Each datagram runs through
//! parse → normalize → map in the receive loop, then is handed to the
//! submitter as an independent task so the loop keeps accepting input
//! while the HTTP call is in flight. A software change rebinds the socket
//! (stop-then-start); a bind or socket failure schedules a retry after a
//! fixed delay. All per-datagram errors are local: the listener never
//! stops serving because one record was bad.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::mapping::{self, MappingError};
use crate::normalize::{ValidationError, normalize};
use crate::parser::{ParseError, parse_record};
use crate::record::QsoRecord;
use crate::software::software_for_port;
use crate::stats::RelayStats;
use crate::submit::Submitter;

/// Delay before retrying after a bind or socket failure.
pub const BIND_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Largest datagram we read. ADIF broadcasts are well under this.
const MAX_DATAGRAM: usize = 8192;

/// Why a datagram was dropped before submission.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Build a submission-ready QSO from one datagram body.
///
/// Runs the full parse → normalize → map pipeline; a QSO coming out of
/// here has band and mode in LdA vocabulary.
///
/// # Example
///
/// ```
/// use lda_relay::listener::build_qso;
///
/// let body = "<CALL:6>LU5WSO<BAND:3>40m<MODE:3>USB<QSO_DATE:8>20240115<TIME_ON:4>1430<EOR>";
/// let qso = build_qso(body, Some("LU9XYZ")).unwrap();
/// assert_eq!(qso.call, "LU5WSO");
/// assert_eq!(qso.mode, "SSB");
/// assert_eq!(qso.date, "15/01/2024");
/// ```
pub fn build_qso(body: &str, station_callsign: Option<&str>) -> Result<QsoRecord, PipelineError> {
    let raw = parse_record(body)?;
    let mut qso = normalize(&raw, station_callsign, Local::now())?;
    qso.band = mapping::map_band(&qso.band)?.to_string();
    qso.mode = mapping::map_mode(&qso.mode)?.to_string();
    Ok(qso)
}

/// Status events surfaced to the embedding program.
#[derive(Debug)]
pub enum RelayEvent {
    /// Socket bound and receiving.
    Listening { port: u16, software: String },

    /// Bind failed; the listener retries after [`BIND_RETRY_DELAY`].
    BindFailed { port: u16, error: String },

    /// The socket failed while receiving; the listener rebinds after
    /// [`BIND_RETRY_DELAY`]. Distinct from [`RelayEvent::Dropped`], which
    /// is scoped to one bad record.
    SocketFault { error: String },

    /// A QSO passed the pipeline and was handed to the submitter.
    QsoReceived(QsoRecord),

    /// LdA confirmed the QSO; carries the service response text.
    Submitted { call: String, response: String },

    /// Submission was rejected or failed in transport.
    SubmitFailed { call: String, error: String },

    /// A datagram was dropped before submission.
    Dropped { reason: String },

    /// The listener shut down.
    Stopped,
}

/// Commands accepted by a running relay.
#[derive(Debug)]
pub enum RelayCommand {
    /// Switch to the named logging software, rebinding if its port differs.
    SetSoftware(String),

    /// Replace the configuration snapshot used for subsequent datagrams.
    UpdateConfig(Config),

    /// Close the socket and stop.
    Shutdown,
}

/// Handle for controlling a running relay session.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    commands: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Switch the selected logging software.
    pub async fn set_software(&self, software: impl Into<String>) {
        let _ = self
            .commands
            .send(RelayCommand::SetSoftware(software.into()))
            .await;
    }

    /// Push a fresh configuration snapshot to the relay.
    pub async fn update_config(&self, config: Config) {
        let _ = self.commands.send(RelayCommand::UpdateConfig(config)).await;
    }

    /// Stop the relay. The socket is closed before the task exits; any
    /// in-flight submission is left to finish on its own.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(RelayCommand::Shutdown).await;
    }
}

/// How one serve pass ended.
enum ServeExit {
    /// Port changed; rebind immediately.
    Rebind,
    /// Socket failed at runtime; rebind after the retry delay.
    Fault,
    /// Shutdown requested.
    Shutdown,
}

/// UDP relay server owning the socket and the pipeline.
pub struct RelayServer {
    config: Config,
    stats: Arc<RelayStats>,
    submitter: Arc<Submitter>,
}

impl RelayServer {
    /// Create a relay from a configuration snapshot.
    pub fn new(config: Config, stats: Arc<RelayStats>, submitter: Submitter) -> Self {
        Self {
            config,
            stats,
            submitter: Arc::new(submitter),
        }
    }

    /// Start the relay in a background task.
    ///
    /// Returns a control handle and the event stream. The relay stops when
    /// [`RelayHandle::shutdown`] is called or every handle is dropped.
    pub fn start(self) -> (RelayHandle, mpsc::Receiver<RelayEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        tokio::spawn(async move {
            self.run(cmd_rx, event_tx).await;
        });

        (RelayHandle { commands: cmd_tx }, event_rx)
    }

    /// Bind-serve loop. Rebinding is stop-then-start: the old socket is
    /// dropped before a new one is opened.
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<RelayCommand>,
        events: mpsc::Sender<RelayEvent>,
    ) {
        loop {
            let port = self.config.udp_port();

            let socket = match UdpSocket::bind(("0.0.0.0", port)).await {
                Ok(socket) => socket,
                Err(e) => {
                    error!("failed to bind UDP port {}: {}", port, e);
                    self.stats.record_bind_failure();
                    let _ = events
                        .send(RelayEvent::BindFailed {
                            port,
                            error: e.to_string(),
                        })
                        .await;

                    if !self.wait_for_retry(&mut commands).await {
                        break;
                    }
                    continue;
                }
            };

            info!(
                "listening on port {} ({})",
                port,
                self.config.software.to_uppercase()
            );
            let _ = events
                .send(RelayEvent::Listening {
                    port,
                    software: self.config.software.clone(),
                })
                .await;

            match self.serve(&socket, &mut commands, &events).await {
                ServeExit::Rebind => continue,
                ServeExit::Fault => {
                    drop(socket);
                    if !self.wait_for_retry(&mut commands).await {
                        break;
                    }
                }
                ServeExit::Shutdown => break,
            }
        }

        info!("relay stopped");
        let _ = events.send(RelayEvent::Stopped).await;
    }

    /// Sleep out the retry delay, still honoring commands. The timer dies
    /// with the listener task, so shutdown cancels it. Returns false when
    /// the relay should stop instead of retrying.
    async fn wait_for_retry(&mut self, commands: &mut mpsc::Receiver<RelayCommand>) -> bool {
        info!("retrying in {} seconds", BIND_RETRY_DELAY.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(BIND_RETRY_DELAY) => true,
            cmd = commands.recv() => match cmd {
                Some(RelayCommand::SetSoftware(software)) => {
                    self.config.software = software;
                    true
                }
                Some(RelayCommand::UpdateConfig(update)) => {
                    self.config.merge_update(update);
                    true
                }
                Some(RelayCommand::Shutdown) | None => false,
            },
        }
    }

    /// Receive datagrams until a command or socket fault ends the pass.
    async fn serve(
        &mut self,
        socket: &UdpSocket,
        commands: &mut mpsc::Receiver<RelayCommand>,
        events: &mpsc::Sender<RelayEvent>,
    ) -> ServeExit {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(RelayCommand::SetSoftware(software)) => {
                        let old_port = self.config.udp_port();
                        self.config.software = software;
                        if self.config.udp_port() != old_port {
                            info!(
                                "software changed to {}, rebinding",
                                self.config.software
                            );
                            return ServeExit::Rebind;
                        }
                        // Same port, keep the socket
                    }
                    Some(RelayCommand::UpdateConfig(update)) => {
                        let old_port = self.config.udp_port();
                        self.config.merge_update(update);
                        if self.config.udp_port() != old_port {
                            info!(
                                "software changed to {}, rebinding",
                                self.config.software
                            );
                            return ServeExit::Rebind;
                        }
                    }
                    Some(RelayCommand::Shutdown) | None => return ServeExit::Shutdown,
                },

                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, addr)) => {
                        let body = String::from_utf8_lossy(&buf[..len]).into_owned();
                        self.handle_datagram(body.trim(), len, addr, events).await;
                    }
                    Err(e) => {
                        error!("UDP socket error: {}", e);
                        let _ = events
                            .send(RelayEvent::SocketFault {
                                error: e.to_string(),
                            })
                            .await;
                        return ServeExit::Fault;
                    }
                },
            }
        }
    }

    /// Run one datagram through the pipeline and spawn its submission.
    /// `raw_len` is the size on the wire, before trimming.
    async fn handle_datagram(
        &self,
        body: &str,
        raw_len: usize,
        addr: SocketAddr,
        events: &mpsc::Sender<RelayEvent>,
    ) {
        self.stats.record_datagram(raw_len as u64);

        if body.is_empty() {
            debug!("empty datagram from {}, ignoring", addr);
            self.stats.record_empty();
            return;
        }

        debug!(
            "datagram from {} for {}: {}",
            addr,
            software_for_port(self.config.udp_port()),
            preview(body)
        );

        let station = Some(self.config.callsign.as_str()).filter(|s| !s.trim().is_empty());
        let qso = match build_qso(body, station) {
            Ok(qso) => qso,
            Err(e) => {
                warn!("dropping datagram from {}: {}", addr, e);
                match &e {
                    PipelineError::Parse(_) => self.stats.record_parse_failure(),
                    PipelineError::Validation(_) => self.stats.record_validation_failure(),
                    PipelineError::Mapping(_) => self.stats.record_mapping_failure(),
                }
                let _ = events
                    .send(RelayEvent::Dropped {
                        reason: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        info!("QSO received: {}", qso);
        self.stats.record_qso(&qso);
        let _ = events.send(RelayEvent::QsoReceived(qso.clone())).await;

        // Submission runs as its own task; the receive loop does not wait
        // on the HTTP round trip.
        let submitter = Arc::clone(&self.submitter);
        let stats = Arc::clone(&self.stats);
        let credentials = self.config.credentials();
        let events = events.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            match submitter.submit(&qso, &credentials).await {
                Ok(response) => {
                    stats.record_submission_ok(started.elapsed());
                    info!("QSO with {} sent: {}", qso.call, response);
                    let _ = events
                        .send(RelayEvent::Submitted {
                            call: qso.call,
                            response,
                        })
                        .await;
                }
                Err(e) => {
                    stats.record_submission_failed(started.elapsed());
                    error!("QSO with {} failed: {}", qso.call, e);
                    let _ = events
                        .send(RelayEvent::SubmitFailed {
                            call: qso.call,
                            error: e.to_string(),
                        })
                        .await;
                }
            }
        });
    }
}

/// First 200 characters of a datagram, for debug logging.
fn preview(body: &str) -> String {
    let mut preview: String = body.chars().take(200).collect();
    if preview.len() < body.len() {
        preview.push_str("...");
    }
    preview
}
