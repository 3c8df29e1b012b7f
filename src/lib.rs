//! LdA Relay - A Rust library and daemon for relaying QSO log records to
//! the LdA logbook confirmation service.
//!
//! This crate provides:
//! - A two-format (JSON / ADIF) parser for QSO datagrams
//! - Normalization and validation of record fields into LdA vocabulary
//! - An async UDP listener that forwards accepted QSOs over HTTPS
//!
//! # Example
//!
//! ```rust
//! use lda_relay::listener::build_qso;
//!
//! let body = "<CALL:6>LU5WSO<BAND:3>40m<MODE:2>CW<QSO_DATE:8>20240115<TIME_ON:4>1430<EOR>";
//! let qso = build_qso(body, Some("LU9XYZ")).expect("Failed to build QSO");
//!
//! assert_eq!(qso.call, "LU5WSO");
//! assert_eq!(qso.date, "15/01/2024");
//! ```

pub mod config;
pub mod listener;
pub mod mapping;
pub mod metrics;
pub mod normalize;
pub mod parser;
pub mod record;
pub mod software;
pub mod stats;
pub mod submit;

pub use config::{Config, Credentials, PASSWORD_PLACEHOLDER};
pub use listener::{
    PipelineError, RelayCommand, RelayEvent, RelayHandle, RelayServer, build_qso,
};
pub use mapping::{MappingError, map_band, map_mode};
pub use normalize::{ValidationError, normalize};
pub use parser::{ParseError, parse_record};
pub use record::{QsoRecord, RawRecord};
pub use software::{DEFAULT_UDP_PORT, port_for};
pub use stats::{RelayStats, RelaySummary};
pub use submit::{SubmitError, Submitter};
