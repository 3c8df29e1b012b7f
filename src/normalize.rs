//! Derivation of canonical QSO fields from a raw record.
//!
//! Each logical field has a fixed, ordered list of accepted aliases; the
//! first non-empty value wins. Date and time are rewritten into the forms
//! LdA expects (`DD/MM/YYYY` and `HHMM`), substituting the current date or
//! time when the record carries nothing usable. The caller supplies "now"
//! so the substitution is deterministic under test.

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use thiserror::Error;

use crate::record::{QsoRecord, RawRecord};

/// A required field that could not be resolved from the record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No correspondent callsign in the record.
    #[error("missing correspondent callsign")]
    MissingCall,

    /// No band in the record.
    #[error("missing band")]
    MissingBand,

    /// No mode in the record.
    #[error("missing mode")]
    MissingMode,

    /// Neither the record nor the configuration named a transmitting call.
    #[error("missing station callsign")]
    MissingStationCallsign,
}

/// Accepted aliases per logical field, checked in priority order.
const CALL_ALIASES: &[&str] = &["CALL"];
const BAND_ALIASES: &[&str] = &["BAND"];
const MODE_ALIASES: &[&str] = &["MODE"];
const DATE_ALIASES: &[&str] = &["QSO_DATE"];
const TIME_ALIASES: &[&str] = &["TIME_ON"];
const RST_ALIASES: &[&str] = &["RST_SENT"];
const COMMENT_ALIASES: &[&str] = &["COMMENT", "NOTES"];
const STATION_ALIASES: &[&str] = &["STATION_CALLSIGN", "OPERATOR"];
const PROP_ALIASES: &[&str] = &["PROP_MODE"];

/// Default signal report when the record carries none.
const DEFAULT_RST: &str = "59";

/// Upper bound on the free-text comment forwarded to LdA.
const MAX_COMMENT_CHARS: usize = 100;

/// Derive a normalized QSO from a raw record.
///
/// `station_callsign` is the configured fallback for the transmitting
/// call; an explicit `STATION_CALLSIGN`/`OPERATOR` field in the record
/// takes precedence. `now` feeds the date and time substitutions.
///
/// The returned record still carries the band and mode as received; the
/// mapping stage translates them to LdA vocabulary.
pub fn normalize(
    raw: &RawRecord,
    station_callsign: Option<&str>,
    now: DateTime<Local>,
) -> Result<QsoRecord, ValidationError> {
    let call = raw
        .first_of(CALL_ALIASES)
        .ok_or(ValidationError::MissingCall)?;
    let band = raw
        .first_of(BAND_ALIASES)
        .ok_or(ValidationError::MissingBand)?;
    let mode = raw
        .first_of(MODE_ALIASES)
        .ok_or(ValidationError::MissingMode)?;

    let station = raw
        .first_of(STATION_ALIASES)
        .or_else(|| station_callsign.map(str::trim).filter(|s| !s.is_empty()))
        .ok_or(ValidationError::MissingStationCallsign)?;

    let date = normalize_date(raw.first_of(DATE_ALIASES), now.date_naive());
    let time = normalize_time(raw.first_of(TIME_ALIASES), now.time());

    let rst_sent = raw.first_of(RST_ALIASES).unwrap_or(DEFAULT_RST).to_string();

    let comment = raw
        .first_of(COMMENT_ALIASES)
        .map(|c| c.chars().take(MAX_COMMENT_CHARS).collect())
        .unwrap_or_default();

    let prop_mode = raw.first_of(PROP_ALIASES).map(str::to_string);

    Ok(QsoRecord {
        call: call.to_string(),
        band: band.to_string(),
        mode: mode.to_string(),
        date,
        time,
        rst_sent,
        comment,
        station_callsign: station.to_string(),
        prop_mode,
    })
}

/// Rewrite a raw date into `DD/MM/YYYY`.
///
/// An exact 8-digit value is reinterpreted as ADIF `YYYYMMDD`; anything
/// else goes through general date parsing; an unparseable or absent date
/// becomes `today`.
fn normalize_date(raw: Option<&str>, today: NaiveDate) -> String {
    let Some(raw) = raw else {
        return today.format("%d/%m/%Y").to_string();
    };

    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return format!("{}/{}/{}", &raw[6..8], &raw[4..6], &raw[0..4]);
    }

    parse_loose_date(raw)
        .unwrap_or(today)
        .format("%d/%m/%Y")
        .to_string()
}

/// Best-effort parse of non-ADIF date spellings.
fn parse_loose_date(s: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Rewrite a raw time into `HHMM`.
///
/// Non-digits are stripped; four or more remaining digits yield the first
/// four, fewer substitute the current time. Always four digits out.
fn normalize_time(raw: Option<&str>, now: NaiveTime) -> String {
    let digits: String = raw
        .unwrap_or("")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    if digits.len() >= 4 {
        digits[..4].to_string()
    } else {
        now.format("%H%M").to_string()
    }
}
