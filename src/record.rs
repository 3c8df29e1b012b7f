//! Data structures for QSO records at the two pipeline stages.
//!
//! A [`RawRecord`] is the flat field map decoded from one datagram; a
//! [`QsoRecord`] is the normalized, submission-ready form.

use std::collections::HashMap;
use std::fmt;

/// Flat field mapping decoded from one datagram.
///
/// Keys are stored upper-cased so lookups are case-insensitive regardless
/// of how the logging program spelled them. A raw record has no identity
/// beyond the packet that produced it and is discarded after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, upper-casing the name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_ascii_uppercase(), value.into());
    }

    /// Look up a field by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// First non-empty value among the aliases, checked in order.
    pub fn first_of(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .filter_map(|name| self.get(name))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record holds no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, S)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (S, S)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (name, value) in iter {
            record.insert(&name.into(), value);
        }
        record
    }
}

/// A normalized QSO ready for submission to LdA.
///
/// Produced by the normalize and map stages; by the time a value of this
/// type exists, `band` and `mode` are in LdA vocabulary, `date` is
/// `DD/MM/YYYY` and `time` is `HHMM`.
#[derive(Debug, Clone, PartialEq)]
pub struct QsoRecord {
    /// Correspondent callsign (the station worked).
    pub call: String,

    /// Band in LdA vocabulary (e.g. "40m").
    pub band: String,

    /// Mode in LdA vocabulary (e.g. "SSB").
    pub mode: String,

    /// QSO date as `DD/MM/YYYY`.
    pub date: String,

    /// QSO start time as `HHMM`.
    pub time: String,

    /// Signal report sent, defaulted to "59" when absent.
    pub rst_sent: String,

    /// Free-text comment, truncated to 100 characters. May be empty;
    /// the submitter substitutes a stock greeting in that case.
    pub comment: String,

    /// Transmitting station callsign, either from the record itself or
    /// from configuration.
    pub station_callsign: String,

    /// Propagation mode, forwarded only when present and not "N/A".
    pub prop_mode: Option<String>,
}

impl fmt::Display for QsoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} {} at {} {}",
            self.call, self.band, self.mode, self.date, self.time
        )
    }
}
