//! Parser for QSO datagrams in JSON or ADIF form.
//!
//! Logging programs broadcast one record per datagram, either as a JSON
//! object or as a run of ADIF tags. The JSON interpretation is attempted
//! first; when it fails (or yields something other than an object), the
//! input is scanned for ADIF-style tags with `nom`.
//!
//! # ADIF subset
//!
//! Tags have the shape `<NAME[:LENGTH[:TYPE]]>value`. A value runs until
//! the next `<`; an explicit length truncates it to that many characters.
//! Scanning stops at an `EOR` or `EOH` terminator tag.
//!
//! ```text
//! <CALL:6>LU5WSO<BAND:3>40m<MODE:2>CW<EOR>
//! ```

use nom::{
    IResult, Parser,
    bytes::complete::{take_till, take_while1},
    character::complete::{char, digit1},
    combinator::{map_res, opt},
    sequence::{delimited, preceded},
};
use thiserror::Error;

use crate::record::RawRecord;

/// Errors that can occur while decoding a datagram.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Neither interpretation succeeded. Carries both failure reasons.
    #[error("neither JSON nor ADIF: {json_reason}; {adif_reason}")]
    Unrecognized {
        /// Why the JSON interpretation was rejected.
        json_reason: String,
        /// Why the ADIF scan yielded nothing.
        adif_reason: String,
    },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse one datagram body into a raw field map.
///
/// The caller is expected to have rejected empty input already; an input
/// that decodes under neither interpretation fails with [`ParseError`].
///
/// # Example
///
/// ```
/// use lda_relay::parser::parse_record;
///
/// let record = parse_record("<CALL:6>LU5WSO<BAND:3>40m<MODE:2>CW<EOR>").unwrap();
/// assert_eq!(record.get("CALL"), Some("LU5WSO"));
/// assert_eq!(record.get("BAND"), Some("40m"));
/// ```
pub fn parse_record(input: &str) -> ParseResult<RawRecord> {
    let json_reason = match serde_json::from_str::<serde_json::Value>(input) {
        Ok(serde_json::Value::Object(map)) => return Ok(from_json_object(map)),
        Ok(other) => format!("JSON value is not an object ({})", json_type_name(&other)),
        Err(e) => format!("invalid JSON ({})", e),
    };

    let record = scan_adif(input);
    if record.is_empty() {
        return Err(ParseError::Unrecognized {
            json_reason,
            adif_reason: "no ADIF tags found".to_string(),
        });
    }
    Ok(record)
}

/// Build a raw record from a parsed JSON object, upper-casing the keys.
fn from_json_object(map: serde_json::Map<String, serde_json::Value>) -> RawRecord {
    let mut record = RawRecord::new();
    for (key, value) in map {
        let value = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => continue,
            other => other.to_string(),
        };
        record.insert(&key, value);
    }
    record
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Parse a tag name: everything up to a `:`, `>` or `<`.
fn tag_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ':' && c != '>' && c != '<').parse(input)
}

/// Parse the `:LENGTH` suffix of a tag.
fn tag_length(input: &str) -> IResult<&str, usize> {
    preceded(char(':'), map_res(digit1, |s: &str| s.parse::<usize>())).parse(input)
}

/// Parse one `<NAME[:LENGTH[:TYPE]]>` header. The optional type specifier
/// after the length is accepted and ignored.
fn tag_header(input: &str) -> IResult<&str, (&str, Option<usize>)> {
    delimited(
        char('<'),
        (tag_name, opt(tag_length), take_till(|c| c == '>' || c == '<')),
        char('>'),
    )
    .parse(input)
    .map(|(rest, (name, length, _))| (rest, (name, length)))
}

/// Scan input for ADIF tags, accumulating name → value pairs until a
/// terminator tag (`EOR`/`EOH`) or the end of input.
fn scan_adif(input: &str) -> RawRecord {
    let mut record = RawRecord::new();
    let mut rest = input;

    while let Some(start) = rest.find('<') {
        rest = &rest[start..];

        let (after, (name, length)) = match tag_header(rest) {
            Ok(parsed) => parsed,
            Err(_) => {
                // Stray '<' with no well-formed tag; skip it and keep scanning.
                rest = &rest[1..];
                continue;
            }
        };

        let name = name.to_ascii_uppercase();
        if name == "EOR" || name == "EOH" {
            break;
        }

        let value_end = after.find('<').unwrap_or(after.len());
        let mut value = after[..value_end].trim();
        if let Some(length) = length {
            value = truncate_chars(value, length);
        }
        record.insert(&name, value);

        rest = &after[value_end..];
    }

    record
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
