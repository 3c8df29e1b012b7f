//! Validation and translation of band and mode values to LdA vocabulary.
//!
//! Both tables are closed enumerations: LdA only accepts the values listed
//! here, so anything outside them is rejected before submission. Lookups
//! are case-insensitive. Several mode families collapse to one destination
//! value (USB/LSB → SSB, the PSK variants → PSK).

use thiserror::Error;

/// A band or mode value outside the supported enumerations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// The band is not accepted by LdA.
    #[error("band not supported by LdA: {0}")]
    UnsupportedBand(String),

    /// The mode is not accepted by LdA.
    #[error("mode not supported by LdA: {0}")]
    UnsupportedMode(String),
}

/// Accepted bands (lower-case key) and their LdA spelling.
const BAND_MAP: &[(&str, &str)] = &[
    ("160m", "160m"),
    ("80m", "80m"),
    ("40m", "40m"),
    ("30m", "30m"),
    ("20m", "20m"),
    ("17m", "17m"),
    ("15m", "15m"),
    ("12m", "12m"),
    ("10m", "10m"),
    ("6m", "6m"),
    ("2m", "2m"),
    ("70cm", "70cm"),
    ("23cm", "23cm"),
    ("13cm", "13cm"),
    ("9cm", "9cm"),
    ("6cm", "6cm"),
    ("3cm", "3cm"),
    ("1.25cm", "1.25cm"),
];

/// Accepted modes (upper-case key) and their LdA translation.
const MODE_MAP: &[(&str, &str)] = &[
    ("CW", "CW"),
    ("SSB", "SSB"),
    ("USB", "SSB"),
    ("LSB", "SSB"),
    ("FM", "FM"),
    ("AM", "AM"),
    ("RTTY", "RTTY"),
    ("FT8", "FT8"),
    ("FT4", "FT4"),
    ("PSK", "PSK"),
    ("PSK31", "PSK"),
    ("PSK63", "PSK"),
    ("JT65", "JT65"),
    ("JT9", "JT9"),
    ("JT4", "JT4"),
    ("JT6M", "JT6M"),
    ("JT44", "JT44"),
    ("QRA64", "QRA64"),
    ("T10", "T10"),
    ("WSPR", "WSPR"),
    ("MSK144", "MSK144"),
    ("SSTV", "SSTV"),
    ("ATV", "ATV"),
    ("DIGITALVOICE", "DV"),
    ("DIGI", "DIG"),
    ("DIG", "DIG"),
    ("MFSK", "MFSK"),
    ("OLIVIA", "OLIVIA"),
];

/// Translate a band to LdA vocabulary.
///
/// # Example
///
/// ```
/// use lda_relay::mapping::map_band;
///
/// assert_eq!(map_band("40M").unwrap(), "40m");
/// assert!(map_band("11m").is_err());
/// ```
pub fn map_band(band: &str) -> Result<&'static str, MappingError> {
    let key = band.trim().to_ascii_lowercase();
    BAND_MAP
        .iter()
        .find(|(known, _)| *known == key)
        .map(|(_, dest)| *dest)
        .ok_or_else(|| MappingError::UnsupportedBand(band.trim().to_string()))
}

/// Translate a mode to LdA vocabulary.
pub fn map_mode(mode: &str) -> Result<&'static str, MappingError> {
    let key = mode.trim().to_ascii_uppercase();
    MODE_MAP
        .iter()
        .find(|(known, _)| *known == key)
        .map(|(_, dest)| *dest)
        .ok_or_else(|| MappingError::UnsupportedMode(mode.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_band_identity_mappings() {
        assert_eq!(map_band("160m").unwrap(), "160m");
        assert_eq!(map_band("20m").unwrap(), "20m");
        assert_eq!(map_band("70cm").unwrap(), "70cm");
        assert_eq!(map_band("1.25cm").unwrap(), "1.25cm");
    }

    #[test]
    fn test_band_case_insensitive() {
        assert_eq!(map_band("40M").unwrap(), "40m");
        assert_eq!(map_band("  70CM  ").unwrap(), "70cm");
    }

    #[test]
    fn test_unsupported_band_names_value() {
        let err = map_band("11m").unwrap_err();
        assert_eq!(err, MappingError::UnsupportedBand("11m".to_string()));
        assert!(err.to_string().contains("11m"));
    }

    #[test]
    fn test_mode_family_collapse() {
        assert_eq!(map_mode("SSB").unwrap(), "SSB");
        assert_eq!(map_mode("USB").unwrap(), "SSB");
        assert_eq!(map_mode("LSB").unwrap(), "SSB");
        assert_eq!(map_mode("PSK31").unwrap(), "PSK");
        assert_eq!(map_mode("PSK63").unwrap(), "PSK");
        assert_eq!(map_mode("DIGITALVOICE").unwrap(), "DV");
        assert_eq!(map_mode("DIGI").unwrap(), "DIG");
    }

    #[test]
    fn test_mode_case_insensitive() {
        assert_eq!(map_mode("cw").unwrap(), "CW");
        assert_eq!(map_mode("Ft8").unwrap(), "FT8");
        assert_eq!(map_mode(" olivia ").unwrap(), "OLIVIA");
    }

    #[test]
    fn test_unsupported_mode_names_value() {
        let err = map_mode("HELL").unwrap_err();
        assert_eq!(err, MappingError::UnsupportedMode("HELL".to_string()));
    }

    proptest! {
        /// Band lookups are case-insensitive: any casing of an input maps
        /// to the same value or fails identically.
        #[test]
        fn prop_band_casing_equivalent(band in "[0-9a-zA-Z.]{1,8}") {
            let upper = map_band(&band.to_ascii_uppercase());
            let lower = map_band(&band.to_ascii_lowercase());
            prop_assert_eq!(upper.is_ok(), lower.is_ok());
            if let (Ok(a), Ok(b)) = (upper, lower) {
                prop_assert_eq!(a, b);
            }
        }

        #[test]
        fn prop_mode_casing_equivalent(mode in "[0-9a-zA-Z]{1,12}") {
            let upper = map_mode(&mode.to_ascii_uppercase());
            let lower = map_mode(&mode.to_ascii_lowercase());
            prop_assert_eq!(upper.is_ok(), lower.is_ok());
            if let (Ok(a), Ok(b)) = (upper, lower) {
                prop_assert_eq!(a, b);
            }
        }
    }
}
