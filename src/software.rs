//! Mapping of logging-software identifiers to their UDP broadcast ports.
//!
//! Each supported logging program broadcasts its QSO records on a fixed
//! port. The table is static; an unrecognized program name falls back to
//! the Log4OM port.

/// Port used when the software name is empty or unrecognized.
pub const DEFAULT_UDP_PORT: u16 = 2233;

/// Known logging programs and the ports they broadcast on.
pub const SOFTWARE_PORTS: &[(&str, u16)] = &[
    ("log4om", 2233),
    ("wsjtx", 2333),
    ("jtdx", 2333),
    ("n1mm", 12060),
];

/// Resolve the UDP port for a logging-software identifier.
///
/// The lookup is case-insensitive and total: any string resolves to a port,
/// falling back to [`DEFAULT_UDP_PORT`] for names not in the table.
///
/// # Example
///
/// ```
/// use lda_relay::software::port_for;
///
/// assert_eq!(port_for("n1mm"), 12060);
/// assert_eq!(port_for("unknown"), 2233);
/// ```
pub fn port_for(software: &str) -> u16 {
    let name = software.trim().to_ascii_lowercase();
    SOFTWARE_PORTS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, port)| *port)
        .unwrap_or(DEFAULT_UDP_PORT)
}

/// Name of the logging program conventionally broadcasting on a port.
///
/// Ports shared by several programs resolve to the first table entry.
pub fn software_for_port(port: u16) -> &'static str {
    SOFTWARE_PORTS
        .iter()
        .find(|(_, known)| *known == port)
        .map(|(name, _)| *name)
        .unwrap_or("unknown")
}
