//! Addressing domains on the bridge.
//!
//! Local I/O modules sit directly on the bus and take a one-byte command.
//! Gateway modules are reached through a destination byte and take a
//! 16-bit command; they may relay the request over a second link.

use std::fmt;

/// Marker byte opening a local I/O frame ("I").
pub const LOCAL_IO_MARKER: u8 = 0x49;

/// Marker byte opening a gateway frame ("G").
pub const GATEWAY_MARKER: u8 = 0x47;

/// Largest payload a frame can carry (one-byte length field).
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Addressing domain of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// I/O expansion module: 1-byte address, 1-byte command.
    LocalIo,
    /// Gateway-addressed module: 1-byte destination, 2-byte command.
    Gateway,
}

impl Domain {
    /// Marker byte that opens frames of this domain.
    pub const fn marker(self) -> u8 {
        match self {
            Domain::LocalIo => LOCAL_IO_MARKER,
            Domain::Gateway => GATEWAY_MARKER,
        }
    }

    /// Domain for a marker byte, if any.
    pub const fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            LOCAL_IO_MARKER => Some(Domain::LocalIo),
            GATEWAY_MARKER => Some(Domain::Gateway),
            _ => None,
        }
    }

    /// Header size: marker, address, command, length.
    pub const fn header_size(self) -> usize {
        match self {
            Domain::LocalIo => 4,
            Domain::Gateway => 5,
        }
    }

    /// Largest command value the domain's command field holds.
    pub const fn max_command(self) -> u16 {
        match self {
            Domain::LocalIo => u8::MAX as u16,
            Domain::Gateway => u16::MAX,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Domain::LocalIo => "local-io",
            Domain::Gateway => "gateway",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_roundtrip() {
        for domain in [Domain::LocalIo, Domain::Gateway] {
            assert_eq!(Domain::from_marker(domain.marker()), Some(domain));
        }
        assert_eq!(Domain::from_marker(0x00), None);
    }

    #[test]
    fn field_widths() {
        assert_eq!(Domain::LocalIo.max_command(), 0xFF);
        assert_eq!(Domain::Gateway.max_command(), 0xFFFF);
        assert_eq!(Domain::LocalIo.header_size(), 4);
        assert_eq!(Domain::Gateway.header_size(), 5);
    }
}
