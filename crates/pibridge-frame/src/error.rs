/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the one-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The command does not fit the domain's command field.
    #[error("command {command:#06x} does not fit the {domain} command field (max {max:#06x})")]
    CommandOutOfRange {
        domain: crate::Domain,
        command: u16,
        max: u16,
    },

    /// The buffer ends before the frame does.
    #[error("truncated frame ({available} of {needed} bytes)")]
    Truncated { needed: usize, available: usize },

    /// The first byte is not a known domain marker.
    #[error("unknown domain marker {0:#04x}")]
    UnknownDomain(u8),

    /// The buffer holds more bytes than the frame declares.
    #[error("length mismatch (frame declares {declared} bytes, buffer holds {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

impl FrameError {
    /// Returns true if more bytes could turn this into a valid frame.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::Truncated { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
