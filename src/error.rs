//! Error types for the ISO-TP codec, segmentation engine and transport driver.
//!
//! The taxonomy separates caller mistakes from wire problems:
//!
//! - [`IsoTpError::InconsistentArguments`]: mutually contradictory inputs, such as a
//!   forced DLC that cannot hold the declared First Frame length.
//! - [`IsoTpError::InvalidValue`]: a single value outside its legal range (raw byte,
//!   STmin, DLC, sequence number, CAN identifier).
//! - [`IsoTpError::Segmentation`]: a packet sequence handed to desegmentation that is
//!   not complete. The wrapped [`SegmentationError`] tells which check failed.
//! - [`IsoTpError::NotImplemented`]: a wire value with no local handler.
//!
//! Reserved-but-legal wire values (reserved STmin codes) never produce an error; they
//! are resolved with a fallback and reported through `tracing`.

use thiserror::Error;

use crate::transport::PacketKind;

/// Reason a packet sequence could not be desegmented.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SegmentationError {
    #[error("packet sequence is empty")]
    EmptySequence,

    #[error("sequence does not start with a Single Frame or First Frame (found {kind:?})")]
    NotInitialPacket { kind: PacketKind },

    #[error("packet {index} is not supported by this segmenter")]
    UnsupportedPacket { index: usize },

    #[error("packet {index} has unexpected kind {kind:?}")]
    UnexpectedPacketKind { index: usize, kind: PacketKind },

    #[error("packet {index} carries sequence number {found:#X}, expected {expected:#X}")]
    SequenceNumber { index: usize, expected: u8, found: u8 },

    #[error("packet {index} has a {found}-byte frame, {expected} bytes expected")]
    FrameLength {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("sequence holds {found} packets, {expected} required")]
    PacketCount { expected: usize, found: usize },

    #[error("sequence carries {found} payload bytes, {expected} declared")]
    PayloadLength { expected: usize, found: usize },
}

/// Main error type for ISO-TP operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IsoTpError {
    #[error("Inconsistent arguments: {0}")]
    InconsistentArguments(String),

    #[error("Invalid {parameter}: {details}")]
    InvalidValue {
        parameter: &'static str,
        details: String,
    },

    #[error("Segmentation error: {0}")]
    Segmentation(#[from] SegmentationError),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Receiver reported overflow")]
    Overflow,

    #[error("Flow control wait limit of {limit} exceeded")]
    WaitLimitExceeded { limit: u8 },

    #[error("Unexpected {kind:?} packet")]
    UnexpectedPacket { kind: PacketKind },

    #[error("Transport is not open")]
    NotOpen,

    #[error("Channel error: {0}")]
    Channel(String),
}

impl IsoTpError {
    /// Build an [`IsoTpError::InconsistentArguments`] error.
    pub fn inconsistent(details: impl Into<String>) -> Self {
        IsoTpError::InconsistentArguments(details.into())
    }

    /// Build an [`IsoTpError::InvalidValue`] error.
    pub fn invalid_value(parameter: &'static str, details: impl Into<String>) -> Self {
        IsoTpError::InvalidValue {
            parameter,
            details: details.into(),
        }
    }

    /// True when the error was raised by desegmentation rather than a codec.
    pub fn is_segmentation_error(&self) -> bool {
        matches!(self, IsoTpError::Segmentation(_))
    }
}

pub type Result<T> = std::result::Result<T, IsoTpError>;
