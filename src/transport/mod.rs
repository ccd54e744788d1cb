//! Transport layer: ISO-TP packet codecs, flow control and segmentation.
//!
//! Every CAN frame carrying ISO-TP data starts with the optional address information
//! byte, followed by the network protocol control information (N_PCI). The high nibble
//! of the first N_PCI byte selects one of four packet kinds:
//!
//! | Kind              | Nibble | Module                  |
//! |-------------------|--------|-------------------------|
//! | Single Frame      | `0x0`  | [`single_frame`]        |
//! | First Frame       | `0x1`  | [`first_frame`]         |
//! | Consecutive Frame | `0x2`  | [`consecutive_frame`]   |
//! | Flow Control      | `0x3`  | [`flow_control`]        |
//!
//! Each codec module exposes the same shape: an `is_*` peek, a strict `build`, a
//! `build_lenient` that accepts degenerate input for conformance testing, and
//! `validate` for received frame data. [`CanPacket`] wraps the codecs in a value type,
//! [`CanSegmenter`] turns messages into packet sequences and back, and [`IsoTp`] drives
//! both over a [`crate::physical::PhysicalLayer`].

pub mod consecutive_frame;
pub mod first_frame;
pub mod flow_control;
pub mod flow_control_generator;
pub mod isotp;
pub mod packet;
pub mod segmenter;
pub mod single_frame;
pub mod st_min;

#[cfg(test)]
mod tests;

pub use flow_control::FlowStatus;
pub use flow_control_generator::{
    FlowControlParameters, FlowControlParametersGenerator, FlowControlParametersIter,
};
pub use isotp::{IsoTp, IsoTpConfig};
pub use packet::CanPacket;
pub use segmenter::{CanSegmenter, SegmenterConfig};

use crate::data_link::dlc::{decode_dlc, min_dlc};
use crate::error::{IsoTpError, Result};
use crate::network::AddressingFormat;
use crate::types::Message;

/// Byte used to pad frames up to their DLC length unless configured otherwise.
pub const DEFAULT_FILLER_BYTE: u8 = 0xCC;

/// N_PCI packet kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    SingleFrame = 0x0,
    FirstFrame = 0x1,
    ConsecutiveFrame = 0x2,
    FlowControl = 0x3,
}

impl PacketKind {
    /// Value stored in the high nibble of the first N_PCI byte.
    pub fn nibble(self) -> u8 {
        self as u8
    }

    pub fn from_nibble(nibble: u8) -> Result<Self> {
        match nibble {
            0x0 => Ok(PacketKind::SingleFrame),
            0x1 => Ok(PacketKind::FirstFrame),
            0x2 => Ok(PacketKind::ConsecutiveFrame),
            0x3 => Ok(PacketKind::FlowControl),
            _ => Err(IsoTpError::NotImplemented(format!(
                "N_PCI type {:#X} has no handler",
                nibble
            ))),
        }
    }

    /// True for kinds that can start a message.
    pub fn is_initial(self) -> bool {
        matches!(self, PacketKind::SingleFrame | PacketKind::FirstFrame)
    }
}

/// Reads the packet kind from raw frame data.
pub fn packet_kind(format: AddressingFormat, data: &[u8]) -> Result<PacketKind> {
    let pci = data
        .get(format.address_info_byte_count())
        .ok_or_else(|| IsoTpError::inconsistent("frame data too short to hold N_PCI"))?;
    PacketKind::from_nibble(pci >> 4)
}

pub(crate) fn expect_kind(format: AddressingFormat, data: &[u8], kind: PacketKind) -> Result<()> {
    let found = packet_kind(format, data)?;
    if found != kind {
        return Err(IsoTpError::inconsistent(format!(
            "frame data holds a {:?}, not a {:?}",
            found, kind
        )));
    }
    Ok(())
}

/// Frame length for a packet needing `required` bytes.
///
/// A forced DLC must describe at least `required` bytes; without one the shortest
/// fitting frame is used.
pub(crate) fn resolve_frame_length(dlc: Option<u8>, required: usize) -> Result<usize> {
    match dlc {
        Some(dlc) => {
            let frame_length = decode_dlc(dlc)?;
            if frame_length < required {
                return Err(IsoTpError::inconsistent(format!(
                    "DLC {:#X} ({} bytes) cannot hold {} bytes",
                    dlc, frame_length, required
                )));
            }
            Ok(frame_length)
        }
        None => decode_dlc(min_dlc(required)?),
    }
}

pub(crate) fn pad_frame(frame: &mut Vec<u8>, frame_length: usize, filler_byte: u8) {
    if frame.len() < frame_length {
        frame.resize(frame_length, filler_byte);
    }
}

/// Transport layer trait implemented by the ISO-TP driver
pub trait TransportLayer {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn send(&mut self, message: &Message) -> Result<()>;
    fn receive(&mut self) -> Result<Message>;
}
