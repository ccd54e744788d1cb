//! Consecutive Frame (CF) codec.
//!
//! The low nibble of the N_PCI byte carries the sequence number. Everything after it is
//! payload; a Consecutive Frame has no length field, so padding on the last frame of a
//! message is indistinguishable from data until FF_DL is applied.

use crate::data_link::dlc::{decode_dlc, validate_frame_length};
use crate::error::{IsoTpError, Result};
use crate::network::{AddressingFormat, PacketAddress};

use super::{expect_kind, pad_frame, packet_kind, resolve_frame_length, PacketKind};

const PCI_LENGTH: usize = 1;
/// Highest sequence number; numbering wraps from here to zero.
pub const MAX_SEQUENCE_NUMBER: u8 = 0x0F;

pub fn is_consecutive_frame(format: AddressingFormat, data: &[u8]) -> bool {
    matches!(packet_kind(format, data), Ok(PacketKind::ConsecutiveFrame))
}

/// Number of payload bytes a Consecutive Frame with the given DLC carries.
pub fn payload_capacity(format: AddressingFormat, dlc: u8) -> Result<usize> {
    let frame_length = decode_dlc(dlc)?;
    Ok(frame_length.saturating_sub(format.address_info_byte_count() + PCI_LENGTH))
}

/// Shortest frame a strict Consecutive Frame may use: N_AI, N_PCI and one payload byte.
pub fn min_frame_length(format: AddressingFormat) -> usize {
    format.address_info_byte_count() + PCI_LENGTH + 1
}

/// Sequence number following `sequence_number`.
pub fn next_sequence_number(sequence_number: u8) -> u8 {
    sequence_number.wrapping_add(1) & MAX_SEQUENCE_NUMBER
}

fn check_sequence_number(sequence_number: u8) -> Result<()> {
    if sequence_number > MAX_SEQUENCE_NUMBER {
        return Err(IsoTpError::invalid_value(
            "sequence number",
            format!("{:#X} does not fit in a nibble", sequence_number),
        ));
    }
    Ok(())
}

/// Builds Consecutive Frame data.
///
/// Requires at least one payload byte. Without a DLC the shortest frame holding the
/// payload is used; otherwise the frame is padded with `filler_byte`.
pub fn build(
    address: &PacketAddress,
    sequence_number: u8,
    payload: &[u8],
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    check_sequence_number(sequence_number)?;
    if payload.is_empty() {
        return Err(IsoTpError::inconsistent(
            "a Consecutive Frame must carry at least one byte",
        ));
    }
    if let Some(dlc) = dlc {
        let minimum = min_frame_length(address.addressing_format);
        let frame_length = decode_dlc(dlc)?;
        if frame_length < minimum {
            return Err(IsoTpError::inconsistent(format!(
                "DLC {:#X} gives a {}-byte Consecutive Frame, minimum is {}",
                dlc, frame_length, minimum
            )));
        }
    }
    encode(address, sequence_number, payload, dlc, filler_byte)
}

/// Like [`build`] but also accepts an empty payload.
pub fn build_lenient(
    address: &PacketAddress,
    sequence_number: u8,
    payload: &[u8],
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    check_sequence_number(sequence_number)?;
    encode(address, sequence_number, payload, dlc, filler_byte)
}

fn encode(
    address: &PacketAddress,
    sequence_number: u8,
    payload: &[u8],
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    let mut frame = address.address_info()?;
    let frame_length = resolve_frame_length(dlc, frame.len() + PCI_LENGTH + payload.len())?;
    frame.push(((PacketKind::ConsecutiveFrame.nibble()) << 4) | sequence_number);
    frame.extend_from_slice(payload);
    pad_frame(&mut frame, frame_length, filler_byte);
    Ok(frame)
}

/// Checks that raw frame data is a well-formed Consecutive Frame.
pub fn validate(format: AddressingFormat, data: &[u8]) -> Result<()> {
    expect_kind(format, data, PacketKind::ConsecutiveFrame)?;
    validate_frame_length(data.len())?;
    let minimum = min_frame_length(format);
    if data.len() < minimum {
        return Err(IsoTpError::inconsistent(format!(
            "Consecutive Frame of {} bytes carries no payload (minimum {})",
            data.len(),
            minimum
        )));
    }
    Ok(())
}

/// Sequence number of Consecutive Frame data.
pub fn sequence_number(format: AddressingFormat, data: &[u8]) -> Result<u8> {
    validate(format, data)?;
    Ok(data[format.address_info_byte_count()] & MAX_SEQUENCE_NUMBER)
}

/// Everything after the N_PCI byte, padding included.
pub fn payload(format: AddressingFormat, data: &[u8]) -> Result<&[u8]> {
    validate(format, data)?;
    Ok(&data[format.address_info_byte_count() + PCI_LENGTH..])
}
