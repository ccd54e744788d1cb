//! Single Frame (SF) codec.
//!
//! Frames of up to 8 bytes store SF_DL in the low nibble of the N_PCI byte. Longer
//! CAN FD frames use the escape sequence: a zero nibble followed by a full SF_DL byte.

use crate::data_link::dlc::{decode_dlc, min_dlc, validate_frame_length, CLASSIC_CAN_FRAME_LENGTH};
use crate::error::{IsoTpError, Result};
use crate::network::{AddressingFormat, PacketAddress};

use super::{expect_kind, pad_frame, packet_kind, PacketKind};

const SHORT_PCI_LENGTH: usize = 1;
const LONG_PCI_LENGTH: usize = 2;

fn pci_length(frame_length: usize) -> usize {
    if frame_length <= CLASSIC_CAN_FRAME_LENGTH {
        SHORT_PCI_LENGTH
    } else {
        LONG_PCI_LENGTH
    }
}

pub fn is_single_frame(format: AddressingFormat, data: &[u8]) -> bool {
    matches!(packet_kind(format, data), Ok(PacketKind::SingleFrame))
}

/// Largest payload a Single Frame with the given DLC can carry.
pub fn max_payload(format: AddressingFormat, dlc: u8) -> Result<usize> {
    let frame_length = decode_dlc(dlc)?;
    Ok(frame_length.saturating_sub(format.address_info_byte_count() + pci_length(frame_length)))
}

/// Builds Single Frame data carrying `payload`.
///
/// Without a DLC the shortest frame that holds the payload is used.
pub fn build(
    address: &PacketAddress,
    payload: &[u8],
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Err(IsoTpError::invalid_value(
            "SF_DL",
            "a Single Frame must carry at least one byte",
        ));
    }
    encode(address, payload, dlc, filler_byte)
}

/// Like [`build`] but also accepts an empty payload.
pub fn build_lenient(
    address: &PacketAddress,
    payload: &[u8],
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    encode(address, payload, dlc, filler_byte)
}

fn encode(
    address: &PacketAddress,
    payload: &[u8],
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    let mut frame = address.address_info()?;
    let frame_length = match dlc {
        Some(dlc) => decode_dlc(dlc)?,
        None => {
            let short = frame.len() + SHORT_PCI_LENGTH + payload.len();
            if short <= CLASSIC_CAN_FRAME_LENGTH {
                short
            } else {
                decode_dlc(min_dlc(frame.len() + LONG_PCI_LENGTH + payload.len())?)?
            }
        }
    };
    let required = frame.len() + pci_length(frame_length) + payload.len();
    if required > frame_length {
        return Err(IsoTpError::inconsistent(format!(
            "{} payload bytes need a {}-byte frame, DLC gives {}",
            payload.len(),
            required,
            frame_length
        )));
    }
    if pci_length(frame_length) == SHORT_PCI_LENGTH {
        frame.push(payload.len() as u8);
    } else {
        frame.push(0x00);
        frame.push(payload.len() as u8);
    }
    frame.extend_from_slice(payload);
    pad_frame(&mut frame, frame_length, filler_byte);
    Ok(frame)
}

/// Returns `(SF_DL, payload offset)`.
fn header(format: AddressingFormat, data: &[u8]) -> Result<(usize, usize)> {
    let ai = format.address_info_byte_count();
    let pci = data[ai];
    let (sf_dl, start) = if data.len() <= CLASSIC_CAN_FRAME_LENGTH {
        ((pci & 0x0F) as usize, ai + SHORT_PCI_LENGTH)
    } else {
        if pci & 0x0F != 0 {
            return Err(IsoTpError::invalid_value(
                "SF_DL",
                format!(
                    "frames of {} bytes must use the SF_DL escape sequence",
                    data.len()
                ),
            ));
        }
        let sf_dl = *data.get(ai + 1).ok_or_else(|| {
            IsoTpError::inconsistent("frame data too short for the SF_DL byte")
        })?;
        (sf_dl as usize, ai + LONG_PCI_LENGTH)
    };
    if sf_dl == 0 {
        return Err(IsoTpError::invalid_value("SF_DL", "zero-length Single Frame"));
    }
    if start + sf_dl > data.len() {
        return Err(IsoTpError::inconsistent(format!(
            "SF_DL {} exceeds the {} bytes available",
            sf_dl,
            data.len() - start
        )));
    }
    Ok((sf_dl, start))
}

fn checked_header(format: AddressingFormat, data: &[u8]) -> Result<(usize, usize)> {
    expect_kind(format, data, PacketKind::SingleFrame)?;
    validate_frame_length(data.len())?;
    header(format, data)
}

/// Checks that raw frame data is a well-formed Single Frame.
pub fn validate(format: AddressingFormat, data: &[u8]) -> Result<()> {
    checked_header(format, data).map(|_| ())
}

/// SF_DL of Single Frame data.
pub fn data_length(format: AddressingFormat, data: &[u8]) -> Result<usize> {
    checked_header(format, data).map(|(sf_dl, _)| sf_dl)
}

/// Payload of Single Frame data, without padding.
pub fn payload(format: AddressingFormat, data: &[u8]) -> Result<&[u8]> {
    let (sf_dl, start) = checked_header(format, data)?;
    Ok(&data[start..start + sf_dl])
}
