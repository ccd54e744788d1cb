//! First Frame (FF) codec.
//!
//! FF_DL, the total message length, is stored either in 12 bits (low nibble of the
//! N_PCI byte plus one byte) or, for lengths above `0xFFF`, as a zero escape followed by
//! a 32-bit big-endian value. A First Frame always fills its whole frame.

use crate::data_link::dlc::{
    decode_dlc, encode_dlc, validate_frame_length, CLASSIC_CAN_FRAME_LENGTH,
};
use crate::error::{IsoTpError, Result};
use crate::network::{AddressingFormat, PacketAddress};

use super::{
    expect_kind, pad_frame, packet_kind, resolve_frame_length, single_frame, PacketKind,
};

/// Largest FF_DL expressible in the short form.
pub const MAX_SHORT_FF_DL: u32 = 0xFFF;
/// Largest FF_DL expressible in the long form.
pub const MAX_LONG_FF_DL: u32 = u32::MAX;

const SHORT_PCI_LENGTH: usize = 2;
const LONG_PCI_LENGTH: usize = 6;

fn pci_length(long_form: bool) -> usize {
    if long_form {
        LONG_PCI_LENGTH
    } else {
        SHORT_PCI_LENGTH
    }
}

/// True when FF_DL can only be expressed in the long form.
pub fn requires_long_form(ff_dl: u32) -> bool {
    ff_dl > MAX_SHORT_FF_DL
}

pub fn is_first_frame(format: AddressingFormat, data: &[u8]) -> bool {
    matches!(packet_kind(format, data), Ok(PacketKind::FirstFrame))
}

/// Number of payload bytes a First Frame with the given DLC carries.
pub fn payload_capacity(format: AddressingFormat, dlc: u8, long_form: bool) -> Result<usize> {
    let frame_length = decode_dlc(dlc)?;
    Ok(frame_length.saturating_sub(format.address_info_byte_count() + pci_length(long_form)))
}

fn write_header(frame: &mut Vec<u8>, ff_dl: u32, long_form: bool) {
    if long_form {
        frame.push(0x10);
        frame.push(0x00);
        frame.extend_from_slice(&ff_dl.to_be_bytes());
    } else {
        frame.push(0x10 | ((ff_dl >> 8) as u8 & 0x0F));
        frame.push((ff_dl & 0xFF) as u8);
    }
}

/// Builds First Frame data.
///
/// The long form is used when `ff_dl` exceeds [`MAX_SHORT_FF_DL`] or when
/// `force_long_form` is set. `payload` must fill the frame exactly; without a DLC the
/// frame length is derived from the payload and must be a valid CAN frame length.
pub fn build(
    address: &PacketAddress,
    ff_dl: u32,
    payload: &[u8],
    dlc: Option<u8>,
    force_long_form: bool,
) -> Result<Vec<u8>> {
    let long_form = force_long_form || requires_long_form(ff_dl);
    let mut frame = address.address_info()?;
    let header_length = frame.len() + pci_length(long_form);
    let frame_length = match dlc {
        Some(dlc) => decode_dlc(dlc)?,
        None => decode_dlc(encode_dlc(header_length + payload.len())?)?,
    };
    if frame_length < CLASSIC_CAN_FRAME_LENGTH {
        return Err(IsoTpError::inconsistent(format!(
            "a First Frame needs at least {} bytes, frame has {}",
            CLASSIC_CAN_FRAME_LENGTH, frame_length
        )));
    }
    if header_length + payload.len() != frame_length {
        return Err(IsoTpError::inconsistent(format!(
            "{} payload bytes do not fill a {}-byte First Frame ({} header bytes)",
            payload.len(),
            frame_length,
            header_length
        )));
    }
    let sf_capacity =
        single_frame::max_payload(address.addressing_format, encode_dlc(frame_length)?)?;
    if (ff_dl as usize) <= sf_capacity {
        return Err(IsoTpError::inconsistent(format!(
            "FF_DL {} fits a Single Frame of this size ({} bytes)",
            ff_dl, sf_capacity
        )));
    }
    write_header(&mut frame, ff_dl, long_form);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Like [`build`] but accepts any FF_DL the chosen form can express and pads a short
/// payload with `filler_byte`.
pub fn build_lenient(
    address: &PacketAddress,
    ff_dl: u32,
    payload: &[u8],
    dlc: Option<u8>,
    force_long_form: bool,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    let long_form = force_long_form || requires_long_form(ff_dl);
    let mut frame = address.address_info()?;
    let required = frame.len() + pci_length(long_form) + payload.len();
    let frame_length = resolve_frame_length(dlc, required)?;
    write_header(&mut frame, ff_dl, long_form);
    frame.extend_from_slice(payload);
    pad_frame(&mut frame, frame_length, filler_byte);
    Ok(frame)
}

/// Returns `(FF_DL, payload offset)`.
fn header(format: AddressingFormat, data: &[u8]) -> Result<(u32, usize)> {
    let ai = format.address_info_byte_count();
    if data.len() < ai + SHORT_PCI_LENGTH {
        return Err(IsoTpError::inconsistent("frame data too short for FF_DL"));
    }
    if data[ai] & 0x0F == 0 && data[ai + 1] == 0 {
        let bytes = data
            .get(ai + SHORT_PCI_LENGTH..ai + LONG_PCI_LENGTH)
            .ok_or_else(|| IsoTpError::inconsistent("frame data too short for long FF_DL"))?;
        let ff_dl = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Ok((ff_dl, ai + LONG_PCI_LENGTH))
    } else {
        let ff_dl = (((data[ai] & 0x0F) as u32) << 8) | data[ai + 1] as u32;
        Ok((ff_dl, ai + SHORT_PCI_LENGTH))
    }
}

fn checked_header(format: AddressingFormat, data: &[u8]) -> Result<(u32, usize)> {
    expect_kind(format, data, PacketKind::FirstFrame)?;
    validate_frame_length(data.len())?;
    if data.len() < CLASSIC_CAN_FRAME_LENGTH {
        return Err(IsoTpError::inconsistent(format!(
            "First Frame of {} bytes is shorter than {}",
            data.len(),
            CLASSIC_CAN_FRAME_LENGTH
        )));
    }
    let (ff_dl, start) = header(format, data)?;
    let sf_capacity = single_frame::max_payload(format, encode_dlc(data.len())?)?;
    if (ff_dl as usize) <= sf_capacity {
        return Err(IsoTpError::invalid_value(
            "FF_DL",
            format!("{} fits a Single Frame of {} bytes", ff_dl, sf_capacity),
        ));
    }
    Ok((ff_dl, start))
}

/// Checks that raw frame data is a well-formed First Frame.
pub fn validate(format: AddressingFormat, data: &[u8]) -> Result<()> {
    checked_header(format, data).map(|_| ())
}

/// FF_DL declared by First Frame data.
pub fn data_length(format: AddressingFormat, data: &[u8]) -> Result<u32> {
    checked_header(format, data).map(|(ff_dl, _)| ff_dl)
}

/// Payload bytes carried by First Frame data.
pub fn payload(format: AddressingFormat, data: &[u8]) -> Result<&[u8]> {
    let (_, start) = checked_header(format, data)?;
    Ok(&data[start..])
}
