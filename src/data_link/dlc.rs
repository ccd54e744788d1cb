//! Data Length Code (DLC) handling.
//!
//! DLC values 0-8 map linearly to frame lengths, values 9-15 map onto the CAN FD
//! table `12, 16, 20, 24, 32, 48, 64`.

use crate::error::{IsoTpError, Result};

/// Frame length of a classic CAN data frame.
pub const CLASSIC_CAN_FRAME_LENGTH: usize = 8;
/// Largest frame length a DLC can describe.
pub const MAX_FRAME_LENGTH: usize = 64;
/// Highest valid DLC value.
pub const MAX_DLC: u8 = 0xF;
/// Smallest DLC a segmenter may be configured with.
pub const MIN_BASE_DLC: u8 = 8;

const LINEAR_DLC_MAX: u8 = 8;
const FD_FRAME_LENGTHS: [usize; 7] = [12, 16, 20, 24, 32, 48, 64];

/// Number of data bytes in a frame with the given DLC.
pub fn decode_dlc(dlc: u8) -> Result<usize> {
    match dlc {
        0..=LINEAR_DLC_MAX => Ok(dlc as usize),
        9..=MAX_DLC => Ok(FD_FRAME_LENGTHS[(dlc - 9) as usize]),
        _ => Err(IsoTpError::invalid_value(
            "DLC",
            format!("{:#X} is outside 0x0..=0xF", dlc),
        )),
    }
}

/// DLC describing exactly `frame_length` data bytes.
///
/// Fails unless `frame_length` is one of the lengths a DLC can describe.
pub fn encode_dlc(frame_length: usize) -> Result<u8> {
    let dlc = min_dlc(frame_length)?;
    if decode_dlc(dlc)? != frame_length {
        return Err(IsoTpError::invalid_value(
            "frame length",
            format!("{} bytes is not a valid CAN frame length", frame_length),
        ));
    }
    Ok(dlc)
}

/// Smallest DLC whose frame can hold `byte_count` data bytes.
pub fn min_dlc(byte_count: usize) -> Result<u8> {
    if byte_count <= LINEAR_DLC_MAX as usize {
        return Ok(byte_count as u8);
    }
    FD_FRAME_LENGTHS
        .iter()
        .position(|&length| length >= byte_count)
        .map(|index| index as u8 + 9)
        .ok_or_else(|| {
            IsoTpError::invalid_value(
                "frame length",
                format!(
                    "{} bytes exceeds the maximum of {}",
                    byte_count, MAX_FRAME_LENGTH
                ),
            )
        })
}

/// True if `frame_length` is a length some DLC describes.
pub fn is_frame_length(frame_length: usize) -> bool {
    frame_length <= LINEAR_DLC_MAX as usize || FD_FRAME_LENGTHS.contains(&frame_length)
}

pub(crate) fn validate_frame_length(frame_length: usize) -> Result<()> {
    if is_frame_length(frame_length) {
        Ok(())
    } else {
        Err(IsoTpError::invalid_value(
            "frame length",
            format!("{} bytes is not a valid CAN frame length", frame_length),
        ))
    }
}
