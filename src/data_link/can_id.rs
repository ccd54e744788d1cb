//! CAN identifier handling for the ISO-TP addressing formats.
//!
//! Normal fixed and mixed 29-bit addressing carry target and source address inside a
//! 29-bit identifier laid out as `priority(3) | R | DP | format byte | TA | SA`.

use crate::error::{IsoTpError, Result};
use crate::network::AddressingFormat;
use crate::types::{AddressingType, CanId};

/// Highest 11-bit identifier.
pub const MAX_STANDARD_ID: CanId = 0x7FF;
/// Highest 29-bit identifier.
pub const MAX_EXTENDED_ID: CanId = 0x1FFF_FFFF;
/// Priority used for fixed identifiers unless told otherwise.
pub const DEFAULT_PRIORITY: u8 = 6;

const MAX_PRIORITY: u8 = 7;
const NORMAL_FIXED_PHYSICAL: u8 = 0xDA;
const NORMAL_FIXED_FUNCTIONAL: u8 = 0xDB;
const MIXED_29_PHYSICAL: u8 = 0xCE;
const MIXED_29_FUNCTIONAL: u8 = 0xCD;
// Reserved and data page bits must be zero for ISO-TP fixed identifiers.
const RESERVED_BITS_MASK: CanId = 0x0300_0000;

/// Addressing information recovered from a fixed 29-bit identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedIdInfo {
    pub addressing_type: AddressingType,
    pub target_address: u8,
    pub source_address: u8,
    pub priority: u8,
}

pub fn is_standard_id(id: CanId) -> bool {
    id <= MAX_STANDARD_ID
}

pub fn is_extended_id(id: CanId) -> bool {
    id <= MAX_EXTENDED_ID
}

fn format_byte(format: AddressingFormat, addressing_type: AddressingType) -> Result<u8> {
    match (format, addressing_type) {
        (AddressingFormat::NormalFixed, AddressingType::Physical) => Ok(NORMAL_FIXED_PHYSICAL),
        (AddressingFormat::NormalFixed, AddressingType::Functional) => Ok(NORMAL_FIXED_FUNCTIONAL),
        (AddressingFormat::Mixed29Bit, AddressingType::Physical) => Ok(MIXED_29_PHYSICAL),
        (AddressingFormat::Mixed29Bit, AddressingType::Functional) => Ok(MIXED_29_FUNCTIONAL),
        _ => Err(IsoTpError::inconsistent(format!(
            "{:?} addressing does not use a fixed CAN identifier",
            format
        ))),
    }
}

/// Builds the 29-bit identifier for normal fixed or mixed 29-bit addressing.
pub fn encode_fixed_id(
    format: AddressingFormat,
    addressing_type: AddressingType,
    target_address: u8,
    source_address: u8,
    priority: u8,
) -> Result<CanId> {
    if priority > MAX_PRIORITY {
        return Err(IsoTpError::invalid_value(
            "priority",
            format!("{} is outside 0..=7", priority),
        ));
    }
    let format_byte = format_byte(format, addressing_type)?;
    Ok(((priority as CanId) << 26)
        | ((format_byte as CanId) << 16)
        | ((target_address as CanId) << 8)
        | source_address as CanId)
}

/// Extracts addressing type, target and source address from a fixed identifier.
pub fn decode_fixed_id(format: AddressingFormat, id: CanId) -> Result<FixedIdInfo> {
    format_byte(format, AddressingType::Physical)?;
    let found = ((id >> 16) & 0xFF) as u8;
    let addressing_type = [AddressingType::Physical, AddressingType::Functional]
        .into_iter()
        .find(|&addressing_type| format_byte(format, addressing_type).ok() == Some(found));
    match addressing_type {
        Some(addressing_type) if is_extended_id(id) && id & RESERVED_BITS_MASK == 0 => {
            Ok(FixedIdInfo {
                addressing_type,
                target_address: ((id >> 8) & 0xFF) as u8,
                source_address: (id & 0xFF) as u8,
                priority: ((id >> 26) & 0x7) as u8,
            })
        }
        _ => Err(IsoTpError::invalid_value(
            "CAN ID",
            format!("{:#X} is not a {:?} identifier", id, format),
        )),
    }
}

/// Checks that `id` is usable with the given addressing format.
pub fn validate_can_id(format: AddressingFormat, id: CanId) -> Result<()> {
    match format {
        AddressingFormat::Normal11Bit | AddressingFormat::Mixed11Bit => {
            if is_standard_id(id) {
                Ok(())
            } else {
                Err(IsoTpError::invalid_value(
                    "CAN ID",
                    format!("{:#X} is not an 11-bit identifier", id),
                ))
            }
        }
        AddressingFormat::Extended => {
            if is_extended_id(id) {
                Ok(())
            } else {
                Err(IsoTpError::invalid_value(
                    "CAN ID",
                    format!("{:#X} exceeds 29 bits", id),
                ))
            }
        }
        AddressingFormat::NormalFixed | AddressingFormat::Mixed29Bit => {
            decode_fixed_id(format, id).map(|_| ())
        }
    }
}
