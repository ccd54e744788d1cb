//! Flow Control (FC) codec.
//!
//! The low nibble of the N_PCI byte carries the flow status. ContinueToSend and Wait
//! frames are followed by block size and STmin bytes; Overflow frames carry neither.

use crate::data_link::dlc::validate_frame_length;
use crate::error::{IsoTpError, Result};
use crate::network::{AddressingFormat, PacketAddress};

use super::{expect_kind, pad_frame, packet_kind, resolve_frame_length, PacketKind};

const PCI_LENGTH: usize = 1;
const PARAMETERS_LENGTH: usize = 2;

/// Flow status sent by the receiver of a segmented message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowStatus {
    ContinueToSend = 0x0,
    Wait = 0x1,
    Overflow = 0x2,
}

impl FlowStatus {
    pub fn nibble(self) -> u8 {
        self as u8
    }

    pub fn from_nibble(nibble: u8) -> Result<Self> {
        match nibble {
            0x0 => Ok(FlowStatus::ContinueToSend),
            0x1 => Ok(FlowStatus::Wait),
            0x2 => Ok(FlowStatus::Overflow),
            _ => Err(IsoTpError::invalid_value(
                "flow status",
                format!("{:#X} is reserved", nibble),
            )),
        }
    }

    /// True when block size and STmin follow the N_PCI byte.
    pub fn carries_parameters(self) -> bool {
        !matches!(self, FlowStatus::Overflow)
    }
}

pub fn is_flow_control(format: AddressingFormat, data: &[u8]) -> bool {
    matches!(packet_kind(format, data), Ok(PacketKind::FlowControl))
}

/// Shortest frame able to carry a Flow Control with this status.
pub fn min_frame_length(format: AddressingFormat, flow_status: FlowStatus) -> usize {
    let parameters = if flow_status.carries_parameters() {
        PARAMETERS_LENGTH
    } else {
        0
    };
    format.address_info_byte_count() + PCI_LENGTH + parameters
}

/// Builds Flow Control data.
///
/// ContinueToSend needs both block size and STmin. Overflow must not be given either.
/// Wait frames write missing values as `filler_byte`.
pub fn build(
    address: &PacketAddress,
    flow_status: FlowStatus,
    block_size: Option<u8>,
    st_min: Option<u8>,
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    match flow_status {
        FlowStatus::ContinueToSend if block_size.is_none() || st_min.is_none() => {
            return Err(IsoTpError::inconsistent(
                "ContinueToSend requires block size and STmin",
            ));
        }
        FlowStatus::Overflow if block_size.is_some() || st_min.is_some() => {
            return Err(IsoTpError::inconsistent(
                "Overflow carries neither block size nor STmin",
            ));
        }
        _ => {}
    }
    encode(address, flow_status, block_size, st_min, dlc, filler_byte)
}

/// Like [`build`] without the parameter presence checks; values supplied with Overflow
/// are written after the N_PCI byte.
pub fn build_lenient(
    address: &PacketAddress,
    flow_status: FlowStatus,
    block_size: Option<u8>,
    st_min: Option<u8>,
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    encode(address, flow_status, block_size, st_min, dlc, filler_byte)
}

fn encode(
    address: &PacketAddress,
    flow_status: FlowStatus,
    block_size: Option<u8>,
    st_min: Option<u8>,
    dlc: Option<u8>,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    let mut frame = address.address_info()?;
    let with_parameters =
        flow_status.carries_parameters() || block_size.is_some() || st_min.is_some();
    let parameters = if with_parameters { PARAMETERS_LENGTH } else { 0 };
    let frame_length = resolve_frame_length(dlc, frame.len() + PCI_LENGTH + parameters)?;
    frame.push((PacketKind::FlowControl.nibble() << 4) | flow_status.nibble());
    if with_parameters {
        frame.push(block_size.unwrap_or(filler_byte));
        frame.push(st_min.unwrap_or(filler_byte));
    }
    pad_frame(&mut frame, frame_length, filler_byte);
    Ok(frame)
}

fn checked_status(format: AddressingFormat, data: &[u8]) -> Result<FlowStatus> {
    expect_kind(format, data, PacketKind::FlowControl)?;
    validate_frame_length(data.len())?;
    let ai = format.address_info_byte_count();
    let flow_status = FlowStatus::from_nibble(data[ai] & 0x0F)?;
    let minimum = min_frame_length(format, flow_status);
    if data.len() < minimum {
        return Err(IsoTpError::inconsistent(format!(
            "{:?} Flow Control needs {} bytes, frame has {}",
            flow_status,
            minimum,
            data.len()
        )));
    }
    Ok(flow_status)
}

/// Checks that raw frame data is a well-formed Flow Control.
pub fn validate(format: AddressingFormat, data: &[u8]) -> Result<()> {
    checked_status(format, data).map(|_| ())
}

pub fn flow_status(format: AddressingFormat, data: &[u8]) -> Result<FlowStatus> {
    checked_status(format, data)
}

/// Block size, absent for Overflow.
pub fn block_size(format: AddressingFormat, data: &[u8]) -> Result<Option<u8>> {
    parameter(format, data, 1)
}

/// Raw STmin byte, absent for Overflow.
pub fn st_min(format: AddressingFormat, data: &[u8]) -> Result<Option<u8>> {
    parameter(format, data, 2)
}

fn parameter(format: AddressingFormat, data: &[u8], position: usize) -> Result<Option<u8>> {
    let flow_status = checked_status(format, data)?;
    if !flow_status.carries_parameters() {
        return Ok(None);
    }
    Ok(Some(data[format.address_info_byte_count() + position]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DEFAULT_FILLER_BYTE;
    use crate::types::AddressingType;

    fn normal() -> PacketAddress {
        PacketAddress::normal_11bit(AddressingType::Physical, 0x7E8)
    }

    #[test]
    fn continue_to_send_layout() {
        let data = build(
            &normal(),
            FlowStatus::ContinueToSend,
            Some(0x00),
            Some(0xFF),
            Some(8),
            DEFAULT_FILLER_BYTE,
        )
        .unwrap();
        assert_eq!(data, vec![0x30, 0x00, 0xFF, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]);
        let format = AddressingFormat::Normal11Bit;
        assert_eq!(flow_status(format, &data).unwrap(), FlowStatus::ContinueToSend);
        assert_eq!(block_size(format, &data).unwrap(), Some(0x00));
        assert_eq!(st_min(format, &data).unwrap(), Some(0xFF));
    }

    #[test]
    fn overflow_is_a_single_byte() {
        let data = build(&normal(), FlowStatus::Overflow, None, None, None, 0xAA).unwrap();
        assert_eq!(data, vec![0x32]);
        assert_eq!(block_size(AddressingFormat::Normal11Bit, &data).unwrap(), None);

        let padded = build(&normal(), FlowStatus::Overflow, None, None, Some(8), 0xAA).unwrap();
        assert_eq!(padded, vec![0x32, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn overflow_with_parameters_is_inconsistent() {
        assert!(matches!(
            build(&normal(), FlowStatus::Overflow, Some(1), None, None, 0xCC),
            Err(IsoTpError::InconsistentArguments(_))
        ));
        let data =
            build_lenient(&normal(), FlowStatus::Overflow, Some(1), Some(2), None, 0xCC).unwrap();
        assert_eq!(data, vec![0x32, 0x01, 0x02]);
    }

    #[test]
    fn wait_without_parameters_uses_filler() {
        let address = PacketAddress::extended(AddressingType::Physical, 0x7E8, 0xF1);
        let data = build(&address, FlowStatus::Wait, None, None, None, 0xCC).unwrap();
        assert_eq!(data, vec![0xF1, 0x31, 0xCC, 0xCC]);
    }

    #[test]
    fn forced_dlc_must_hold_parameters() {
        assert!(build(
            &normal(),
            FlowStatus::ContinueToSend,
            Some(8),
            Some(10),
            Some(2),
            0xCC
        )
        .is_err());
        assert!(build(&normal(), FlowStatus::ContinueToSend, Some(8), None, None, 0xCC).is_err());
    }

    #[test]
    fn validate_rejects_short_and_reserved_frames() {
        let format = AddressingFormat::Normal11Bit;
        assert!(validate(format, &[0x30, 0x00]).is_err());
        assert!(validate(format, &[0x32]).is_ok());
        assert!(matches!(
            validate(format, &[0x33, 0x00, 0x00]),
            Err(IsoTpError::InvalidValue { .. })
        ));
        assert!(validate(AddressingFormat::Mixed29Bit, &[0x55, 0x31, 0x00]).is_err());
    }
}
