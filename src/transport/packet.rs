//! CAN packet value type.
//!
//! A [`CanPacket`] is one validated ISO-TP frame together with the address it was sent
//! with or received on. Packets are immutable: they are created through the strict
//! per-kind constructors or parsed from a raw [`Frame`].

use std::time::Duration;

use crate::data_link::dlc::encode_dlc;
use crate::error::Result;
use crate::network::{AddressingFormat, PacketAddress};
use crate::types::{AddressingType, CanId, Frame};

use super::{
    consecutive_frame, first_frame, flow_control, packet_kind, single_frame, st_min,
    FlowStatus, PacketKind,
};

/// Validated ISO-TP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanPacket {
    address: PacketAddress,
    kind: PacketKind,
    dlc: u8,
    data: Vec<u8>,
}

impl CanPacket {
    fn assemble(address: PacketAddress, kind: PacketKind, data: Vec<u8>) -> Result<Self> {
        let dlc = encode_dlc(data.len())?;
        Ok(Self {
            address,
            kind,
            dlc,
            data,
        })
    }

    /// Single Frame carrying `payload`; without a DLC the shortest frame is used.
    pub fn single_frame(
        address: PacketAddress,
        payload: &[u8],
        dlc: Option<u8>,
        filler_byte: u8,
    ) -> Result<Self> {
        let data = single_frame::build(&address, payload, dlc, filler_byte)?;
        Self::assemble(address, PacketKind::SingleFrame, data)
    }

    /// First Frame declaring `ff_dl` bytes; `payload` must fill the frame exactly.
    pub fn first_frame(
        address: PacketAddress,
        ff_dl: u32,
        payload: &[u8],
        dlc: Option<u8>,
        force_long_form: bool,
    ) -> Result<Self> {
        let data = first_frame::build(&address, ff_dl, payload, dlc, force_long_form)?;
        Self::assemble(address, PacketKind::FirstFrame, data)
    }

    pub fn consecutive_frame(
        address: PacketAddress,
        sequence_number: u8,
        payload: &[u8],
        dlc: Option<u8>,
        filler_byte: u8,
    ) -> Result<Self> {
        let data =
            consecutive_frame::build(&address, sequence_number, payload, dlc, filler_byte)?;
        Self::assemble(address, PacketKind::ConsecutiveFrame, data)
    }

    pub fn flow_control(
        address: PacketAddress,
        flow_status: FlowStatus,
        block_size: Option<u8>,
        st_min: Option<u8>,
        dlc: Option<u8>,
        filler_byte: u8,
    ) -> Result<Self> {
        let data = flow_control::build(
            &address,
            flow_status,
            block_size,
            st_min,
            dlc,
            filler_byte,
        )?;
        Self::assemble(address, PacketKind::FlowControl, data)
    }

    /// Parses and validates a received frame.
    ///
    /// `addressing_type` is only used for formats whose identifier does not encode it.
    pub fn from_frame(
        addressing_format: AddressingFormat,
        addressing_type: AddressingType,
        frame: &Frame,
    ) -> Result<Self> {
        let address =
            PacketAddress::from_frame(addressing_format, addressing_type, frame.id, &frame.data)?;
        let kind = packet_kind(addressing_format, &frame.data)?;
        match kind {
            PacketKind::SingleFrame => single_frame::validate(addressing_format, &frame.data)?,
            PacketKind::FirstFrame => first_frame::validate(addressing_format, &frame.data)?,
            PacketKind::ConsecutiveFrame => {
                consecutive_frame::validate(addressing_format, &frame.data)?
            }
            PacketKind::FlowControl => flow_control::validate(addressing_format, &frame.data)?,
        }
        Self::assemble(address, kind, frame.data.clone())
    }

    pub fn address(&self) -> &PacketAddress {
        &self.address
    }

    pub fn addressing_format(&self) -> AddressingFormat {
        self.address.addressing_format
    }

    pub fn addressing_type(&self) -> AddressingType {
        self.address.addressing_type
    }

    pub fn can_id(&self) -> CanId {
        self.address.can_id
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Complete frame data, address information and padding included.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    pub fn frame_length(&self) -> usize {
        self.data.len()
    }

    /// Payload bytes; padding is only stripped from Single Frames.
    pub fn payload(&self) -> Option<&[u8]> {
        let format = self.addressing_format();
        match self.kind {
            PacketKind::SingleFrame => single_frame::payload(format, &self.data).ok(),
            PacketKind::FirstFrame => first_frame::payload(format, &self.data).ok(),
            PacketKind::ConsecutiveFrame => consecutive_frame::payload(format, &self.data).ok(),
            PacketKind::FlowControl => None,
        }
    }

    /// SF_DL of a Single Frame or FF_DL of a First Frame.
    pub fn data_length(&self) -> Option<usize> {
        let format = self.addressing_format();
        match self.kind {
            PacketKind::SingleFrame => single_frame::data_length(format, &self.data).ok(),
            PacketKind::FirstFrame => first_frame::data_length(format, &self.data)
                .ok()
                .map(|ff_dl| ff_dl as usize),
            _ => None,
        }
    }

    pub fn sequence_number(&self) -> Option<u8> {
        match self.kind {
            PacketKind::ConsecutiveFrame => {
                consecutive_frame::sequence_number(self.addressing_format(), &self.data).ok()
            }
            _ => None,
        }
    }

    pub fn flow_status(&self) -> Option<FlowStatus> {
        match self.kind {
            PacketKind::FlowControl => {
                flow_control::flow_status(self.addressing_format(), &self.data).ok()
            }
            _ => None,
        }
    }

    pub fn block_size(&self) -> Option<u8> {
        match self.kind {
            PacketKind::FlowControl => {
                flow_control::block_size(self.addressing_format(), &self.data).ok().flatten()
            }
            _ => None,
        }
    }

    /// Raw STmin byte of a Flow Control packet.
    pub fn st_min(&self) -> Option<u8> {
        match self.kind {
            PacketKind::FlowControl => {
                flow_control::st_min(self.addressing_format(), &self.data).ok().flatten()
            }
            _ => None,
        }
    }

    /// STmin of a Flow Control packet as a separation time.
    pub fn st_min_time(&self) -> Option<Duration> {
        self.st_min().map(st_min::to_time)
    }

    pub fn target_address(&self) -> Option<u8> {
        self.address.target_address
    }

    pub fn source_address(&self) -> Option<u8> {
        self.address.source_address
    }

    pub fn address_extension(&self) -> Option<u8> {
        self.address.address_extension
    }

    /// Raw frame for the physical layer.
    pub fn to_frame(&self) -> Frame {
        Frame::new(self.address.can_id, self.data.clone())
    }
}
