//! Network address information (N_AI) for the ISO-TP addressing formats.

use bitflags::bitflags;
use tracing::warn;

use crate::data_link::can_id::{self, DEFAULT_PRIORITY};
use crate::error::{IsoTpError, Result};
use crate::types::{AddressingType, CanId, Config};

/// ISO-TP addressing format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingFormat {
    /// 11-bit CAN ID, no address byte in frame data
    Normal11Bit,
    /// 29-bit CAN ID carrying target and source address
    NormalFixed,
    /// Target address in the first data byte
    Extended,
    /// 11-bit CAN ID, address extension in the first data byte
    Mixed11Bit,
    /// 29-bit CAN ID carrying target and source address, address extension in the first data byte
    Mixed29Bit,
}

bitflags! {
    /// Address components an addressing format makes use of
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AddressComponents: u8 {
        const TARGET_ADDRESS = 1 << 0;
        const SOURCE_ADDRESS = 1 << 1;
        const ADDRESS_EXTENSION = 1 << 2;
    }
}

impl AddressingFormat {
    pub const ALL: [AddressingFormat; 5] = [
        AddressingFormat::Normal11Bit,
        AddressingFormat::NormalFixed,
        AddressingFormat::Extended,
        AddressingFormat::Mixed11Bit,
        AddressingFormat::Mixed29Bit,
    ];

    /// Number of address information bytes preceding the N_PCI in frame data.
    pub fn address_info_byte_count(self) -> usize {
        match self {
            AddressingFormat::Normal11Bit | AddressingFormat::NormalFixed => 0,
            AddressingFormat::Extended
            | AddressingFormat::Mixed11Bit
            | AddressingFormat::Mixed29Bit => 1,
        }
    }

    /// Components carried in frame data.
    pub fn data_components(self) -> AddressComponents {
        match self {
            AddressingFormat::Normal11Bit | AddressingFormat::NormalFixed => {
                AddressComponents::empty()
            }
            AddressingFormat::Extended => AddressComponents::TARGET_ADDRESS,
            AddressingFormat::Mixed11Bit | AddressingFormat::Mixed29Bit => {
                AddressComponents::ADDRESS_EXTENSION
            }
        }
    }

    /// Components carried in the CAN identifier.
    pub fn identifier_components(self) -> AddressComponents {
        match self {
            AddressingFormat::NormalFixed | AddressingFormat::Mixed29Bit => {
                AddressComponents::TARGET_ADDRESS | AddressComponents::SOURCE_ADDRESS
            }
            _ => AddressComponents::empty(),
        }
    }

    /// True when the CAN identifier is built from target and source address.
    pub fn uses_fixed_id(self) -> bool {
        !self.identifier_components().is_empty()
    }
}

/// Address information read from the start of frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressInfo {
    pub target_address: Option<u8>,
    pub address_extension: Option<u8>,
}

fn supplied_components(
    target_address: Option<u8>,
    source_address: Option<u8>,
    address_extension: Option<u8>,
) -> AddressComponents {
    let mut supplied = AddressComponents::empty();
    supplied.set(AddressComponents::TARGET_ADDRESS, target_address.is_some());
    supplied.set(AddressComponents::SOURCE_ADDRESS, source_address.is_some());
    supplied.set(
        AddressComponents::ADDRESS_EXTENSION,
        address_extension.is_some(),
    );
    supplied
}

/// Builds the address information bytes placed before the N_PCI.
///
/// Components the format needs in frame data must be supplied. Components the format
/// has no place for are ignored with a warning.
pub fn encode_address_info(
    format: AddressingFormat,
    target_address: Option<u8>,
    source_address: Option<u8>,
    address_extension: Option<u8>,
) -> Result<Vec<u8>> {
    let supplied = supplied_components(target_address, source_address, address_extension);
    let missing = format.data_components() - supplied;
    if !missing.is_empty() {
        return Err(IsoTpError::inconsistent(format!(
            "{:?} addressing requires {:?}",
            format, missing
        )));
    }
    let ignored = supplied - (format.data_components() | format.identifier_components());
    if !ignored.is_empty() {
        warn!(?format, ?ignored, "Address components not used by addressing format");
    }
    let ai = match format {
        AddressingFormat::Normal11Bit | AddressingFormat::NormalFixed => Vec::new(),
        AddressingFormat::Extended => target_address.into_iter().collect(),
        AddressingFormat::Mixed11Bit | AddressingFormat::Mixed29Bit => {
            address_extension.into_iter().collect()
        }
    };
    Ok(ai)
}

/// Reads the address information bytes from raw frame data.
pub fn decode_address_info(format: AddressingFormat, data: &[u8]) -> Result<AddressInfo> {
    let count = format.address_info_byte_count();
    if data.len() < count {
        return Err(IsoTpError::inconsistent(format!(
            "{:?} addressing needs {} address byte(s), frame has {}",
            format,
            count,
            data.len()
        )));
    }
    let info = match format {
        AddressingFormat::Normal11Bit | AddressingFormat::NormalFixed => AddressInfo::default(),
        AddressingFormat::Extended => AddressInfo {
            target_address: Some(data[0]),
            address_extension: None,
        },
        AddressingFormat::Mixed11Bit | AddressingFormat::Mixed29Bit => AddressInfo {
            target_address: None,
            address_extension: Some(data[0]),
        },
    };
    Ok(info)
}

/// Complete addressing of one packet: format, addressing type, CAN ID and N_AI values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketAddress {
    pub addressing_format: AddressingFormat,
    pub addressing_type: AddressingType,
    pub can_id: CanId,
    pub target_address: Option<u8>,
    pub source_address: Option<u8>,
    pub address_extension: Option<u8>,
}

impl PacketAddress {
    /// Normal 11-bit addressing.
    pub fn normal_11bit(addressing_type: AddressingType, can_id: CanId) -> Self {
        Self {
            addressing_format: AddressingFormat::Normal11Bit,
            addressing_type,
            can_id,
            target_address: None,
            source_address: None,
            address_extension: None,
        }
    }

    /// Normal fixed addressing; the CAN ID is derived from the addresses.
    pub fn normal_fixed(
        addressing_type: AddressingType,
        target_address: u8,
        source_address: u8,
    ) -> Result<Self> {
        let can_id = can_id::encode_fixed_id(
            AddressingFormat::NormalFixed,
            addressing_type,
            target_address,
            source_address,
            DEFAULT_PRIORITY,
        )?;
        Ok(Self {
            addressing_format: AddressingFormat::NormalFixed,
            addressing_type,
            can_id,
            target_address: Some(target_address),
            source_address: Some(source_address),
            address_extension: None,
        })
    }

    /// Extended addressing.
    pub fn extended(addressing_type: AddressingType, can_id: CanId, target_address: u8) -> Self {
        Self {
            addressing_format: AddressingFormat::Extended,
            addressing_type,
            can_id,
            target_address: Some(target_address),
            source_address: None,
            address_extension: None,
        }
    }

    /// Mixed 11-bit addressing.
    pub fn mixed_11bit(
        addressing_type: AddressingType,
        can_id: CanId,
        address_extension: u8,
    ) -> Self {
        Self {
            addressing_format: AddressingFormat::Mixed11Bit,
            addressing_type,
            can_id,
            target_address: None,
            source_address: None,
            address_extension: Some(address_extension),
        }
    }

    /// Mixed 29-bit addressing; the CAN ID is derived from the addresses.
    pub fn mixed_29bit(
        addressing_type: AddressingType,
        target_address: u8,
        source_address: u8,
        address_extension: u8,
    ) -> Result<Self> {
        let can_id = can_id::encode_fixed_id(
            AddressingFormat::Mixed29Bit,
            addressing_type,
            target_address,
            source_address,
            DEFAULT_PRIORITY,
        )?;
        Ok(Self {
            addressing_format: AddressingFormat::Mixed29Bit,
            addressing_type,
            can_id,
            target_address: Some(target_address),
            source_address: Some(source_address),
            address_extension: Some(address_extension),
        })
    }

    /// Recovers the address of a received frame from its identifier and data.
    ///
    /// For fixed-identifier formats the addressing type comes from the identifier and
    /// `addressing_type` is ignored.
    pub fn from_frame(
        addressing_format: AddressingFormat,
        addressing_type: AddressingType,
        can_id: CanId,
        data: &[u8],
    ) -> Result<Self> {
        let info = decode_address_info(addressing_format, data)?;
        let mut address = Self {
            addressing_format,
            addressing_type,
            can_id,
            target_address: info.target_address,
            source_address: None,
            address_extension: info.address_extension,
        };
        if addressing_format.uses_fixed_id() {
            let fixed = can_id::decode_fixed_id(addressing_format, can_id)?;
            address.addressing_type = fixed.addressing_type;
            address.target_address = Some(fixed.target_address);
            address.source_address = Some(fixed.source_address);
        } else {
            can_id::validate_can_id(addressing_format, can_id)?;
        }
        Ok(address)
    }

    pub fn address_info_byte_count(&self) -> usize {
        self.addressing_format.address_info_byte_count()
    }

    /// Address information bytes for frames sent with this address.
    pub fn address_info(&self) -> Result<Vec<u8>> {
        encode_address_info(
            self.addressing_format,
            self.target_address,
            self.source_address,
            self.address_extension,
        )
    }
}

impl Config for PacketAddress {
    fn validate(&self) -> Result<()> {
        self.address_info()?;
        can_id::validate_can_id(self.addressing_format, self.can_id)?;
        if self.addressing_format.uses_fixed_id() {
            let fixed = can_id::decode_fixed_id(self.addressing_format, self.can_id)?;
            if fixed.addressing_type != self.addressing_type {
                return Err(IsoTpError::inconsistent(format!(
                    "CAN ID {:#X} is {:?}, address is {:?}",
                    self.can_id, fixed.addressing_type, self.addressing_type
                )));
            }
            let agrees =
                |supplied: Option<u8>, carried: u8| supplied.map_or(true, |v| v == carried);
            if !agrees(self.target_address, fixed.target_address)
                || !agrees(self.source_address, fixed.source_address)
            {
                return Err(IsoTpError::inconsistent(format!(
                    "target/source address disagree with CAN ID {:#X}",
                    self.can_id
                )));
            }
        }
        Ok(())
    }
}
