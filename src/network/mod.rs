//! Network layer addressing.
//!
//! ISO 15765-2 names the addressing fields network address information (N_AI). Depending
//! on the addressing format they travel in the CAN identifier, in the first data byte of
//! every frame, or both.

pub mod addressing;

pub use addressing::{
    decode_address_info, encode_address_info, AddressComponents, AddressInfo, AddressingFormat,
    PacketAddress,
};
