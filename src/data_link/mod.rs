//! Data link layer helpers: frame length codes and CAN identifiers.
//!
//! Nothing here touches a bus. These are the pure tables the packet codecs use to
//! size frames and to place addressing information inside 29-bit identifiers.

pub mod can_id;
pub mod dlc;

pub use can_id::{decode_fixed_id, encode_fixed_id, validate_can_id, FixedIdInfo};
pub use dlc::{decode_dlc, encode_dlc, is_frame_length, min_dlc};
