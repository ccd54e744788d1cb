//! ISO 15765-2 (ISO-TP) packet codec and segmentation engine for CAN and CAN FD.
//!
//! ```
//! use libisotp::{CanSegmenter, Message, SegmenterConfig};
//!
//! let segmenter = CanSegmenter::new(SegmenterConfig::default()).unwrap();
//! let message = Message::physical((0..20).collect::<Vec<u8>>()).unwrap();
//! let packets = segmenter.segmentation(&message).unwrap();
//! assert_eq!(packets.len(), 3);
//! assert_eq!(segmenter.desegmentation(&packets).unwrap(), message);
//! ```

// OSI Layer modules
pub mod data_link; // DLC table, CAN identifiers
pub mod network; // N_AI addressing
pub mod physical; // Raw frame channel
pub mod transport; // ISO-TP codecs, segmentation, driver

// Common types and traits
pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use error::{IsoTpError, Result, SegmentationError};
pub use network::{AddressingFormat, PacketAddress};
pub use transport::{
    CanPacket, CanSegmenter, FlowControlParameters, FlowControlParametersGenerator, FlowStatus,
    IsoTp, IsoTpConfig, PacketKind, SegmenterConfig, TransportLayer,
};
pub use types::{AddressingType, Frame, Message};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
