use crate::error::{IsoTpError, Result};

/// CAN ID type
pub type CanId = u32;

/// Generic frame data type
pub type FrameData = Vec<u8>;

/// Raw CAN frame exchanged with the physical layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: CanId,
    pub data: FrameData,
    pub is_extended: bool,
    pub is_fd: bool,
}

impl Frame {
    /// Builds a frame, flagging 29-bit identifiers and frames longer than classic CAN.
    pub fn new(id: CanId, data: FrameData) -> Self {
        Self {
            id,
            is_extended: id > crate::data_link::can_id::MAX_STANDARD_ID,
            is_fd: data.len() > crate::data_link::dlc::CLASSIC_CAN_FRAME_LENGTH,
            data,
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            id: 0,
            data: Vec::new(),
            is_extended: false,
            is_fd: false,
        }
    }
}

/// Addressing type of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressingType {
    /// 1-to-1 communication
    #[default]
    Physical,
    /// 1-to-n communication
    Functional,
}

/// Logical diagnostic message carried by a packet sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Vec<u8>,
    addressing_type: AddressingType,
}

impl Message {
    /// Creates a message; the payload must not be empty.
    pub fn new(payload: impl Into<Vec<u8>>, addressing_type: AddressingType) -> Result<Self> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(IsoTpError::invalid_value(
                "message payload",
                "payload must contain at least one byte",
            ));
        }
        Ok(Self {
            payload,
            addressing_type,
        })
    }

    /// Shorthand for a physically addressed message.
    pub fn physical(payload: impl Into<Vec<u8>>) -> Result<Self> {
        Self::new(payload, AddressingType::Physical)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn addressing_type(&self) -> AddressingType {
        self.addressing_type
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Configuration trait that must be implemented by all protocol configurations
pub trait Config: Send + Sync {
    fn validate(&self) -> Result<()>;
}
