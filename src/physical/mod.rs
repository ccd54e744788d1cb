//! Physical layer seam.
//!
//! The transport driver only needs a channel that sends and receives raw CAN frames.
//! Bus drivers, socket bindings and timing live behind [`PhysicalLayer`]; the crate ships
//! a scripted [`mock`] implementation for tests.

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use crate::error::Result;
use crate::types::Frame;

/// Raw frame channel implemented by CAN and CAN FD drivers
pub trait PhysicalLayer: Send {
    fn send_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Blocks until the next frame is available.
    fn receive_frame(&mut self) -> Result<Frame>;
}
