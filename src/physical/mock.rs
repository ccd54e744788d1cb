use std::collections::VecDeque;

use super::PhysicalLayer;
use crate::error::{IsoTpError, Result};
use crate::types::Frame;

/// Mock frame handler: called with every sent frame, returns the frames to queue in reply
pub type MockFrameHandler = Box<dyn FnMut(&Frame) -> Vec<Frame> + Send>;

/// Mock physical layer for testing
pub struct MockPhysical {
    frame_handler: Option<MockFrameHandler>,
    inbox: VecDeque<Frame>,
    sent: Vec<Frame>,
}

impl MockPhysical {
    /// Creates a mock that replies to every sent frame through `handler`
    pub fn new<F>(handler: F) -> Self
    where
        F: FnMut(&Frame) -> Vec<Frame> + Send + 'static,
    {
        Self {
            frame_handler: Some(Box::new(handler)),
            inbox: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Creates a mock that never replies
    pub fn silent() -> Self {
        Self {
            frame_handler: None,
            inbox: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Queues frames to be returned by `receive_frame`
    pub fn queue_frames(&mut self, frames: impl IntoIterator<Item = Frame>) {
        self.inbox.extend(frames);
    }

    /// Frames sent so far, oldest first
    pub fn sent_frames(&self) -> &[Frame] {
        &self.sent
    }

    pub fn set_frame_handler(&mut self, handler: Option<MockFrameHandler>) {
        self.frame_handler = handler;
    }
}

impl PhysicalLayer for MockPhysical {
    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.sent.push(frame.clone());
        if let Some(handler) = self.frame_handler.as_mut() {
            let replies = handler(frame);
            self.inbox.extend(replies);
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Frame> {
        self.inbox
            .pop_front()
            .ok_or_else(|| IsoTpError::Channel("no frame queued".to_string()))
    }
}
