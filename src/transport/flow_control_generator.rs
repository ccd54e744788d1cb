//! Flow control parameters emitted by a receiver while it paces a segmented message.

use super::flow_control::FlowStatus;

/// One Flow Control response: status plus block size and raw STmin when sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControlParameters {
    pub flow_status: FlowStatus,
    pub block_size: Option<u8>,
    pub st_min: Option<u8>,
}

impl FlowControlParameters {
    pub fn continue_to_send(block_size: u8, st_min: u8) -> Self {
        Self {
            flow_status: FlowStatus::ContinueToSend,
            block_size: Some(block_size),
            st_min: Some(st_min),
        }
    }

    pub fn wait() -> Self {
        Self {
            flow_status: FlowStatus::Wait,
            block_size: None,
            st_min: None,
        }
    }
}

/// Configuration of the Flow Control responses for one reception.
///
/// - `wait_count = 0`: every response is ContinueToSend.
/// - `wait_count > 0`, `repeat_wait = false`: `wait_count` Wait responses, then
///   ContinueToSend from there on.
/// - `wait_count > 0`, `repeat_wait = true`: `wait_count` Wait responses before every
///   ContinueToSend.
///
/// The generator itself never changes; each call to [`iter`](Self::iter) starts an
/// independent sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowControlParametersGenerator {
    pub block_size: u8,
    pub st_min: u8,
    pub wait_count: u8,
    pub repeat_wait: bool,
}

impl FlowControlParametersGenerator {
    pub fn new(block_size: u8, st_min: u8, wait_count: u8, repeat_wait: bool) -> Self {
        Self {
            block_size,
            st_min,
            wait_count,
            repeat_wait,
        }
    }

    /// Starts a fresh, endless sequence of responses.
    pub fn iter(&self) -> FlowControlParametersIter {
        FlowControlParametersIter {
            config: *self,
            remaining_wait: self.wait_count,
        }
    }
}

impl IntoIterator for &FlowControlParametersGenerator {
    type Item = FlowControlParameters;
    type IntoIter = FlowControlParametersIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Running state of one reception's Flow Control responses
#[derive(Debug, Clone)]
pub struct FlowControlParametersIter {
    config: FlowControlParametersGenerator,
    remaining_wait: u8,
}

impl Iterator for FlowControlParametersIter {
    type Item = FlowControlParameters;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining_wait > 0 {
            self.remaining_wait -= 1;
            return Some(FlowControlParameters::wait());
        }
        if self.config.repeat_wait {
            self.remaining_wait = self.config.wait_count;
        }
        Some(FlowControlParameters::continue_to_send(
            self.config.block_size,
            self.config.st_min,
        ))
    }
}
