//! ISO-TP driver over a raw frame channel.
//!
//! [`IsoTp`] wires a [`CanSegmenter`] to a [`PhysicalLayer`]: outgoing messages are
//! segmented and released block by block as Flow Control allows, incoming packets are
//! paced with generated Flow Control responses and desegmented. The driver measures no
//! time; STmin and timeouts are left to the physical layer.

use tracing::{debug, trace, warn};

use super::{
    CanPacket, CanSegmenter, FlowControlParameters, FlowControlParametersGenerator, FlowStatus,
    PacketKind, SegmenterConfig, TransportLayer,
};
use crate::error::{IsoTpError, Result};
use crate::network::{decode_address_info, AddressComponents, AddressInfo, PacketAddress};
use crate::physical::PhysicalLayer;
use crate::types::{AddressingType, Config, Message};

/// Default number of Wait responses tolerated per Flow Control exchange.
pub const DEFAULT_WFT_MAX: u8 = 10;
/// Default largest message accepted by `receive`.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 0xFFF;

/// ISO-TP driver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoTpConfig {
    /// Addresses and frame layout used for transmission.
    pub segmenter: SegmenterConfig,
    /// Address of incoming frames; frames with other identifiers are ignored.
    pub rx_address: PacketAddress,
    /// Flow Control responses sent while receiving.
    pub flow_control: FlowControlParametersGenerator,
    /// Wait responses tolerated before a transmission is abandoned.
    pub wft_max: u8,
    /// Largest FF_DL accepted; larger messages are refused with Overflow.
    pub max_payload_len: usize,
}

impl Default for IsoTpConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            rx_address: PacketAddress::normal_11bit(AddressingType::Physical, 0x7E8),
            flow_control: FlowControlParametersGenerator::default(),
            wft_max: DEFAULT_WFT_MAX,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

impl Config for IsoTpConfig {
    fn validate(&self) -> Result<()> {
        self.segmenter.validate()?;
        self.rx_address.validate()?;
        if self.rx_address.addressing_format != self.segmenter.addressing_format() {
            return Err(IsoTpError::inconsistent(format!(
                "receive address uses {:?}, transmit addresses use {:?}",
                self.rx_address.addressing_format,
                self.segmenter.addressing_format()
            )));
        }
        if self.max_payload_len == 0 {
            return Err(IsoTpError::invalid_value(
                "max_payload_len",
                "must accept at least one byte",
            ));
        }
        Ok(())
    }
}

/// ISO-TP implementation
pub struct IsoTp<P: PhysicalLayer> {
    config: IsoTpConfig,
    segmenter: CanSegmenter,
    physical: P,
    is_open: bool,
}

impl<P: PhysicalLayer> IsoTp<P> {
    /// Creates a new ISO-TP instance with the given physical layer
    pub fn with_physical(config: IsoTpConfig, physical: P) -> Result<Self> {
        config.validate()?;
        let segmenter = CanSegmenter::new(config.segmenter.clone())?;
        Ok(Self {
            config,
            segmenter,
            physical,
            is_open: false,
        })
    }

    pub fn config(&self) -> &IsoTpConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn physical(&self) -> &P {
        &self.physical
    }

    pub fn physical_mut(&mut self) -> &mut P {
        &mut self.physical
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.is_open {
            return Err(IsoTpError::NotOpen);
        }
        Ok(())
    }

    fn write_packet(&mut self, packet: &CanPacket) -> Result<()> {
        trace!(
            id = packet.can_id(),
            kind = ?packet.kind(),
            len = packet.frame_length(),
            "TX"
        );
        self.physical.send_frame(&packet.to_frame())
    }

    /// Next packet addressed to us; frames on other identifiers are dropped.
    fn read_packet(&mut self) -> Result<CanPacket> {
        let rx = self.config.rx_address;
        loop {
            let frame = self.physical.receive_frame()?;
            if frame.id != rx.can_id {
                trace!(id = frame.id, "Ignoring frame for another identifier");
                continue;
            }
            let info = decode_address_info(rx.addressing_format, &frame.data)?;
            if !accepts_address_info(&rx, &info) {
                trace!(
                    id = frame.id,
                    target_address = ?info.target_address,
                    address_extension = ?info.address_extension,
                    "Ignoring frame for another address"
                );
                continue;
            }
            let packet = CanPacket::from_frame(rx.addressing_format, rx.addressing_type, &frame)?;
            trace!(id = frame.id, kind = ?packet.kind(), len = frame.data.len(), "RX");
            return Ok(packet);
        }
    }

    /// Waits for a ContinueToSend and returns its block size.
    fn await_clear_to_send(&mut self) -> Result<u8> {
        let mut waits = 0u8;
        loop {
            let packet = self.read_packet()?;
            match packet.flow_status() {
                Some(FlowStatus::ContinueToSend) => {
                    let block_size = packet.block_size().unwrap_or(0);
                    debug!(
                        block_size,
                        st_min = ?packet.st_min_time(),
                        "Flow control: continue to send"
                    );
                    return Ok(block_size);
                }
                Some(FlowStatus::Wait) => {
                    waits = waits.saturating_add(1);
                    if waits > self.config.wft_max {
                        warn!(limit = self.config.wft_max, "Too many flow control waits");
                        return Err(IsoTpError::WaitLimitExceeded {
                            limit: self.config.wft_max,
                        });
                    }
                    debug!(waits, "Flow control: wait");
                }
                Some(FlowStatus::Overflow) => {
                    warn!("Receiver reported overflow");
                    return Err(IsoTpError::Overflow);
                }
                None => {
                    return Err(IsoTpError::UnexpectedPacket {
                        kind: packet.kind(),
                    })
                }
            }
        }
    }

    fn send_flow_control(&mut self, parameters: FlowControlParameters) -> Result<()> {
        let segmenter = self.segmenter.config();
        let dlc = if segmenter.use_data_optimization {
            None
        } else {
            Some(segmenter.dlc)
        };
        let packet = CanPacket::flow_control(
            segmenter.physical,
            parameters.flow_status,
            parameters.block_size,
            parameters.st_min,
            dlc,
            segmenter.filler_byte,
        )?;
        self.write_packet(&packet)
    }

    fn send_packets(&mut self, packets: Vec<CanPacket>) -> Result<()> {
        let mut packets = packets.into_iter();
        let Some(first) = packets.next() else {
            return Ok(());
        };
        self.write_packet(&first)?;
        if first.kind() == PacketKind::SingleFrame {
            return Ok(());
        }

        let mut remaining = packets.len();
        while remaining > 0 {
            let block_size = self.await_clear_to_send()?;
            let block = if block_size == 0 {
                remaining
            } else {
                remaining.min(block_size as usize)
            };
            for packet in packets.by_ref().take(block) {
                self.write_packet(&packet)?;
            }
            remaining -= block;
        }
        Ok(())
    }

    fn receive_packets(&mut self) -> Result<Vec<CanPacket>> {
        let first = self.read_packet()?;
        match first.kind() {
            PacketKind::SingleFrame => return Ok(vec![first]),
            PacketKind::FirstFrame => {}
            kind => return Err(IsoTpError::UnexpectedPacket { kind }),
        }

        let ff_dl = first.data_length().unwrap_or_default();
        if ff_dl > self.config.max_payload_len {
            warn!(
                ff_dl,
                max = self.config.max_payload_len,
                "Refusing oversized message"
            );
            self.send_flow_control(FlowControlParameters {
                flow_status: FlowStatus::Overflow,
                block_size: None,
                st_min: None,
            })?;
            return Err(IsoTpError::Overflow);
        }

        let required = self.segmenter.consecutive_packets_number(&first)?;
        debug!(ff_dl, consecutive = required, "Receiving segmented message");
        let mut packets = Vec::with_capacity(required + 1);
        packets.push(first);
        let mut flow_control = self.config.flow_control.iter();
        while packets.len() <= required {
            let mut block_size = 0;
            for parameters in flow_control.by_ref() {
                self.send_flow_control(parameters)?;
                if parameters.flow_status == FlowStatus::ContinueToSend {
                    block_size = parameters.block_size.unwrap_or(0);
                    break;
                }
            }
            let outstanding = required + 1 - packets.len();
            let block = if block_size == 0 {
                outstanding
            } else {
                outstanding.min(block_size as usize)
            };
            for _ in 0..block {
                let packet = self.read_packet()?;
                if packet.kind() != PacketKind::ConsecutiveFrame {
                    return Err(IsoTpError::UnexpectedPacket {
                        kind: packet.kind(),
                    });
                }
                packets.push(packet);
            }
        }
        Ok(packets)
    }
}

/// True when the address bytes in frame data match the receive address.
fn accepts_address_info(rx: &PacketAddress, info: &AddressInfo) -> bool {
    let components = rx.addressing_format.data_components();
    (!components.contains(AddressComponents::TARGET_ADDRESS)
        || info.target_address == rx.target_address)
        && (!components.contains(AddressComponents::ADDRESS_EXTENSION)
            || info.address_extension == rx.address_extension)
}

impl<P: PhysicalLayer> TransportLayer for IsoTp<P> {
    fn open(&mut self) -> Result<()> {
        self.is_open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.is_open = false;
        Ok(())
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        self.ensure_open()?;
        let packets = self.segmenter.segmentation(message)?;
        debug!(
            len = message.payload().len(),
            packets = packets.len(),
            "Sending message"
        );
        self.send_packets(packets)
    }

    fn receive(&mut self) -> Result<Message> {
        self.ensure_open()?;
        let packets = self.receive_packets()?;
        let message = self.segmenter.desegmentation(&packets)?;
        debug!(len = message.payload().len(), "Message received");
        Ok(message)
    }
}
