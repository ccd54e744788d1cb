//! Segmentation of diagnostic messages into CAN packets and back.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::data_link::dlc::{MAX_DLC, MIN_BASE_DLC};
use crate::error::{IsoTpError, Result, SegmentationError};
use crate::network::{AddressingFormat, PacketAddress};
use crate::types::{AddressingType, Config, Message};

use super::consecutive_frame::next_sequence_number;
use super::{
    consecutive_frame, first_frame, single_frame, CanPacket, PacketKind, DEFAULT_FILLER_BYTE,
};

const CF_PCI_LENGTH: usize = 1;

/// Segmenter configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Address used for physically addressed messages.
    pub physical: PacketAddress,
    /// Address used for functionally addressed messages.
    pub functional: PacketAddress,
    /// DLC of every packet except optimized ones.
    pub dlc: u8,
    /// Use the shortest frame for Single Frames and the last Consecutive Frame.
    pub use_data_optimization: bool,
    pub filler_byte: u8,
}

impl SegmenterConfig {
    pub fn addressing_format(&self) -> AddressingFormat {
        self.physical.addressing_format
    }

    /// Address used for messages of the given addressing type.
    pub fn address(&self, addressing_type: AddressingType) -> &PacketAddress {
        match addressing_type {
            AddressingType::Physical => &self.physical,
            AddressingType::Functional => &self.functional,
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            physical: PacketAddress::normal_11bit(AddressingType::Physical, 0x7E0),
            functional: PacketAddress::normal_11bit(AddressingType::Functional, 0x7DF),
            dlc: MIN_BASE_DLC,
            use_data_optimization: false,
            filler_byte: DEFAULT_FILLER_BYTE,
        }
    }
}

impl Config for SegmenterConfig {
    fn validate(&self) -> Result<()> {
        if !(MIN_BASE_DLC..=MAX_DLC).contains(&self.dlc) {
            return Err(IsoTpError::invalid_value(
                "DLC",
                format!(
                    "{:#X} is outside {:#X}..={:#X}",
                    self.dlc, MIN_BASE_DLC, MAX_DLC
                ),
            ));
        }
        if self.physical.addressing_format != self.functional.addressing_format {
            return Err(IsoTpError::inconsistent(format!(
                "physical address uses {:?}, functional address uses {:?}",
                self.physical.addressing_format, self.functional.addressing_format
            )));
        }
        for (address, expected) in [
            (&self.physical, AddressingType::Physical),
            (&self.functional, AddressingType::Functional),
        ] {
            if address.addressing_type != expected {
                return Err(IsoTpError::inconsistent(format!(
                    "{:?} address configured with {:?} addressing type",
                    expected, address.addressing_type
                )));
            }
            address.validate()?;
        }
        Ok(())
    }
}

/// Turns messages into packet sequences and validated sequences back into messages
#[derive(Debug, Clone)]
pub struct CanSegmenter {
    config: SegmenterConfig,
}

impl CanSegmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn addressing_format(&self) -> AddressingFormat {
        self.config.addressing_format()
    }

    /// True when the packet uses this segmenter's addressing format.
    pub fn is_supported_packet(&self, packet: &CanPacket) -> bool {
        packet.addressing_format() == self.addressing_format()
    }

    /// True for packets that start a message (Single Frame or First Frame).
    pub fn is_initial_packet(&self, packet: &CanPacket) -> bool {
        packet.kind().is_initial()
    }

    /// Number of Consecutive Frames that must follow an initial packet.
    pub fn consecutive_packets_number(&self, first_packet: &CanPacket) -> Result<usize> {
        required_consecutive_packets(first_packet).ok_or_else(|| {
            IsoTpError::inconsistent(format!(
                "{:?} does not start a packet sequence",
                first_packet.kind()
            ))
        })
    }

    /// Checks that `packets` is an initial packet followed by correctly numbered
    /// Consecutive Frames. The length of the sequence is not checked.
    pub fn is_following_packets_sequence(&self, packets: &[CanPacket]) -> Result<bool> {
        if let Some(index) = self.unsupported_packet(packets) {
            return Err(IsoTpError::inconsistent(format!(
                "packet {} uses {:?} addressing, segmenter uses {:?}",
                index,
                packets[index].addressing_format(),
                self.addressing_format()
            )));
        }
        Ok(ordering_defect(packets).is_none())
    }

    /// True when `packets` is a following sequence holding exactly the packets its
    /// initial packet announces.
    pub fn is_complete_packets_sequence(&self, packets: &[CanPacket]) -> Result<bool> {
        if !self.is_following_packets_sequence(packets)? {
            return Ok(false);
        }
        let required = self.consecutive_packets_number(&packets[0])?;
        Ok(packets.len() == required + 1)
    }

    /// Splits a message into the packets that carry it.
    ///
    /// A payload that fits a Single Frame yields exactly one packet. Longer payloads
    /// yield a First Frame followed by as few Consecutive Frames as possible, numbered
    /// from 1 and wrapping after 15. Functionally addressed messages must fit a Single
    /// Frame.
    pub fn segmentation(&self, message: &Message) -> Result<Vec<CanPacket>> {
        let address = *self.config.address(message.addressing_type());
        let format = address.addressing_format;
        let payload = message.payload();
        let dlc = self.config.dlc;
        let filler_byte = self.config.filler_byte;

        if payload.len() <= single_frame::max_payload(format, dlc)? {
            let packet =
                CanPacket::single_frame(address, payload, self.optimized_dlc(), filler_byte)?;
            debug!(
                payload_len = payload.len(),
                frame_len = packet.frame_length(),
                "Message fits a Single Frame"
            );
            return Ok(vec![packet]);
        }
        if message.addressing_type() == AddressingType::Functional {
            return Err(IsoTpError::inconsistent(format!(
                "functionally addressed message of {} bytes does not fit a Single Frame",
                payload.len()
            )));
        }

        let ff_dl = u32::try_from(payload.len()).map_err(|_| {
            IsoTpError::invalid_value(
                "FF_DL",
                format!("{} bytes exceed the long form", payload.len()),
            )
        })?;
        let ff_capacity =
            first_frame::payload_capacity(format, dlc, first_frame::requires_long_form(ff_dl))?;
        let (head, rest) = payload.split_at(ff_capacity);
        let mut packets = vec![CanPacket::first_frame(address, ff_dl, head, Some(dlc), false)?];

        let cf_capacity = consecutive_frame::payload_capacity(format, dlc)?;
        let chunk_count = rest.len().div_ceil(cf_capacity);
        packets.reserve(chunk_count);
        let mut sequence_number = 1;
        for (index, chunk) in rest.chunks(cf_capacity).enumerate() {
            let chunk_dlc = if index + 1 == chunk_count {
                self.optimized_dlc()
            } else {
                Some(dlc)
            };
            packets.push(CanPacket::consecutive_frame(
                address,
                sequence_number,
                chunk,
                chunk_dlc,
                filler_byte,
            )?);
            sequence_number = next_sequence_number(sequence_number);
        }
        debug!(
            payload_len = payload.len(),
            packets = packets.len(),
            "Message segmented"
        );
        Ok(packets)
    }

    /// Reassembles a complete packet sequence into its message.
    ///
    /// Incomplete or disordered sequences fail with [`IsoTpError::Segmentation`].
    pub fn desegmentation(&self, packets: &[CanPacket]) -> Result<Message> {
        if let Some(index) = self.unsupported_packet(packets) {
            return Err(SegmentationError::UnsupportedPacket { index }.into());
        }
        if let Some(defect) = ordering_defect(packets) {
            return Err(defect.into());
        }
        let first = &packets[0];
        let required = required_consecutive_packets(first).unwrap_or_default() + 1;
        if packets.len() != required {
            return Err(SegmentationError::PacketCount {
                expected: required,
                found: packets.len(),
            }
            .into());
        }

        let declared = first.data_length().unwrap_or_default();
        let mut payload = Vec::with_capacity(declared);
        for packet in packets {
            payload.extend_from_slice(packet.payload().unwrap_or_default());
        }
        if payload.len() < declared {
            return Err(SegmentationError::PayloadLength {
                expected: declared,
                found: payload.len(),
            }
            .into());
        }
        payload.truncate(declared);
        trace!(
            payload_len = payload.len(),
            packets = packets.len(),
            "Packet sequence desegmented"
        );
        Message::new(payload, first.addressing_type())
    }

    fn optimized_dlc(&self) -> Option<u8> {
        if self.config.use_data_optimization {
            None
        } else {
            Some(self.config.dlc)
        }
    }

    fn unsupported_packet(&self, packets: &[CanPacket]) -> Option<usize> {
        packets.iter().position(|p| !self.is_supported_packet(p))
    }
}

/// Consecutive Frames announced by an initial packet; `None` for other kinds.
fn required_consecutive_packets(packet: &CanPacket) -> Option<usize> {
    match packet.kind() {
        PacketKind::SingleFrame => Some(0),
        PacketKind::FirstFrame => {
            let ff_dl = packet.data_length()?;
            let carried = packet.payload()?.len();
            let per_frame = consecutive_capacity(packet)?;
            Some(ff_dl.saturating_sub(carried).div_ceil(per_frame))
        }
        _ => None,
    }
}

/// Payload bytes of each full Consecutive Frame following a First Frame.
fn consecutive_capacity(first: &CanPacket) -> Option<usize> {
    first
        .frame_length()
        .checked_sub(first.address().address_info_byte_count() + CF_PCI_LENGTH)
        .filter(|&capacity| capacity > 0)
}

/// Checks the frame length of the Consecutive Frame at `index` against its First Frame.
///
/// Every Consecutive Frame but the last has the First Frame's length. The last one is no
/// longer than that and still holds all remaining bytes.
fn frame_length_defect(
    first: &CanPacket,
    index: usize,
    packet: &CanPacket,
) -> Option<SegmentationError> {
    let required = required_consecutive_packets(first)?;
    let full = first.frame_length();
    let bounds = match index.cmp(&required) {
        Ordering::Less => full..=full,
        Ordering::Equal => {
            let per_frame = consecutive_capacity(first)?;
            let carried = first.payload()?.len() + (required - 1) * per_frame;
            let remaining = first.data_length()?.saturating_sub(carried);
            first.address().address_info_byte_count() + CF_PCI_LENGTH + remaining..=full
        }
        Ordering::Greater => return None,
    };
    let found = packet.frame_length();
    if bounds.contains(&found) {
        return None;
    }
    let expected = if found > *bounds.end() {
        *bounds.end()
    } else {
        *bounds.start()
    };
    Some(SegmentationError::FrameLength {
        index,
        expected,
        found,
    })
}

/// First structural problem of a sequence, ignoring how many packets it holds.
fn ordering_defect(packets: &[CanPacket]) -> Option<SegmentationError> {
    let Some(first) = packets.first() else {
        return Some(SegmentationError::EmptySequence);
    };
    if !first.kind().is_initial() {
        return Some(SegmentationError::NotInitialPacket { kind: first.kind() });
    }
    let mut expected = 1;
    for (index, packet) in packets.iter().enumerate().skip(1) {
        if first.kind() == PacketKind::SingleFrame
            || packet.kind() != PacketKind::ConsecutiveFrame
        {
            return Some(SegmentationError::UnexpectedPacketKind {
                index,
                kind: packet.kind(),
            });
        }
        match packet.sequence_number() {
            Some(found) if found == expected => {}
            found => {
                return Some(SegmentationError::SequenceNumber {
                    index,
                    expected,
                    found: found.unwrap_or_default(),
                })
            }
        }
        if let Some(defect) = frame_length_defect(first, index, packet) {
            return Some(defect);
        }
        expected = next_sequence_number(expected);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;

    fn segmenter() -> CanSegmenter {
        CanSegmenter::new(SegmenterConfig::default()).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SegmenterConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejects_small_dlc_and_mixed_formats() {
        let config = SegmenterConfig {
            dlc: 7,
            ..Default::default()
        };
        assert!(CanSegmenter::new(config).is_err());

        let config = SegmenterConfig {
            functional: PacketAddress::extended(AddressingType::Functional, 0x7DF, 0x33),
            ..Default::default()
        };
        assert!(matches!(
            CanSegmenter::new(config),
            Err(IsoTpError::InconsistentArguments(_))
        ));
    }

    #[test]
    fn short_message_is_one_single_frame() {
        let message = Message::physical(vec![0x22, 0xF1, 0x90]).unwrap();
        let packets = segmenter().segmentation(&message).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(
            packets[0].raw_data(),
            &[0x03, 0x22, 0xF1, 0x90, 0xCC, 0xCC, 0xCC, 0xCC]
        );
    }

    #[test]
    fn long_message_is_numbered_and_wraps() {
        let payload: Vec<u8> = (0..=255).collect();
        let message = Message::physical(payload.clone()).unwrap();
        let segmenter = segmenter();
        let packets = segmenter.segmentation(&message).unwrap();

        // 6 bytes in the First Frame, 250 spread over 7-byte Consecutive Frames.
        assert_eq!(packets.len(), 1 + 36);
        assert_eq!(&packets[0].raw_data()[..2], &[0x11, 0x00]);
        let numbers: Vec<u8> = packets[1..]
            .iter()
            .filter_map(|p| p.sequence_number())
            .collect();
        assert_eq!(&numbers[..17], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 0, 1]);
        assert_eq!(segmenter.consecutive_packets_number(&packets[0]).unwrap(), 36);
        assert!(segmenter.is_complete_packets_sequence(&packets).unwrap());
        assert_eq!(segmenter.desegmentation(&packets).unwrap(), message);
    }

    #[test]
    fn last_consecutive_frame_is_padded_or_optimized() {
        let message = Message::physical(vec![0xAB; 9]).unwrap();
        let packets = segmenter().segmentation(&message).unwrap();
        assert_eq!(packets[1].raw_data(), &[0x21, 0xAB, 0xAB, 0xAB, 0xCC, 0xCC, 0xCC, 0xCC]);

        let optimized = CanSegmenter::new(SegmenterConfig {
            use_data_optimization: true,
            ..Default::default()
        })
        .unwrap();
        let packets = optimized.segmentation(&message).unwrap();
        assert_eq!(packets[0].frame_length(), 8);
        assert_eq!(packets[1].raw_data(), &[0x21, 0xAB, 0xAB, 0xAB]);
    }

    #[test]
    fn functional_message_must_fit_single_frame() {
        let segmenter = segmenter();
        let message = Message::new(vec![0x3E, 0x80], AddressingType::Functional).unwrap();
        let packets = segmenter.segmentation(&message).unwrap();
        assert_eq!(packets[0].can_id(), 0x7DF);

        let message = Message::new(vec![0x00; 8], AddressingType::Functional).unwrap();
        assert!(matches!(
            segmenter.segmentation(&message),
            Err(IsoTpError::InconsistentArguments(_))
        ));
    }

    #[test]
    fn sequence_checks() {
        let segmenter = segmenter();
        let message = Message::physical(vec![0x55; 20]).unwrap();
        let packets = segmenter.segmentation(&message).unwrap();
        assert_eq!(packets.len(), 3);

        assert!(segmenter.is_following_packets_sequence(&packets[..2]).unwrap());
        assert!(!segmenter.is_complete_packets_sequence(&packets[..2]).unwrap());
        assert!(!segmenter.is_following_packets_sequence(&packets[1..]).unwrap());
        assert!(!segmenter.is_following_packets_sequence(&[]).unwrap());
        assert!(segmenter.consecutive_packets_number(&packets[1]).is_err());
    }

    #[test]
    fn desegmentation_reports_which_check_failed() {
        let segmenter = segmenter();
        let message = Message::physical(vec![0x55; 20]).unwrap();
        let packets = segmenter.segmentation(&message).unwrap();

        assert_eq!(
            segmenter.desegmentation(&[]),
            Err(SegmentationError::EmptySequence.into())
        );
        assert_eq!(
            segmenter.desegmentation(&packets[..2]),
            Err(SegmentationError::PacketCount {
                expected: 3,
                found: 2
            }
            .into())
        );
        assert_eq!(
            segmenter.desegmentation(&[packets[0].clone(), packets[2].clone()]),
            Err(SegmentationError::SequenceNumber {
                index: 1,
                expected: 1,
                found: 2
            }
            .into())
        );
        assert_eq!(
            segmenter.desegmentation(&packets[1..]),
            Err(SegmentationError::NotInitialPacket {
                kind: PacketKind::ConsecutiveFrame
            }
            .into())
        );
    }

    #[test]
    fn consecutive_frames_must_match_first_frame_length() {
        let segmenter = segmenter();
        let parse = |data: Vec<u8>| {
            CanPacket::from_frame(
                AddressingFormat::Normal11Bit,
                AddressingType::Physical,
                &Frame::new(0x7E0, data),
            )
            .unwrap()
        };
        let first = parse(vec![0x10, 20, 0, 1, 2, 3, 4, 5]);
        let mut oversized = vec![0x21];
        oversized.extend(100..111u8);
        let mut last = vec![0x22];
        last.extend(200..207u8);
        let packets = [first, parse(oversized), parse(last)];

        assert!(!segmenter.is_following_packets_sequence(&packets).unwrap());
        assert!(!segmenter.is_complete_packets_sequence(&packets).unwrap());
        assert_eq!(
            segmenter.desegmentation(&packets),
            Err(SegmentationError::FrameLength {
                index: 1,
                expected: 8,
                found: 12
            }
            .into())
        );
    }

    #[test]
    fn last_consecutive_frame_must_hold_remaining_bytes() {
        let segmenter = segmenter();
        let parse = |data: Vec<u8>| {
            CanPacket::from_frame(
                AddressingFormat::Normal11Bit,
                AddressingType::Physical,
                &Frame::new(0x7E0, data),
            )
            .unwrap()
        };
        let packets = [
            parse(vec![0x10, 10, 0, 1, 2, 3, 4, 5]),
            parse(vec![0x21, 6, 7]),
        ];
        assert_eq!(
            segmenter.desegmentation(&packets),
            Err(SegmentationError::FrameLength {
                index: 1,
                expected: 5,
                found: 3
            }
            .into())
        );

        let packets = [
            parse(vec![0x10, 10, 0, 1, 2, 3, 4, 5]),
            parse(vec![0x21, 6, 7, 8, 9]),
        ];
        assert_eq!(
            segmenter.desegmentation(&packets).unwrap().payload(),
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]
        );
    }

    #[test]
    fn packets_of_other_formats_are_unsupported() {
        let segmenter = segmenter();
        let address = PacketAddress::extended(AddressingType::Physical, 0x7E0, 0x10);
        let packet = CanPacket::single_frame(address, &[0x01], None, 0xCC).unwrap();
        assert!(!segmenter.is_supported_packet(&packet));
        assert!(segmenter
            .is_following_packets_sequence(std::slice::from_ref(&packet))
            .is_err());
        assert_eq!(
            segmenter.desegmentation(&[packet]),
            Err(SegmentationError::UnsupportedPacket { index: 0 }.into())
        );
    }
}
