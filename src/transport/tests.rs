use super::*;
use crate::error::IsoTpError;
use crate::network::PacketAddress;
use crate::physical::mock::MockPhysical;
use crate::types::{AddressingType, Frame, Message};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const TX_ID: u32 = 0x7E0;
const RX_ID: u32 = 0x7E8;

fn flow_control_frame(status: u8, block_size: u8, st_min: u8) -> Frame {
    Frame::new(
        RX_ID,
        vec![0x30 | status, block_size, st_min, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC],
    )
}

fn open(mock: MockPhysical, config: IsoTpConfig) -> IsoTp<MockPhysical> {
    let mut isotp = IsoTp::with_physical(config, mock).unwrap();
    isotp.open().unwrap();
    isotp
}

#[test]
fn test_isotp_single_frame() {
    let mock = MockPhysical::new(|frame| {
        // Positive response: service ID + 0x40
        vec![Frame::new(
            RX_ID,
            vec![0x02, frame.data[1] | 0x40, 0x03, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC],
        )]
    });
    let mut isotp = open(mock, IsoTpConfig::default());

    isotp.send(&Message::physical(vec![0x10, 0x03]).unwrap()).unwrap();
    assert_eq!(
        isotp.physical().sent_frames()[0],
        Frame::new(TX_ID, vec![0x02, 0x10, 0x03, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC])
    );

    let response = isotp.receive().unwrap();
    assert_eq!(response.payload(), &[0x50, 0x03]);
}

#[test]
fn test_isotp_multi_frame() {
    let frame_count = Arc::new(AtomicU32::new(0));
    let frame_count_clone = frame_count.clone();
    let mock = MockPhysical::new(move |frame| {
        let count = frame_count_clone.fetch_add(1, Ordering::SeqCst);
        if count == 0 {
            assert_eq!(frame.data[0] & 0xF0, 0x10);
            vec![flow_control_frame(0x0, 0x00, 0x00)]
        } else {
            assert_eq!(frame.data[0] & 0xF0, 0x20);
            Vec::new()
        }
    });
    let mut isotp = open(mock, IsoTpConfig::default());

    let payload: Vec<u8> = (0..20).collect();
    isotp.send(&Message::physical(payload).unwrap()).unwrap();

    // First Frame plus two Consecutive Frames
    assert_eq!(frame_count.load(Ordering::SeqCst), 3);
    let sent = isotp.physical().sent_frames();
    assert_eq!(sent[1].data, vec![0x21, 6, 7, 8, 9, 10, 11, 12]);
    assert_eq!(sent[2].data, vec![0x22, 13, 14, 15, 16, 17, 18, 19]);
}

#[test]
fn test_isotp_flow_control_block_size() {
    let fc_count = Arc::new(AtomicU32::new(0));
    let fc_count_clone = fc_count.clone();
    let cf_seen = Arc::new(AtomicU32::new(0));
    let cf_seen_clone = cf_seen.clone();
    let mock = MockPhysical::new(move |frame| {
        let reply_needed = match frame.data[0] & 0xF0 {
            0x10 => true,
            // A new Flow Control after every second Consecutive Frame
            _ => cf_seen_clone.fetch_add(1, Ordering::SeqCst) % 2 == 1,
        };
        if reply_needed {
            fc_count_clone.fetch_add(1, Ordering::SeqCst);
            vec![flow_control_frame(0x0, 0x02, 0x00)]
        } else {
            Vec::new()
        }
    });
    let mut isotp = open(mock, IsoTpConfig::default());

    // 6 + 5 * 7 bytes: five Consecutive Frames in blocks of two
    isotp.send(&Message::physical(vec![0x42; 41]).unwrap()).unwrap();
    assert_eq!(isotp.physical().sent_frames().len(), 6);
    assert_eq!(cf_seen.load(Ordering::SeqCst), 5);
    // Flow Control frames after FF, CF2 and CF4
    assert_eq!(fc_count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_isotp_wait_then_continue() {
    let mut mock = MockPhysical::silent();
    mock.queue_frames([
        flow_control_frame(0x1, 0xCC, 0xCC),
        flow_control_frame(0x1, 0xCC, 0xCC),
        flow_control_frame(0x0, 0x00, 0x0A),
    ]);
    let mut isotp = open(mock, IsoTpConfig::default());
    isotp.send(&Message::physical(vec![0x01; 10]).unwrap()).unwrap();
    assert_eq!(isotp.physical().sent_frames().len(), 2);
}

#[test]
fn test_isotp_wait_limit() {
    let mut mock = MockPhysical::silent();
    mock.queue_frames((0..3).map(|_| flow_control_frame(0x1, 0xCC, 0xCC)));
    let config = IsoTpConfig {
        wft_max: 2,
        ..Default::default()
    };
    let mut isotp = open(mock, config);
    assert_eq!(
        isotp.send(&Message::physical(vec![0x01; 10]).unwrap()),
        Err(IsoTpError::WaitLimitExceeded { limit: 2 })
    );
}

#[test]
fn test_isotp_remote_overflow() {
    let mut mock = MockPhysical::silent();
    mock.queue_frames([flow_control_frame(0x2, 0xCC, 0xCC)]);
    let mut isotp = open(mock, IsoTpConfig::default());
    assert_eq!(
        isotp.send(&Message::physical(vec![0x01; 10]).unwrap()),
        Err(IsoTpError::Overflow)
    );
    // Consecutive Frames are never released
    assert_eq!(isotp.physical().sent_frames().len(), 1);
}

#[test]
fn test_isotp_unexpected_packet_while_waiting() {
    let mut mock = MockPhysical::silent();
    mock.queue_frames([Frame::new(RX_ID, vec![0x01, 0x3E])]);
    let mut isotp = open(mock, IsoTpConfig::default());
    assert_eq!(
        isotp.send(&Message::physical(vec![0x01; 10]).unwrap()),
        Err(IsoTpError::UnexpectedPacket {
            kind: PacketKind::SingleFrame
        })
    );
}

#[test]
fn test_isotp_receive_multi_frame() {
    let flow_controls = Arc::new(AtomicU32::new(0));
    let flow_controls_clone = flow_controls.clone();
    let mock = MockPhysical::new(move |frame| {
        assert_eq!(frame.id, TX_ID);
        assert_eq!(frame.data[0] & 0xF0, 0x30);
        match flow_controls_clone.fetch_add(1, Ordering::SeqCst) {
            // Wait
            0 => Vec::new(),
            1 => vec![
                Frame::new(RX_ID, vec![0x21, 6, 7, 8, 9, 10, 11, 12]),
                Frame::new(RX_ID, vec![0x22, 13, 14, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]),
            ],
            _ => Vec::new(),
        }
    });
    let config = IsoTpConfig {
        flow_control: FlowControlParametersGenerator::new(0, 0x05, 1, false),
        ..Default::default()
    };
    let mut isotp = open(mock, config);
    isotp
        .physical_mut()
        .queue_frames([Frame::new(RX_ID, vec![0x10, 15, 0, 1, 2, 3, 4, 5])]);

    let message = isotp.receive().unwrap();
    assert_eq!(message.payload(), (0..15).collect::<Vec<u8>>().as_slice());
    let sent = isotp.physical().sent_frames();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].data, vec![0x31, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]);
    assert_eq!(sent[1].data, vec![0x30, 0x00, 0x05, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]);
}

#[test]
fn test_isotp_receive_ignores_foreign_identifiers() {
    let mut mock = MockPhysical::silent();
    mock.queue_frames([
        Frame::new(0x123, vec![0x02, 0x11, 0x01]),
        Frame::new(RX_ID, vec![0x02, 0x3E, 0x00]),
    ]);
    let mut isotp = open(mock, IsoTpConfig::default());
    assert_eq!(isotp.receive().unwrap().payload(), &[0x3E, 0x00]);
}

#[test]
fn test_isotp_receive_ignores_foreign_address_byte() {
    let mut mock = MockPhysical::silent();
    mock.queue_frames([
        Frame::new(RX_ID, vec![0x22, 0x02, 0x3E, 0x00]),
        Frame::new(RX_ID, vec![0xF1, 0x02, 0x10, 0x01]),
    ]);
    let config = IsoTpConfig {
        segmenter: SegmenterConfig {
            physical: PacketAddress::extended(AddressingType::Physical, TX_ID, 0x10),
            functional: PacketAddress::extended(AddressingType::Functional, 0x7DF, 0x10),
            ..Default::default()
        },
        rx_address: PacketAddress::extended(AddressingType::Physical, RX_ID, 0xF1),
        ..Default::default()
    };
    let mut isotp = open(mock, config);
    assert_eq!(isotp.receive().unwrap().payload(), &[0x10, 0x01]);
}

#[test]
fn test_isotp_receive_ignores_foreign_address_extension() {
    let mut mock = MockPhysical::silent();
    mock.queue_frames([
        Frame::new(RX_ID, vec![0x55, 0x01, 0x3E]),
        Frame::new(RX_ID, vec![0xAE, 0x01, 0x3E]),
    ]);
    let config = IsoTpConfig {
        segmenter: SegmenterConfig {
            physical: PacketAddress::mixed_11bit(AddressingType::Physical, TX_ID, 0xAE),
            functional: PacketAddress::mixed_11bit(AddressingType::Functional, 0x7DF, 0xAE),
            ..Default::default()
        },
        rx_address: PacketAddress::mixed_11bit(AddressingType::Physical, RX_ID, 0xAE),
        ..Default::default()
    };
    let mut isotp = open(mock, config);
    assert_eq!(isotp.receive().unwrap().payload(), &[0x3E]);
    assert!(isotp.receive().is_err());
}

#[test]
fn test_isotp_receive_refuses_oversized_message() {
    let mut mock = MockPhysical::silent();
    mock.queue_frames([Frame::new(RX_ID, vec![0x11, 0x00, 1, 2, 3, 4, 5, 6])]);
    let config = IsoTpConfig {
        max_payload_len: 128,
        ..Default::default()
    };
    let mut isotp = open(mock, config);
    assert_eq!(isotp.receive(), Err(IsoTpError::Overflow));
    assert_eq!(
        isotp.physical().sent_frames()[0].data,
        vec![0x32, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]
    );
}

#[test]
fn test_isotp_receive_out_of_order_is_segmentation_error() {
    let mock = MockPhysical::new(|_| {
        vec![
            Frame::new(RX_ID, vec![0x21, 6, 7, 8, 9, 10, 11, 12]),
            Frame::new(RX_ID, vec![0x23, 13, 14, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]),
        ]
    });
    let mut isotp = open(mock, IsoTpConfig::default());
    isotp
        .physical_mut()
        .queue_frames([Frame::new(RX_ID, vec![0x10, 15, 0, 1, 2, 3, 4, 5])]);
    let err = isotp.receive().unwrap_err();
    assert!(err.is_segmentation_error());
}

#[test]
fn test_isotp_requires_open() {
    let mut isotp = IsoTp::with_physical(IsoTpConfig::default(), MockPhysical::silent()).unwrap();
    assert!(!isotp.is_open());
    assert_eq!(
        isotp.send(&Message::physical(vec![0x3E]).unwrap()),
        Err(IsoTpError::NotOpen)
    );
    assert_eq!(isotp.receive(), Err(IsoTpError::NotOpen));
    isotp.open().unwrap();
    isotp.close().unwrap();
    assert!(!isotp.is_open());
}

#[test]
fn test_isotp_config_rejects_format_mismatch() {
    let config = IsoTpConfig {
        rx_address: PacketAddress::extended(AddressingType::Physical, RX_ID, 0xF1),
        ..Default::default()
    };
    assert!(matches!(
        IsoTp::with_physical(config, MockPhysical::silent()),
        Err(IsoTpError::InconsistentArguments(_))
    ));
}
