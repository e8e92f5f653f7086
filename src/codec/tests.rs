//! Codec round-trip tests for the trimmed MQTT 3.1.1 QoS-0 packet set.

use bytes::{Bytes, BytesMut};

use super::{Decoder, Encoder};
use crate::protocol::{
    ConnAck, Connect, ConnectReturnCode, DecodeError, Packet, Publish, SubAck, Subscribe,
    UnsubAck, Unsubscribe,
};

fn round_trip(packet: Packet) -> Packet {
    let encoder = Encoder::new();
    let mut buf = BytesMut::new();
    encoder.encode(&packet, &mut buf).unwrap();

    let mut decoder = Decoder::new();
    // CONNECT/SUBSCRIBE/UNSUBSCRIBE/DISCONNECT are client-to-broker and the
    // decoder only implements the broker-to-client direction, so only
    // round-trip the packets the decoder actually understands.
    match decoder.decode(&buf).unwrap() {
        Some((decoded, consumed)) => {
            assert_eq!(consumed, buf.len());
            decoded
        }
        None => panic!("decoder needs more data for a complete encoded packet"),
    }
}

#[test]
fn connect_encodes_mqtt_311_fixed_header() {
    let packet = Packet::Connect(Box::new(Connect {
        client_id: "mdfeed-1".to_string(),
        clean_session: true,
        keep_alive: 30,
        username: Some("svc".to_string()),
        password: Some(Bytes::from_static(b"secret")),
    }));

    let encoder = Encoder::new();
    let mut buf = BytesMut::new();
    encoder.encode(&packet, &mut buf).unwrap();

    assert_eq!(buf[0], 0x10);
    assert_eq!(&buf[2..8], b"\x00\x04MQTT");
    assert_eq!(buf[8], 4); // protocol level
    let flags = buf[9];
    assert_eq!(flags & 0x02, 0x02); // clean session
    assert_eq!(flags & 0x40, 0x40); // password present
    assert_eq!(flags & 0x80, 0x80); // username present
}

#[test]
fn connack_round_trips() {
    let decoded = round_trip(Packet::ConnAck(ConnAck {
        session_present: true,
        return_code: ConnectReturnCode::Accepted,
    }));
    match decoded {
        Packet::ConnAck(ack) => {
            assert!(ack.session_present);
            assert!(ack.return_code.is_accepted());
        }
        other => panic!("expected ConnAck, got {:?}", other),
    }
}

#[test]
fn connack_rejects_unknown_return_code() {
    // acknowledge_flags=0x00, reason=0xFF (not a valid 3.1.1 return code)
    let buf = [0x20u8, 0x02, 0x00, 0xFF];
    let mut decoder = Decoder::new();
    assert_eq!(
        decoder.decode(&buf),
        Err(DecodeError::InvalidReasonCode(0xFF))
    );
}

#[test]
fn publish_qos0_round_trips() {
    let decoded = round_trip(Packet::Publish(Publish {
        retain: false,
        topic: "proto/topic/bidofferv3/AOT".into(),
        payload: Bytes::from_static(b"\x01\x02\x03"),
    }));
    match decoded {
        Packet::Publish(p) => {
            assert_eq!(&*p.topic, "proto/topic/bidofferv3/AOT");
            assert_eq!(&p.payload[..], b"\x01\x02\x03");
            assert!(!p.retain);
        }
        other => panic!("expected Publish, got {:?}", other),
    }
}

#[test]
fn publish_with_nonzero_qos_flag_is_rejected() {
    // type=PUBLISH, flags=QoS1 (0b010), remaining_length=5
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[0x32, 0x05, 0x00, 0x01, b'A', 0x00, 0x00]);
    let mut decoder = Decoder::new();
    assert!(matches!(
        decoder.decode(&buf),
        Err(DecodeError::MalformedPacket(_))
    ));
}

#[test]
fn suback_round_trips() {
    let decoded = round_trip(Packet::SubAck(SubAck {
        packet_id: 7,
        return_codes: vec![0x00, 0x80],
    }));
    match decoded {
        Packet::SubAck(ack) => {
            assert_eq!(ack.packet_id, 7);
            assert_eq!(ack.return_codes, vec![0x00, 0x80]);
        }
        other => panic!("expected SubAck, got {:?}", other),
    }
}

#[test]
fn unsuback_round_trips() {
    let decoded = round_trip(Packet::UnsubAck(UnsubAck { packet_id: 9 }));
    match decoded {
        Packet::UnsubAck(ack) => assert_eq!(ack.packet_id, 9),
        other => panic!("expected UnsubAck, got {:?}", other),
    }
}

#[test]
fn pingresp_round_trips() {
    let decoded = round_trip(Packet::PingResp);
    assert_eq!(decoded, Packet::PingResp);
}

#[test]
fn subscribe_encodes_flags_0010() {
    let packet = Packet::Subscribe(Subscribe {
        packet_id: 1,
        filters: vec!["proto/topic/bidofferv3/AOT".to_string()],
    });
    let encoder = Encoder::new();
    let mut buf = BytesMut::new();
    encoder.encode(&packet, &mut buf).unwrap();
    assert_eq!(buf[0], 0x82);
}

#[test]
fn unsubscribe_encodes_flags_0010() {
    let packet = Packet::Unsubscribe(Unsubscribe {
        packet_id: 1,
        filters: vec!["proto/topic/bidofferv3/AOT".to_string()],
    });
    let encoder = Encoder::new();
    let mut buf = BytesMut::new();
    encoder.encode(&packet, &mut buf).unwrap();
    assert_eq!(buf[0], 0xA2);
}

#[test]
fn decoder_returns_none_on_partial_packet() {
    let mut decoder = Decoder::new();
    // PINGRESP fixed header only, but remaining_length byte missing
    assert_eq!(decoder.decode(&[0xD0]), Ok(None));
}

#[test]
fn decoder_rejects_unknown_packet_type() {
    // type nibble 0 is reserved / never used by the broker-to-client direction
    let mut decoder = Decoder::new();
    assert_eq!(
        decoder.decode(&[0x00, 0x00]),
        Err(DecodeError::InvalidPacketType(0))
    );
}
