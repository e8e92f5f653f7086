//! MQTT 3.1.1 packet decoder (QoS-0 subset)
//!
//! Decodes the packets a broker sends to a client: CONNACK, PUBLISH,
//! SUBACK, UNSUBACK, PINGRESP.

use bytes::Bytes;
use std::sync::Arc;

use super::{read_string, read_variable_int, MAX_REMAINING_LENGTH};
use crate::protocol::{ConnAck, ConnectReturnCode, DecodeError, Packet, Publish, SubAck, UnsubAck};

pub struct Decoder {
    max_packet_size: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            max_packet_size: MAX_REMAINING_LENGTH,
        }
    }

    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size.min(MAX_REMAINING_LENGTH);
        self
    }

    /// Decode a packet from the buffer.
    /// Returns (packet, bytes_consumed), or `Ok(None)` if more data is needed.
    pub fn decode(&mut self, buf: &[u8]) -> Result<Option<(Packet, usize)>, DecodeError> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let first_byte = buf[0];
        let packet_type = first_byte >> 4;
        let flags = first_byte & 0x0F;

        let (remaining_length, len_bytes) = match read_variable_int(&buf[1..]) {
            Ok(r) => r,
            Err(DecodeError::InsufficientData) => return Ok(None),
            Err(e) => return Err(e),
        };

        if remaining_length as usize > self.max_packet_size {
            return Err(DecodeError::PacketTooLarge);
        }

        let total_len = 1 + len_bytes + remaining_length as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        let payload_start = 1 + len_bytes;
        let payload = &buf[payload_start..total_len];

        let packet = match packet_type {
            2 => decode_connack(flags, payload)?,
            3 => decode_publish(flags, payload)?,
            9 => decode_suback(flags, payload)?,
            11 => decode_unsuback(flags, payload)?,
            13 => {
                if flags != 0 {
                    return Err(DecodeError::InvalidFlags);
                }
                Packet::PingResp
            }
            _ => return Err(DecodeError::InvalidPacketType(packet_type)),
        };

        Ok(Some((packet, total_len)))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_connack(flags: u8, payload: &[u8]) -> Result<Packet, DecodeError> {
    if flags != 0 {
        return Err(DecodeError::InvalidFlags);
    }
    if payload.len() < 2 {
        return Err(DecodeError::InsufficientData);
    }

    let acknowledge_flags = payload[0];
    if (acknowledge_flags & 0xFE) != 0 {
        return Err(DecodeError::InvalidFlags);
    }
    let session_present = (acknowledge_flags & 0x01) != 0;

    let return_code = ConnectReturnCode::from_u8(payload[1])
        .ok_or(DecodeError::InvalidReasonCode(payload[1]))?;

    Ok(Packet::ConnAck(ConnAck {
        session_present,
        return_code,
    }))
}

fn decode_publish(flags: u8, payload: &[u8]) -> Result<Packet, DecodeError> {
    let dup = (flags & 0x08) != 0;
    let qos_bits = (flags >> 1) & 0x03;
    let retain = (flags & 0x01) != 0;

    if qos_bits != 0 {
        return Err(DecodeError::MalformedPacket(
            "only QoS 0 PUBLISH is supported",
        ));
    }
    if dup {
        return Err(DecodeError::MalformedPacket("DUP must be 0 for QoS 0"));
    }

    let (topic, len) = read_string(payload)?;
    if topic.contains('+') || topic.contains('#') {
        return Err(DecodeError::MalformedPacket("topic contains wildcard"));
    }

    let message_payload = Bytes::copy_from_slice(&payload[len..]);

    Ok(Packet::Publish(Publish {
        retain,
        topic: Arc::from(topic),
        payload: message_payload,
    }))
}

fn decode_suback(flags: u8, payload: &[u8]) -> Result<Packet, DecodeError> {
    if flags != 0 {
        return Err(DecodeError::InvalidFlags);
    }
    if payload.len() < 3 {
        return Err(DecodeError::InsufficientData);
    }

    let packet_id = u16::from_be_bytes([payload[0], payload[1]]);
    let return_codes = payload[2..].to_vec();

    for &code in &return_codes {
        if code != 0x00 && code != 0x80 {
            return Err(DecodeError::InvalidReasonCode(code));
        }
    }

    Ok(Packet::SubAck(SubAck {
        packet_id,
        return_codes,
    }))
}

fn decode_unsuback(flags: u8, payload: &[u8]) -> Result<Packet, DecodeError> {
    if flags != 0 {
        return Err(DecodeError::InvalidFlags);
    }
    if payload.len() < 2 {
        return Err(DecodeError::InsufficientData);
    }

    let packet_id = u16::from_be_bytes([payload[0], payload[1]]);
    Ok(Packet::UnsubAck(UnsubAck { packet_id }))
}
