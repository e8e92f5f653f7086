//! MQTT 3.1.1 packet encoder (QoS-0 subset)

use bytes::{BufMut, BytesMut};

use super::{write_binary, write_string, write_variable_int};
use crate::protocol::{
    ConnAck, Connect, EncodeError, Packet, Publish, SubAck, Subscribe, UnsubAck, Unsubscribe,
};

#[derive(Debug, Default)]
pub struct Encoder;

impl Encoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, packet: &Packet, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match packet {
            Packet::Connect(p) => encode_connect(p, buf),
            Packet::ConnAck(p) => encode_connack(p, buf),
            Packet::Publish(p) => encode_publish(p, buf),
            Packet::Subscribe(p) => encode_subscribe(p, buf),
            Packet::SubAck(p) => encode_suback(p, buf),
            Packet::Unsubscribe(p) => encode_unsubscribe(p, buf),
            Packet::UnsubAck(p) => encode_unsuback(p, buf),
            Packet::PingReq => {
                buf.put_u8(0xC0);
                buf.put_u8(0x00);
                Ok(())
            }
            Packet::PingResp => {
                buf.put_u8(0xD0);
                buf.put_u8(0x00);
                Ok(())
            }
            Packet::Disconnect => {
                buf.put_u8(0xE0);
                buf.put_u8(0x00);
                Ok(())
            }
        }
    }
}

fn encode_connect(packet: &Connect, buf: &mut BytesMut) -> Result<(), EncodeError> {
    let mut remaining_length = 6; // "MQTT" string (2 + 4)
    remaining_length += 1; // protocol level
    remaining_length += 1; // connect flags
    remaining_length += 2; // keep alive
    remaining_length += 2 + packet.client_id.len();

    if let Some(ref username) = packet.username {
        remaining_length += 2 + username.len();
    }
    if let Some(ref password) = packet.password {
        remaining_length += 2 + password.len();
    }

    buf.put_u8(0x10);
    write_variable_int(buf, remaining_length as u32)?;

    write_string(buf, "MQTT")?;
    buf.put_u8(4); // protocol level 4 == MQTT 3.1.1

    let mut connect_flags: u8 = 0;
    if packet.clean_session {
        connect_flags |= 0x02;
    }
    if packet.password.is_some() {
        connect_flags |= 0x40;
    }
    if packet.username.is_some() {
        connect_flags |= 0x80;
    }
    buf.put_u8(connect_flags);

    buf.put_u16(packet.keep_alive);
    write_string(buf, &packet.client_id)?;

    if let Some(ref username) = packet.username {
        write_string(buf, username)?;
    }
    if let Some(ref password) = packet.password {
        write_binary(buf, password)?;
    }

    Ok(())
}

fn encode_connack(packet: &ConnAck, buf: &mut BytesMut) -> Result<(), EncodeError> {
    buf.put_u8(0x20);
    buf.put_u8(0x02);
    buf.put_u8(if packet.session_present { 0x01 } else { 0x00 });
    buf.put_u8(packet.return_code as u8);
    Ok(())
}

fn encode_publish(packet: &Publish, buf: &mut BytesMut) -> Result<(), EncodeError> {
    let remaining_length = 2 + packet.topic.len() + packet.payload.len();

    let mut first_byte: u8 = 0x30;
    if packet.retain {
        first_byte |= 0x01;
    }
    buf.put_u8(first_byte);
    write_variable_int(buf, remaining_length as u32)?;

    write_string(buf, &packet.topic)?;
    buf.put_slice(&packet.payload);

    Ok(())
}

fn encode_subscribe(packet: &Subscribe, buf: &mut BytesMut) -> Result<(), EncodeError> {
    let mut remaining_length = 2; // packet identifier
    for filter in &packet.filters {
        remaining_length += 2 + filter.len() + 1; // string + requested QoS byte
    }

    buf.put_u8(0x82);
    write_variable_int(buf, remaining_length as u32)?;
    buf.put_u16(packet.packet_id);

    for filter in &packet.filters {
        write_string(buf, filter)?;
        buf.put_u8(0); // QoS 0 requested
    }

    Ok(())
}

fn encode_suback(packet: &SubAck, buf: &mut BytesMut) -> Result<(), EncodeError> {
    let remaining_length = 2 + packet.return_codes.len();
    buf.put_u8(0x90);
    write_variable_int(buf, remaining_length as u32)?;
    buf.put_u16(packet.packet_id);
    for code in &packet.return_codes {
        buf.put_u8(*code);
    }
    Ok(())
}

fn encode_unsubscribe(packet: &Unsubscribe, buf: &mut BytesMut) -> Result<(), EncodeError> {
    let mut remaining_length = 2;
    for filter in &packet.filters {
        remaining_length += 2 + filter.len();
    }

    buf.put_u8(0xA2);
    write_variable_int(buf, remaining_length as u32)?;
    buf.put_u16(packet.packet_id);
    for filter in &packet.filters {
        write_string(buf, filter)?;
    }

    Ok(())
}

fn encode_unsuback(packet: &UnsubAck, buf: &mut BytesMut) -> Result<(), EncodeError> {
    buf.put_u8(0xB0);
    buf.put_u8(0x02);
    buf.put_u16(packet.packet_id);
    Ok(())
}
