//! MQTT 3.1.1 control packet codec.
//!
//! Pure functions that turn control packets into bytes and bytes back into
//! packets. Nothing in here keeps state or touches the transport; the
//! [`Client`](super::client::Client) owns the buffers and calls in.
//!
//! # Wire layout
//!
//! ```text
//! ┌────────────┬──────────────────┬─────────────────┬──────────────┐
//! │ type|flags │ remaining length │ variable header │   payload    │
//! │   1 byte   │    1-4 bytes     │                 │              │
//! └────────────┴──────────────────┴─────────────────┴──────────────┘
//! ```
//!
//! Decoding is split in two steps. [`decode`] frames the byte stream: it reads
//! the fixed header and returns the body slice once the whole packet is
//! present. [`Packet::parse`] then gives a typed view of a framed,
//! server-to-client packet. Both steps only ever index inside the slice they
//! were given, so arbitrary or truncated input fails with an [`Error`].
//!
//! # Examples
//!
//! ```rust
//! use libmqtt::network::application::mqtt::packet::{self, Packet, Publish, QoS};
//!
//! let mut buf = [0u8; 64];
//! let publish = Publish {
//!     topic: "a/b",
//!     packet_id: Some(7),
//!     payload: b"hi",
//!     qos: QoS::AtLeastOnce,
//!     dup: false,
//!     retain: false,
//! };
//! let len = packet::encode_publish(&mut buf, &publish).unwrap();
//!
//! let frame = packet::decode(&buf[..len]).unwrap();
//! assert_eq!(Packet::parse(&frame).unwrap(), Packet::Publish(publish));
//! ```

use core::str;

use serde::{Deserialize, Deserializer};

use super::config::ClientInfo;

/// Protocol name carried in CONNECT.
pub const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;
/// Largest value the remaining length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;
/// Largest possible fixed header: one type byte plus four length bytes.
pub const MAX_FIXED_HEADER_LEN: usize = 5;
/// SUBACK return code signalling a refused subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

const CONNECT_CLEAN_SESSION: u8 = 0x02;
const CONNECT_WILL: u8 = 0x04;
const CONNECT_WILL_RETAIN: u8 = 0x20;
const CONNECT_PASSWORD: u8 = 0x40;
const CONNECT_USERNAME: u8 = 0x80;

/// Errors produced while encoding or decoding packets.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The output buffer cannot hold the encoded packet.
    BufferTooSmall,
    /// The input ends before the packet does.
    Incomplete,
    /// The remaining length field uses more than four bytes.
    MalformedRemainingLength,
    /// The packet type nibble is reserved or not valid in this direction.
    InvalidPacketType,
    /// The fixed header flags do not match the packet type.
    InvalidFlags,
    /// A QoS value of 3 was found.
    InvalidQoS,
    /// A topic is not valid UTF-8.
    InvalidUtf8,
    /// A QoS 1 or 2 publish was encoded without a packet identifier.
    MissingPacketId,
    /// A length-prefixed string is longer than 65535 bytes.
    StringTooLong,
    /// The body does not match the layout of its packet type.
    Malformed,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::BufferTooSmall => "buffer too small",
            Error::Incomplete => "incomplete packet",
            Error::MalformedRemainingLength => "malformed remaining length",
            Error::InvalidPacketType => "invalid packet type",
            Error::InvalidFlags => "invalid fixed header flags",
            Error::InvalidQoS => "invalid QoS",
            Error::InvalidUtf8 => "invalid UTF-8 in topic",
            Error::MissingPacketId => "missing packet identifier",
            Error::StringTooLong => "string longer than 65535 bytes",
            Error::Malformed => "malformed packet body",
        };
        f.write_str(text)
    }
}

/// Quality of Service levels for MQTT messages.
///
/// QoS defines the guarantee of delivery for a specific message. Higher QoS levels
/// provide stronger delivery guarantees but require more network overhead and
/// client state management.
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::try_from(2u8), Ok(QoS::ExactlyOnce));
/// assert!(QoS::try_from(3u8).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    ///
    /// Fire and forget. The engine reports the publish as done once the bytes
    /// left the socket.
    #[default]
    AtMostOnce = 0,

    /// **QoS 1**: At least once delivery.
    ///
    /// Acknowledged with a single PUBACK. Duplicates can occur.
    AtLeastOnce = 1,

    /// **QoS 2**: Exactly once delivery.
    ///
    /// Four-way PUBLISH, PUBREC, PUBREL, PUBCOMP handshake.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(Error::InvalidQoS),
        }
    }
}

// Configuration documents carry QoS as the numeric level.
impl<'de> Deserialize<'de> for QoS {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = u8::deserialize(deserializer)?;
        QoS::try_from(level).map_err(|_| serde::de::Error::custom("QoS must be 0, 1 or 2"))
    }
}

/// MQTT control packet types, as carried in the upper nibble of the first byte.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketType {
    /// Client request to connect to a server.
    Connect = 1,
    /// Connect acknowledgment.
    Connack = 2,
    /// Publish message.
    Publish = 3,
    /// Publish acknowledgment (QoS 1).
    Puback = 4,
    /// Publish received (QoS 2, part 1).
    Pubrec = 5,
    /// Publish release (QoS 2, part 2).
    Pubrel = 6,
    /// Publish complete (QoS 2, part 3).
    Pubcomp = 7,
    /// Subscribe request.
    Subscribe = 8,
    /// Subscribe acknowledgment.
    Suback = 9,
    /// Unsubscribe request.
    Unsubscribe = 10,
    /// Unsubscribe acknowledgment.
    Unsuback = 11,
    /// Ping request.
    Pingreq = 12,
    /// Ping response.
    Pingresp = 13,
    /// Client is disconnecting.
    Disconnect = 14,
}

impl PacketType {
    /// Map the upper nibble of a fixed header byte to a packet type.
    pub fn from_nibble(nibble: u8) -> Result<Self, Error> {
        Ok(match nibble {
            1 => PacketType::Connect,
            2 => PacketType::Connack,
            3 => PacketType::Publish,
            4 => PacketType::Puback,
            5 => PacketType::Pubrec,
            6 => PacketType::Pubrel,
            7 => PacketType::Pubcomp,
            8 => PacketType::Subscribe,
            9 => PacketType::Suback,
            10 => PacketType::Unsubscribe,
            11 => PacketType::Unsuback,
            12 => PacketType::Pingreq,
            13 => PacketType::Pingresp,
            14 => PacketType::Disconnect,
            _ => return Err(Error::InvalidPacketType),
        })
    }

    /// First byte of the fixed header for this type with the given flags.
    pub const fn header_byte(self, flags: u8) -> u8 {
        ((self as u8) << 4) | (flags & 0x0F)
    }

    /// Flags every packet of this type must carry, `None` for PUBLISH whose
    /// flags are variable.
    pub const fn fixed_flags(self) -> Option<u8> {
        match self {
            PacketType::Publish => None,
            PacketType::Pubrel | PacketType::Subscribe | PacketType::Unsubscribe => Some(0x02),
            _ => Some(0x00),
        }
    }
}

/// The fixed header that starts every control packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixedHeader {
    /// Packet type from the upper nibble.
    pub packet_type: PacketType,
    /// Flags from the lower nibble.
    pub flags: u8,
    /// Number of bytes following the fixed header.
    pub remaining_len: usize,
    /// Size of the fixed header itself, 2 to 5 bytes.
    pub header_len: usize,
}

impl FixedHeader {
    /// Parse a fixed header from the start of `buf`.
    ///
    /// Returns [`Error::Incomplete`] when `buf` ends inside the header.
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        let first = *buf.first().ok_or(Error::Incomplete)?;
        let packet_type = PacketType::from_nibble(first >> 4)?;
        let (remaining_len, len_bytes) = decode_remaining_length(&buf[1..])?;
        Ok(Self {
            packet_type,
            flags: first & 0x0F,
            remaining_len,
            header_len: 1 + len_bytes,
        })
    }

    /// Total size of the packet on the wire.
    pub const fn frame_len(&self) -> usize {
        self.header_len + self.remaining_len
    }
}

/// One complete packet cut out of a byte stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Frame<'a> {
    /// The decoded fixed header.
    pub header: FixedHeader,
    /// Exactly `header.remaining_len` bytes following the fixed header.
    pub body: &'a [u8],
}

/// Cut the first complete packet out of `buf`.
///
/// Bytes after the packet are left untouched; the caller advances by
/// [`FixedHeader::frame_len`].
pub fn decode(buf: &[u8]) -> Result<Frame<'_>, Error> {
    let header = FixedHeader::parse(buf)?;
    let body = buf
        .get(header.header_len..header.frame_len())
        .ok_or(Error::Incomplete)?;
    Ok(Frame { header, body })
}

/// Decode a variable-length remaining length field.
///
/// Returns the value and the number of bytes it occupied.
pub fn decode_remaining_length(buf: &[u8]) -> Result<(usize, usize), Error> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, &byte) in buf.iter().enumerate() {
        if i == 4 {
            return Err(Error::MalformedRemainingLength);
        }
        value += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }
    if buf.len() >= 4 {
        Err(Error::MalformedRemainingLength)
    } else {
        Err(Error::Incomplete)
    }
}

/// Encode the remaining length field for an MQTT packet.
///
/// The encoding uses up to 4 bytes where each byte encodes 7 bits of the length
/// value. The most significant bit indicates if another byte follows.
///
/// This allows encoding values from 0 to 268,435,455 (0xFF,0xFF,0xFF,0x7F).
pub fn encode_remaining_length(buf: &mut [u8], mut len: usize) -> Result<usize, Error> {
    if len > MAX_REMAINING_LENGTH {
        return Err(Error::BufferTooSmall);
    }
    let mut written = 0;
    loop {
        let slot = buf.get_mut(written).ok_or(Error::BufferTooSmall)?;
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        *slot = byte;
        written += 1;
        if len == 0 {
            return Ok(written);
        }
    }
}

/// A PUBLISH packet, borrowed from the caller or from the receive buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Publish<'a> {
    /// Topic name.
    pub topic: &'a str,
    /// Packet identifier, present for QoS 1 and 2 only.
    pub packet_id: Option<u16>,
    /// Application payload.
    pub payload: &'a [u8],
    /// Delivery guarantee.
    pub qos: QoS,
    /// Set when the message is a redelivery.
    pub dup: bool,
    /// Set when the server should retain the message.
    pub retain: bool,
}

/// A typed view of a server-to-client packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Packet<'a> {
    /// Connect acknowledgment.
    Connack {
        /// The server resumed a stored session.
        session_present: bool,
        /// Raw connect return code.
        return_code: u8,
    },
    /// Application message.
    Publish(Publish<'a>),
    /// QoS 1 acknowledgment.
    Puback(u16),
    /// QoS 2 publish received.
    Pubrec(u16),
    /// QoS 2 publish release.
    Pubrel(u16),
    /// QoS 2 publish complete.
    Pubcomp(u16),
    /// Subscribe acknowledgment.
    Suback {
        /// Identifier of the SUBSCRIBE being acknowledged.
        packet_id: u16,
        /// One return code per requested topic filter.
        return_codes: &'a [u8],
    },
    /// Unsubscribe acknowledgment.
    Unsuback(u16),
    /// Ping response.
    Pingresp,
}

impl<'a> Packet<'a> {
    /// Interpret a framed packet.
    ///
    /// Only packet types a server may send are accepted. Fixed header flags,
    /// exact body sizes and packet identifiers are validated.
    pub fn parse(frame: &Frame<'a>) -> Result<Self, Error> {
        let header = frame.header;
        let mut reader = Reader::new(frame.body);

        if header.packet_type == PacketType::Publish {
            let qos = QoS::try_from((header.flags >> 1) & 0x03)?;
            let dup = header.flags & 0x08 != 0;
            if dup && qos == QoS::AtMostOnce {
                return Err(Error::InvalidFlags);
            }
            let topic = reader.str()?;
            let packet_id = match qos {
                QoS::AtMostOnce => None,
                _ => Some(reader.packet_id()?),
            };
            return Ok(Packet::Publish(Publish {
                topic,
                packet_id,
                payload: reader.rest(),
                qos,
                dup,
                retain: header.flags & 0x01 != 0,
            }));
        }

        if header.packet_type.fixed_flags() != Some(header.flags) {
            return Err(Error::InvalidFlags);
        }

        let packet = match header.packet_type {
            PacketType::Connack => {
                let ack_flags = reader.u8()?;
                if ack_flags & 0xFE != 0 {
                    return Err(Error::Malformed);
                }
                Packet::Connack {
                    session_present: ack_flags & 0x01 != 0,
                    return_code: reader.u8()?,
                }
            }
            PacketType::Puback => Packet::Puback(reader.packet_id()?),
            PacketType::Pubrec => Packet::Pubrec(reader.packet_id()?),
            PacketType::Pubrel => Packet::Pubrel(reader.packet_id()?),
            PacketType::Pubcomp => Packet::Pubcomp(reader.packet_id()?),
            PacketType::Unsuback => Packet::Unsuback(reader.packet_id()?),
            PacketType::Suback => {
                let packet_id = reader.packet_id()?;
                let return_codes = reader.rest();
                if return_codes.is_empty() {
                    return Err(Error::Malformed);
                }
                return Ok(Packet::Suback {
                    packet_id,
                    return_codes,
                });
            }
            PacketType::Pingresp => Packet::Pingresp,
            _ => return Err(Error::InvalidPacketType),
        };

        if !reader.is_empty() {
            return Err(Error::Malformed);
        }
        Ok(packet)
    }

    /// The wire type of this packet.
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connack { .. } => PacketType::Connack,
            Packet::Publish(_) => PacketType::Publish,
            Packet::Puback(_) => PacketType::Puback,
            Packet::Pubrec(_) => PacketType::Pubrec,
            Packet::Pubrel(_) => PacketType::Pubrel,
            Packet::Pubcomp(_) => PacketType::Pubcomp,
            Packet::Suback { .. } => PacketType::Suback,
            Packet::Unsuback(_) => PacketType::Unsuback,
            Packet::Pingresp => PacketType::Pingresp,
        }
    }
}

/// Encode a CONNECT packet built from `info`.
pub fn encode_connect(buf: &mut [u8], info: &ClientInfo<'_>) -> Result<usize, Error> {
    let mut flags = 0;
    let mut remaining = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + info.id.len();

    if info.clean_session {
        flags |= CONNECT_CLEAN_SESSION;
    }
    if let Some(will) = &info.will {
        flags |= CONNECT_WILL | ((will.qos as u8) << 3);
        if will.retain {
            flags |= CONNECT_WILL_RETAIN;
        }
        remaining += 2 + will.topic.len() + 2 + will.message.len();
    }
    if let Some(user) = info.user {
        flags |= CONNECT_USERNAME;
        remaining += 2 + user.len();
    }
    if let Some(pass) = info.pass {
        flags |= CONNECT_PASSWORD;
        remaining += 2 + pass.len();
    }

    let mut writer = Writer::new(buf);
    writer.fixed_header(PacketType::Connect.header_byte(0), remaining)?;

    // --- Variable Header ---
    writer.prefixed(PROTOCOL_NAME)?;
    writer.u8(PROTOCOL_LEVEL)?;
    writer.u8(flags)?;
    writer.u16(info.keep_alive)?;

    // --- Payload ---
    writer.prefixed(info.id.as_bytes())?;
    if let Some(will) = &info.will {
        writer.prefixed(will.topic.as_bytes())?;
        writer.prefixed(will.message.as_bytes())?;
    }
    if let Some(user) = info.user {
        writer.prefixed(user.as_bytes())?;
    }
    if let Some(pass) = info.pass {
        writer.prefixed(pass.as_bytes())?;
    }
    Ok(writer.finish())
}

/// Encode a PUBLISH packet.
pub fn encode_publish(buf: &mut [u8], publish: &Publish<'_>) -> Result<usize, Error> {
    let packet_id = match publish.qos {
        QoS::AtMostOnce => None,
        _ => match publish.packet_id {
            Some(id) if id != 0 => Some(id),
            _ => return Err(Error::MissingPacketId),
        },
    };

    let mut flags = (publish.qos as u8) << 1;
    if publish.dup {
        flags |= 0x08;
    }
    if publish.retain {
        flags |= 0x01;
    }

    let mut remaining = 2 + publish.topic.len() + publish.payload.len();
    if packet_id.is_some() {
        remaining += 2;
    }

    let mut writer = Writer::new(buf);
    writer.fixed_header(PacketType::Publish.header_byte(flags), remaining)?;
    writer.prefixed(publish.topic.as_bytes())?;
    if let Some(id) = packet_id {
        writer.u16(id)?;
    }
    writer.bytes(publish.payload)?;
    Ok(writer.finish())
}

/// Encode a SUBSCRIBE packet for a single topic filter.
pub fn encode_subscribe(
    buf: &mut [u8],
    packet_id: u16,
    filter: &str,
    qos: QoS,
) -> Result<usize, Error> {
    let mut writer = Writer::new(buf);
    writer.fixed_header(
        PacketType::Subscribe.header_byte(0x02),
        2 + 2 + filter.len() + 1,
    )?;
    writer.u16(packet_id)?;
    writer.prefixed(filter.as_bytes())?;
    writer.u8(qos as u8)?;
    Ok(writer.finish())
}

/// Encode an UNSUBSCRIBE packet for a single topic filter.
pub fn encode_unsubscribe(buf: &mut [u8], packet_id: u16, filter: &str) -> Result<usize, Error> {
    let mut writer = Writer::new(buf);
    writer.fixed_header(
        PacketType::Unsubscribe.header_byte(0x02),
        2 + 2 + filter.len(),
    )?;
    writer.u16(packet_id)?;
    writer.prefixed(filter.as_bytes())?;
    Ok(writer.finish())
}

/// Encode one of the client-sent publish acknowledgments:
/// PUBACK, PUBREC, PUBREL or PUBCOMP.
pub fn encode_ack(buf: &mut [u8], packet_type: PacketType, packet_id: u16) -> Result<usize, Error> {
    let flags = match packet_type {
        PacketType::Puback | PacketType::Pubrec | PacketType::Pubcomp => 0x00,
        PacketType::Pubrel => 0x02,
        _ => return Err(Error::InvalidPacketType),
    };
    let mut writer = Writer::new(buf);
    writer.fixed_header(packet_type.header_byte(flags), 2)?;
    writer.u16(packet_id)?;
    Ok(writer.finish())
}

/// Encode a PINGREQ packet.
pub fn encode_pingreq(buf: &mut [u8]) -> Result<usize, Error> {
    let mut writer = Writer::new(buf);
    writer.fixed_header(PacketType::Pingreq.header_byte(0), 0)?;
    Ok(writer.finish())
}

/// Encode a DISCONNECT packet.
pub fn encode_disconnect(buf: &mut [u8]) -> Result<usize, Error> {
    let mut writer = Writer::new(buf);
    writer.fixed_header(PacketType::Disconnect.header_byte(0), 0)?;
    Ok(writer.finish())
}

/// Bounds-checked cursor over an output buffer.
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn fixed_header(&mut self, first: u8, remaining: usize) -> Result<(), Error> {
        self.u8(first)?;
        let tail = self.buf.get_mut(self.pos..).ok_or(Error::BufferTooSmall)?;
        self.pos += encode_remaining_length(tail, remaining)?;
        Ok(())
    }

    fn u8(&mut self, value: u8) -> Result<(), Error> {
        let slot = self.buf.get_mut(self.pos).ok_or(Error::BufferTooSmall)?;
        *slot = value;
        self.pos += 1;
        Ok(())
    }

    fn u16(&mut self, value: u16) -> Result<(), Error> {
        self.bytes(&value.to_be_bytes())
    }

    fn bytes(&mut self, data: &[u8]) -> Result<(), Error> {
        let end = self.pos + data.len();
        let dst = self
            .buf
            .get_mut(self.pos..end)
            .ok_or(Error::BufferTooSmall)?;
        dst.copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    /// A two-byte big-endian length followed by the data.
    fn prefixed(&mut self, data: &[u8]) -> Result<(), Error> {
        let len = u16::try_from(data.len()).map_err(|_| Error::StringTooLong)?;
        self.u16(len)?;
        self.bytes(data)
    }

    fn finish(self) -> usize {
        self.pos
    }
}

/// Bounds-checked cursor over a packet body.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, Error> {
        let value = *self.buf.get(self.pos).ok_or(Error::Malformed)?;
        self.pos += 1;
        Ok(value)
    }

    fn u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn packet_id(&mut self) -> Result<u16, Error> {
        match self.u16()? {
            0 => Err(Error::Malformed),
            id => Ok(id),
        }
    }

    fn str(&mut self) -> Result<&'a str, Error> {
        let len = self.u16()? as usize;
        let end = self.pos + len;
        let bytes = self.buf.get(self.pos..end).ok_or(Error::Malformed)?;
        self.pos = end;
        str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = self.buf.get(self.pos..).unwrap_or(&[]);
        self.pos = self.buf.len();
        rest
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_length_boundaries() {
        let cases: [(usize, &[u8]); 8] = [
            (0, &[0x00]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (16_383, &[0xFF, 0x7F]),
            (16_384, &[0x80, 0x80, 0x01]),
            (2_097_151, &[0xFF, 0xFF, 0x7F]),
            (2_097_152, &[0x80, 0x80, 0x80, 0x01]),
            (MAX_REMAINING_LENGTH, &[0xFF, 0xFF, 0xFF, 0x7F]),
        ];
        for (value, expected) in cases {
            let mut buf = [0u8; 4];
            let n = encode_remaining_length(&mut buf, value).unwrap();
            assert_eq!(&buf[..n], expected);
            assert_eq!(decode_remaining_length(expected), Ok((value, expected.len())));
        }
    }

    #[test]
    fn remaining_length_rejects_fifth_byte() {
        assert_eq!(
            decode_remaining_length(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(Error::MalformedRemainingLength)
        );
        assert_eq!(
            decode_remaining_length(&[0xFF, 0xFF, 0xFF, 0xFF]),
            Err(Error::MalformedRemainingLength)
        );
        assert_eq!(decode_remaining_length(&[0x80, 0x80]), Err(Error::Incomplete));
        assert_eq!(decode_remaining_length(&[]), Err(Error::Incomplete));
    }

    #[test]
    fn remaining_length_too_large_or_no_room() {
        let mut buf = [0u8; 4];
        assert_eq!(
            encode_remaining_length(&mut buf, MAX_REMAINING_LENGTH + 1),
            Err(Error::BufferTooSmall)
        );
        let mut small = [0u8; 1];
        assert_eq!(
            encode_remaining_length(&mut small, 200),
            Err(Error::BufferTooSmall)
        );
    }

    #[test]
    fn decode_waits_for_whole_packet() {
        let bytes = [0x40, 0x02, 0x00, 0x05];
        for end in 0..bytes.len() {
            assert_eq!(decode(&bytes[..end]), Err(Error::Incomplete));
        }
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.header.packet_type, PacketType::Puback);
        assert_eq!(frame.header.frame_len(), 4);
        assert_eq!(Packet::parse(&frame), Ok(Packet::Puback(5)));
    }

    #[test]
    fn reserved_packet_types_are_rejected() {
        assert_eq!(decode(&[0x00, 0x00]), Err(Error::InvalidPacketType));
        assert_eq!(decode(&[0xF0, 0x00]), Err(Error::InvalidPacketType));
    }

    #[test]
    fn connack_is_parsed() {
        let frame = decode(&[0x20, 0x02, 0x01, 0x05]).unwrap();
        assert_eq!(
            Packet::parse(&frame),
            Ok(Packet::Connack {
                session_present: true,
                return_code: 5
            })
        );
    }

    #[test]
    fn fixed_flags_are_enforced() {
        let bad_pubrel = decode(&[0x60, 0x02, 0x00, 0x01]).unwrap();
        assert_eq!(Packet::parse(&bad_pubrel), Err(Error::InvalidFlags));
        let pubrel = decode(&[0x62, 0x02, 0x00, 0x01]).unwrap();
        assert_eq!(Packet::parse(&pubrel), Ok(Packet::Pubrel(1)));
        let bad_puback = decode(&[0x41, 0x02, 0x00, 0x01]).unwrap();
        assert_eq!(Packet::parse(&bad_puback), Err(Error::InvalidFlags));
    }

    #[test]
    fn ack_body_size_and_id_are_checked() {
        let long = decode(&[0x40, 0x03, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(Packet::parse(&long), Err(Error::Malformed));
        let short = decode(&[0x40, 0x01, 0x00]).unwrap();
        assert_eq!(Packet::parse(&short), Err(Error::Malformed));
        let zero = decode(&[0x40, 0x02, 0x00, 0x00]).unwrap();
        assert_eq!(Packet::parse(&zero), Err(Error::Malformed));
    }

    #[test]
    fn publish_with_qos_three_is_rejected() {
        let frame = decode(&[0x36, 0x05, 0x00, 0x01, b'a', 0x00, 0x01]).unwrap();
        assert_eq!(Packet::parse(&frame), Err(Error::InvalidQoS));
    }

    #[test]
    fn dup_is_only_valid_above_qos_zero() {
        let qos0 = decode(&[0x38, 0x04, 0x00, 0x01, b'a', b'x']).unwrap();
        assert_eq!(Packet::parse(&qos0), Err(Error::InvalidFlags));

        let qos1 = decode(&[0x3A, 0x05, 0x00, 0x01, b'a', 0x00, 0x01]).unwrap();
        match Packet::parse(&qos1) {
            Ok(Packet::Publish(publish)) => assert!(publish.dup),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn publish_topic_must_fit_in_body() {
        let frame = decode(&[0x30, 0x03, 0x00, 0x09, b'a']).unwrap();
        assert_eq!(Packet::parse(&frame), Err(Error::Malformed));
    }

    #[test]
    fn client_packets_are_not_accepted_inbound() {
        let frame = decode(&[0xC0, 0x00]).unwrap();
        assert_eq!(Packet::parse(&frame), Err(Error::InvalidPacketType));
    }

    #[test]
    fn suback_needs_a_return_code() {
        let empty = decode(&[0x90, 0x02, 0x00, 0x01]).unwrap();
        assert_eq!(Packet::parse(&empty), Err(Error::Malformed));
        let ok = decode(&[0x90, 0x03, 0x00, 0x01, 0x80]).unwrap();
        assert_eq!(
            Packet::parse(&ok),
            Ok(Packet::Suback {
                packet_id: 1,
                return_codes: &[SUBACK_FAILURE]
            })
        );
    }

    #[test]
    fn pubrel_ack_carries_flag_bit() {
        let mut buf = [0u8; 4];
        assert_eq!(encode_ack(&mut buf, PacketType::Pubrel, 0x1234), Ok(4));
        assert_eq!(buf, [0x62, 0x02, 0x12, 0x34]);
        assert_eq!(
            encode_ack(&mut buf, PacketType::Suback, 1),
            Err(Error::InvalidPacketType)
        );
    }

    #[test]
    fn qos1_publish_needs_packet_id() {
        let mut buf = [0u8; 32];
        let publish = Publish {
            topic: "t",
            packet_id: None,
            payload: b"",
            qos: QoS::AtLeastOnce,
            dup: false,
            retain: false,
        };
        assert_eq!(encode_publish(&mut buf, &publish), Err(Error::MissingPacketId));
    }

    #[test]
    fn encoders_report_short_buffers() {
        let mut buf = [0u8; 1];
        assert_eq!(encode_pingreq(&mut buf), Err(Error::BufferTooSmall));
        let mut buf = [0u8; 8];
        assert_eq!(
            encode_subscribe(&mut buf, 1, "sensors/#", QoS::AtLeastOnce),
            Err(Error::BufferTooSmall)
        );
    }
}
