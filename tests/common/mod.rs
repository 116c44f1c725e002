#![allow(dead_code)]

use libmqtt::network::application::mqtt::{Client, ClientInfo, ConnectStatus, Error, Event, QoS};
use libmqtt::network::error::Error as TransportError;
use libmqtt::network::{Transport, TransportEvent};

pub const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
pub const PINGREQ: [u8; 2] = [0xC0, 0x00];
pub const PINGRESP: [u8; 2] = [0xD0, 0x00];
pub const DISCONNECT: [u8; 2] = [0xE0, 0x00];

pub const PUBACK: u8 = 0x40;
pub const PUBREC: u8 = 0x50;
pub const PUBREL: u8 = 0x62;
pub const PUBCOMP: u8 = 0x70;
pub const UNSUBACK: u8 = 0xB0;

/// Everything the client reported, owned so it outlives the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Connect(ConnectStatus),
    Disconnect { is_accepted: bool },
    Publish { arg: u32, result: Result<(), Error> },
    Subscribe { arg: u32, result: Result<(), Error> },
    Unsubscribe { arg: u32, result: Result<(), Error> },
    PublishReceived {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        dup: bool,
        retain: bool,
    },
    KeepAlive,
}

impl From<&Event<'_, u32>> for Recorded {
    fn from(event: &Event<'_, u32>) -> Self {
        match *event {
            Event::Connect { status } => Recorded::Connect(status),
            Event::Disconnect { is_accepted } => Recorded::Disconnect { is_accepted },
            Event::Publish { arg, result } => Recorded::Publish { arg, result },
            Event::Subscribe { arg, result } => Recorded::Subscribe { arg, result },
            Event::Unsubscribe { arg, result } => Recorded::Unsubscribe { arg, result },
            Event::PublishReceived {
                topic,
                payload,
                qos,
                dup,
                retain,
            } => Recorded::PublishReceived {
                topic: topic.to_string(),
                payload: payload.to_vec(),
                qos,
                dup,
                retain,
            },
            Event::KeepAlive => Recorded::KeepAlive,
        }
    }
}

/// Transport that records what the engine asks of it.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub opened: Vec<(String, u16)>,
    pub sent: Vec<Vec<u8>>,
    pub closes: usize,
    pub events: Vec<Recorded>,
    pub fail_open: bool,
    pub fail_send: bool,
}

impl MockTransport {
    pub fn take_events(&mut self) -> Vec<Recorded> {
        std::mem::take(&mut self.events)
    }

    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MockTransport {
    type Error = TransportError;

    fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        if self.fail_open {
            return Err(TransportError::ConnectionRefused);
        }
        self.opened.push((host.to_string(), port));
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_send {
            return Err(TransportError::WriteError);
        }
        self.sent.push(data.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closes += 1;
        Ok(())
    }
}

pub type TestClient<'b> = Client<'b, MockTransport, u32>;

/// Event callback that stores every event in the transport.
pub fn record(client: &mut TestClient<'_>, event: &Event<'_, u32>) {
    client.transport_mut().events.push(Recorded::from(event));
}

/// Drive `client` through a complete, accepted connection at time `now` and
/// forget what was sent and reported on the way.
pub fn establish(client: &mut TestClient<'_>, info: &ClientInfo<'_>, now: u32) {
    client.connect("broker.test", 1883, record, info).unwrap();
    client.process(now, TransportEvent::Connected);
    confirm_in_flight(client, now);
    client.process(now, TransportEvent::Received(&CONNACK_ACCEPTED));
    assert!(client.is_connected());
    assert_eq!(
        client.transport_mut().take_events(),
        vec![Recorded::Connect(ConnectStatus::Accepted)]
    );
    client.transport_mut().take_sent();
}

/// Report the most recently handed chunk as fully sent.
pub fn confirm_in_flight(client: &mut TestClient<'_>, now: u32) {
    let len = client
        .transport()
        .sent
        .last()
        .map(Vec::len)
        .expect("nothing was sent");
    client.process(now, TransportEvent::Sent(len));
}

pub fn ack(kind: u8, packet_id: u16) -> [u8; 4] {
    let [hi, lo] = packet_id.to_be_bytes();
    [kind, 0x02, hi, lo]
}

pub fn suback(packet_id: u16, code: u8) -> [u8; 5] {
    let [hi, lo] = packet_id.to_be_bytes();
    [0x90, 0x03, hi, lo, code]
}

/// An inbound PUBLISH as the server would send it.
pub fn inbound_publish(topic: &str, packet_id: Option<u16>, payload: &[u8], qos: QoS) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    if let Some(id) = packet_id {
        body.extend_from_slice(&id.to_be_bytes());
    }
    body.extend_from_slice(payload);

    let mut packet = vec![0x30 | ((qos as u8) << 1)];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        packet.push(byte);
        if len == 0 {
            break;
        }
    }
    packet.extend_from_slice(&body);
    packet
}
