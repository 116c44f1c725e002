//! Runs against a real broker. Set `TEST_MQTT_ADDRESS` (in the environment or
//! a `.env` file) and run with `cargo test -- --ignored`.

use dotenvy::dotenv;
use libmqtt::network::application::mqtt::{Client, ClientInfo, ConnectStatus, Event, QoS};
use libmqtt::network::error::Error;
use libmqtt::network::{Transport, TransportEvent};
use std::env;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

/// Blocking socket behind the event-driven seam: every call completes
/// immediately and the test loop reports the outcome back to the client.
#[derive(Debug, Default)]
struct NetTransport {
    stream: Option<TcpStream>,
    unconfirmed: usize,
    connected: Option<bool>,
    closed: bool,
    connack: Option<ConnectStatus>,
    completed: Vec<u32>,
    received: Vec<(String, Vec<u8>)>,
}

impl Transport for NetTransport {
    type Error = Error;

    fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        match TcpStream::connect((host, port)) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(Duration::from_millis(50)))
                    .map_err(|_| Error::InvalidAddress)?;
                self.stream = Some(stream);
                self.connected = Some(true);
            }
            Err(_) => self.connected = Some(false),
        }
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        stream.write_all(data).map_err(|_| Error::WriteError)?;
        self.unconfirmed += data.len();
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.stream = None;
        self.closed = true;
        Ok(())
    }
}

fn on_event(client: &mut Client<'_, NetTransport, u32>, event: &Event<'_, u32>) {
    let transport = client.transport_mut();
    match *event {
        Event::Connect { status } => transport.connack = Some(status),
        Event::Publish { arg, result } | Event::Subscribe { arg, result } => {
            assert_eq!(result, Ok(()));
            transport.completed.push(arg);
        }
        Event::PublishReceived { topic, payload, .. } => {
            transport.received.push((topic.to_string(), payload.to_vec()));
        }
        _ => {}
    }
}

/// Feed socket activity into the client until `done` holds or time runs out.
fn pump<F>(client: &mut Client<'_, NetTransport, u32>, start: Instant, done: F) -> bool
where
    F: Fn(&NetTransport) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut buf = [0u8; 512];
    while Instant::now() < deadline {
        let now = start.elapsed().as_millis() as u32;
        if let Some(ok) = client.transport_mut().connected.take() {
            let event = if ok {
                TransportEvent::Connected
            } else {
                TransportEvent::ConnectFailed
            };
            client.process(now, event);
        }
        let sent = std::mem::take(&mut client.transport_mut().unconfirmed);
        if sent > 0 {
            client.process(now, TransportEvent::Sent(sent));
        }
        let read = match client.transport_mut().stream.as_mut() {
            Some(stream) => stream.read(&mut buf).ok(),
            None => None,
        };
        match read {
            Some(0) => client.process(now, TransportEvent::Closed),
            Some(n) => client.process(now, TransportEvent::Received(&buf[..n])),
            None => {}
        }
        client.tick(now);
        if done(client.transport()) {
            return true;
        }
    }
    false
}

fn broker() -> (String, u16) {
    dotenv().ok();
    let address = env::var("TEST_MQTT_ADDRESS").unwrap_or("test.mosquitto.org:1883".to_string());
    let (host, port) = address.rsplit_once(':').expect("address must be host:port");
    (host.to_string(), port.parse().expect("invalid port"))
}

#[test]
#[ignore = "needs a reachable MQTT broker"]
fn publish_and_receive_through_broker() {
    let (host, port) = broker();
    let mut tx = [0u8; 512];
    let mut rx = [0u8; 512];
    let mut client: Client<'_, NetTransport, u32> =
        Client::new(NetTransport::default(), &mut tx, &mut rx);
    let start = Instant::now();

    let info = ClientInfo::new("libmqtt-live-test").with_keep_alive(10);
    client.connect(&host, port, on_event, &info).unwrap();
    assert!(pump(&mut client, start, |t| t.connack.is_some()));
    assert_eq!(client.transport().connack, Some(ConnectStatus::Accepted));

    client
        .subscribe("libmqtt/live-test", QoS::AtLeastOnce, 1)
        .unwrap();
    assert!(pump(&mut client, start, |t| t.completed.contains(&1)));

    client
        .publish("libmqtt/live-test", b"hello", QoS::ExactlyOnce, false, 2)
        .unwrap();
    assert!(pump(&mut client, start, |t| {
        t.completed.contains(&2) && !t.received.is_empty()
    }));
    assert_eq!(client.transport().received[0].1, b"hello".to_vec());

    client.disconnect().unwrap();
    assert!(pump(&mut client, start, |t| t.closed));
}
