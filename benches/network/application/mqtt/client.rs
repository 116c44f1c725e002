use criterion::{Criterion, Throughput};
use libmqtt::network::application::mqtt::{Client, ClientInfo, Event, QoS};
use libmqtt::network::{Transport, TransportEvent};
use std::hint::black_box;

/// Accepts everything and remembers how many bytes await confirmation.
#[derive(Debug, Default)]
struct NullTransport {
    unconfirmed: usize,
}

impl Transport for NullTransport {
    type Error = ();

    fn open(&mut self, _host: &str, _port: u16) -> Result<(), Self::Error> {
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.unconfirmed += data.len();
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

type BenchClient<'b> = Client<'b, NullTransport, u32>;

fn ignore(_client: &mut BenchClient<'_>, event: &Event<'_, u32>) {
    let _ = black_box(event);
}

fn confirm(client: &mut BenchClient<'_>) {
    let sent = std::mem::take(&mut client.transport_mut().unconfirmed);
    client.process(0, TransportEvent::Sent(sent));
}

fn setup_client<'b>(tx: &'b mut [u8], rx: &'b mut [u8]) -> BenchClient<'b> {
    let mut client = BenchClient::new(NullTransport::default(), tx, rx);
    let info = ClientInfo::new("libmqtt-bench").with_keep_alive(0);
    client
        .connect("bench.local", 1883, ignore, &info)
        .expect("Failed to connect");
    client.process(0, TransportEvent::Connected);
    confirm(&mut client);
    client.process(0, TransportEvent::Received(&[0x20, 0x02, 0x00, 0x00]));
    assert!(client.is_connected());
    client
}

pub fn bench_qos0_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("qos0_publish");
    let payload = b"hello from qos0";
    group.throughput(Throughput::Bytes(payload.len() as u64));

    let mut tx = [0u8; 1024];
    let mut rx = [0u8; 256];
    let mut client = setup_client(&mut tx, &mut rx);
    group.bench_function("publish_and_confirm", |b| {
        b.iter(|| {
            client
                .publish("libmqtt/bench-topic", payload, QoS::AtMostOnce, false, 0)
                .expect("Failed to publish");
            confirm(&mut client);
        })
    });
    group.finish();
}

pub fn bench_qos1_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("qos1_round_trip");
    let payload = b"hello from qos1";
    group.throughput(Throughput::Bytes(payload.len() as u64));

    let mut tx = [0u8; 1024];
    let mut rx = [0u8; 256];
    let mut client = setup_client(&mut tx, &mut rx);
    let mut packet_id: u16 = 0;
    group.bench_function("publish_puback", |b| {
        b.iter(|| {
            client
                .publish("libmqtt/bench-topic", payload, QoS::AtLeastOnce, false, 1)
                .expect("Failed to publish");
            confirm(&mut client);
            packet_id = packet_id.wrapping_add(1).max(1);
            let [hi, lo] = packet_id.to_be_bytes();
            client.process(0, TransportEvent::Received(&[0x40, 0x02, hi, lo]));
        })
    });
    group.finish();
}

pub fn bench_inbound_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("inbound_publish");
    let mut wire = vec![0x30, 0x16, 0x00, 0x0A];
    wire.extend_from_slice(b"bench/data");
    wire.extend_from_slice(b"0123456789");
    group.throughput(Throughput::Bytes(wire.len() as u64));

    let mut tx = [0u8; 1024];
    let mut rx = [0u8; 256];
    let mut client = setup_client(&mut tx, &mut rx);
    group.bench_function("dispatch", |b| {
        b.iter(|| client.process(0, TransportEvent::Received(black_box(&wire))))
    });
    group.finish();
}
