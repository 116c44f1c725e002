use criterion::{BenchmarkId, Criterion, Throughput};
use libmqtt::network::application::mqtt::QoS;
use libmqtt::network::application::mqtt::packet::{self, Packet, Publish};
use std::hint::black_box;

const PAYLOAD_SIZES: [usize; 3] = [16, 256, 4096];

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_publish");
    let mut buf = vec![0u8; 8192];
    for size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let publish = Publish {
                    topic: "libmqtt/bench-topic",
                    packet_id: Some(1),
                    payload,
                    qos: QoS::AtLeastOnce,
                    dup: false,
                    retain: false,
                };
                packet::encode_publish(black_box(&mut buf), black_box(&publish))
                    .expect("Failed to encode")
            })
        });
    }
    group.finish();
}

pub fn bench_decode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_publish");
    for size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        let mut buf = vec![0u8; size + 64];
        let publish = Publish {
            topic: "libmqtt/bench-topic",
            packet_id: Some(1),
            payload: &payload,
            qos: QoS::AtLeastOnce,
            dup: false,
            retain: false,
        };
        let len = packet::encode_publish(&mut buf, &publish).expect("Failed to encode");
        let wire = &buf[..len];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            b.iter(|| {
                let frame = packet::decode(black_box(wire)).expect("Failed to decode");
                Packet::parse(&frame).expect("Failed to parse")
            })
        });
    }
    group.finish();
}
