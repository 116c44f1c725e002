use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::application::mqtt::packet::bench_encode_publish,
    network::application::mqtt::packet::bench_decode_publish,
    network::application::mqtt::client::bench_qos0_publish,
    network::application::mqtt::client::bench_qos1_round_trip,
    network::application::mqtt::client::bench_inbound_publish
);
criterion_main!(benches);
