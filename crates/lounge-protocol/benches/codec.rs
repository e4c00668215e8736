//! Codec benchmarks for lounge-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lounge_protocol::{codec, AuthEncoder, Credentials};

const CHAT_FRAME: &str = r#"42["msg",{"chan":3,"msg":{"from":{"mode":"@","nick":"alice"},"time":"2024-01-01T00:00:00.000Z","type":"message","text":"hey bridge, are you there?","highlight":true},"highlight":1,"unread":4}]"#;

fn bench_strip_wrapper(c: &mut Criterion) {
    let polling = r#"97:0{"sid":"f0uBqRSUeNQb0DpNAAAB","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":60000}2:40"#;

    let mut group = c.benchmark_group("strip_wrapper");
    group.throughput(Throughput::Bytes(polling.len() as u64));
    group.bench_function("polling_body", |b| {
        b.iter(|| codec::strip_wrapper(black_box(polling)))
    });
    group.finish();
}

fn bench_decode_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(CHAT_FRAME.len() as u64));
    group.bench_function("chat_message", |b| {
        b.iter(|| codec::decode(black_box(CHAT_FRAME)))
    });
    group.finish();
}

fn bench_encode_auth(c: &mut Criterion) {
    let encoder = AuthEncoder::new(Credentials::new("bridge", "correct horse battery staple"));

    c.bench_function("encode_auth", |b| b.iter(|| black_box(&encoder).encode()));
}

criterion_group!(
    benches,
    bench_strip_wrapper,
    bench_decode_event,
    bench_encode_auth
);
criterion_main!(benches);
