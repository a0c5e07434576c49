use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use moveecho_codec::{decode, encode};
use moveecho_core::{ClientId, LocationSample, TransportTag};

const PEER_MESSAGE: &str = r#"{"clientId":"MoveEcho-5b0f6c9e-8d1a-4c55-9a4e-2f7d1b3e6a10","lat":37.7749,"lng":-122.4194,"type":"car","timestamp":1700000000000}"#;

const PEER_MESSAGE_WITH_EXTRAS: &str = r#"{"clientId":"MoveEcho-5b0f6c9e-8d1a-4c55-9a4e-2f7d1b3e6a10","lat":51.5074,"lng":-0.1278,"type":"walking","timestamp":1700000000000,"speed":1.4,"bearing":270.0,"accuracy":4.5}"#;

const MALFORMED: &str = r#"{"clientId":"MoveEcho-x","lat":37.7749,"lng":"west","type":"car","timestamp":1700000000000}"#;

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.bench_function("peer_message", |b| {
        b.iter(|| decode(black_box(PEER_MESSAGE.as_bytes())))
    });

    group.bench_function("with_extra_fields", |b| {
        b.iter(|| decode(black_box(PEER_MESSAGE_WITH_EXTRAS.as_bytes())))
    });

    group.bench_function("malformed", |b| {
        b.iter(|| decode(black_box(MALFORMED.as_bytes())))
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let id = ClientId::generate("MoveEcho");
    let sample = LocationSample::new(37.7749, -122.4194, 1_700_000_000_000);

    for tag in TransportTag::ALL {
        group.bench_with_input(BenchmarkId::new("sample", tag.as_str()), &tag, |b, tag| {
            b.iter(|| encode(black_box(&id), black_box(&sample), *tag))
        });
    }

    group.bench_function("roundtrip", |b| {
        b.iter(|| {
            let bytes = encode(black_box(&id), black_box(&sample), TransportTag::Car).unwrap();
            decode(&bytes)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
