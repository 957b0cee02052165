//! Packet codec throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nodo_mesh::core::SensorSnapshot;
use nodo_mesh::protocol::{Message, PacketCodec};

fn bench_codec(c: &mut Criterion) {
    let codec = PacketCodec::new();
    let legacy = PacketCodec::with_legacy_frames();
    let report = Message::Report(SensorSnapshot::new(24.5, true, false));
    let relayed = Message::RelayedReport {
        local: SensorSnapshot::new(24.5, true, false),
        paired: SensorSnapshot::new(19.25, false, true),
    };
    let report_frame = codec.encode(&report);
    let relayed_frame = codec.encode(&relayed);

    c.bench_function("encode_report", |b| b.iter(|| codec.encode(black_box(&report))));
    c.bench_function("decode_report", |b| {
        b.iter(|| codec.decode(black_box(report_frame.as_bytes())))
    });
    c.bench_function("decode_relayed_report", |b| {
        b.iter(|| codec.decode(black_box(relayed_frame.as_bytes())))
    });
    c.bench_function("decode_legacy_temperature", |b| {
        b.iter(|| legacy.decode(black_box(&[0x00, 0x00, 0xc4, 0x41])))
    });
    c.bench_function("reject_truncated", |b| {
        b.iter(|| codec.decode(black_box(&report_frame.as_bytes()[..6])))
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
