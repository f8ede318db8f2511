//! Framing and codec benchmarks
//!
//! Measures pure serialization and framing throughput without network I/O.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sonolink::io::{FramerPoll, MessageFramer};
use sonolink::protocol::message::WireMessage;
use sonolink::protocol::types::us_status::ProbeKind;
use sonolink::protocol::types::{ImageMessage, ImageScalarType, UsStatusMessage};

fn bench_us_status_serialize(c: &mut Criterion) {
    c.bench_function("us_status_serialize", |b| {
        b.iter(|| {
            let status = UsStatusMessage::with_kind(ProbeKind::Sector);
            let msg = WireMessage::new(status, "Probe").unwrap();
            black_box(msg.encode().unwrap())
        });
    });
}

fn bench_frame_image_stream(c: &mut Criterion) {
    let image =
        ImageMessage::new(ImageScalarType::Uint8, 1, [640, 480, 1], vec![0u8; 640 * 480]).unwrap();
    let encoded = WireMessage::new(image, "Probe").unwrap().encode().unwrap();

    c.bench_function("frame_10_image_messages", |b| {
        b.iter(|| {
            let mut buf = BytesMut::new();
            for _ in 0..10 {
                buf.extend_from_slice(&encoded);
            }

            let mut framer = MessageFramer::new(true);
            let mut count = 0;
            while let FramerPoll::Message(msg) = framer.poll_message(&mut buf).unwrap() {
                count += msg.body.len();
            }
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_us_status_serialize, bench_frame_image_stream);

criterion_main!(benches);
