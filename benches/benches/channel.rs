use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use spa::{framed_channel, OscArg, OscMessage, OscReader, OscWriter};

fn framed_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("framed_channel");

    for size in [16usize, 256, 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("write_read_{size}"), |b| {
            let (mut writer, mut reader) = framed_channel(8192);
            let payload = vec![0x5au8; size];
            let mut scratch = vec![0u8; size];
            b.iter(|| {
                assert!(writer.write_with_length(black_box(&payload)));
                black_box(reader.read_msg(&mut scratch).unwrap());
            });
        });
    }

    group.finish();
}

fn osc_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("osc");

    group.bench_function("encode_gain", |b| {
        let mut buf = [0u8; 64];
        b.iter(|| spa::osc::encode(&mut buf, "/gain", black_box(&[OscArg::Float(0.5)])).unwrap());
    });

    let mut buf = [0u8; 128];
    let len = spa::osc::encode(
        &mut buf,
        "/mixer/channel",
        &[OscArg::Int(3), OscArg::Float(0.25), OscArg::Str("left")],
    )
    .unwrap();
    group.bench_function("parse_three_args", |b| {
        b.iter(|| {
            let msg = OscMessage::parse(black_box(&buf[..len])).unwrap();
            msg.args().count()
        });
    });

    group.bench_function("writer_to_reader", |b| {
        let (writer, reader) = framed_channel(4096);
        let mut writer = OscWriter::new(writer, 256);
        let mut reader = OscReader::new(reader, 256);
        b.iter(|| {
            writer.write("/gain", &[OscArg::Float(0.75)]).unwrap();
            reader.read_msg().unwrap();
            black_box(reader.message().unwrap().arg(0).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, framed_round_trip, osc_messages);
criterion_main!(benches);
