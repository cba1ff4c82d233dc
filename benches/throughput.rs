use bancho_proto::packets::server;
use bancho_proto::{frame, split_frames, Reader, Writer};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

fn public_message_payload() -> Vec<u8> {
    let mut w = Writer::new();
    w.string("sender");
    w.string("a reasonably sized chat message for benchmarking purposes");
    w.string("#osu");
    w.into_bytes()
}

fn encode_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let payload = public_message_payload();
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("frame_send_message", |b| {
        b.iter(|| frame(server::SEND_MESSAGE, &payload));
    });
    group.finish();
}

fn decode_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let framed = frame(server::SEND_MESSAGE, &public_message_payload());
    group.throughput(Throughput::Bytes(framed.len() as u64));
    group.bench_function("split_single_frame", |b| {
        b.iter(|| split_frames(&framed).unwrap());
    });

    let mut stream = Vec::new();
    for _ in 0..32 {
        stream.extend_from_slice(&frame(server::SEND_MESSAGE, &public_message_payload()));
    }
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("split_32_concatenated_frames", |b| {
        b.iter(|| split_frames(&stream).unwrap());
    });
    group.finish();
}

fn reader_writer_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_writer");
    group.bench_function("write_int_list_64", |b| {
        let ids: Vec<i32> = (0..64).collect();
        b.iter(|| {
            let mut w = Writer::new();
            w.int_list(&ids);
            w.into_bytes()
        });
    });

    let mut w = Writer::new();
    w.int_list(&(0..64).collect::<Vec<i32>>());
    let encoded = w.into_bytes();
    group.bench_function("read_int_list_64", |b| b.iter(|| Reader::new(&encoded).int_list().unwrap()));
    group.finish();
}

criterion_group!(benches, encode_benchmark, decode_benchmark, reader_writer_benchmark);
criterion_main!(benches);
