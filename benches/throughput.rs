use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use recring::{HeapRegion, PeekFlags, RingBuffer};

fn bench_throughput(c: &mut Criterion) {
    let backing = HeapRegion::new_zeroed(1 << 20);
    let region = backing.region();
    let rb = RingBuffer::with_capacity(1 << 20).unwrap();
    let payload = [0x11u8; 64];
    let mut out = [0u8; 64];

    let mut group = c.benchmark_group("roundtrip_64b");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("push_pop", |b| {
        b.iter(|| {
            rb.push(&payload, &region).unwrap();
            rb.pop(&mut out, &region).unwrap()
        })
    });

    group.bench_function("push_peek_remove", |b| {
        b.iter(|| {
            rb.push(&payload, &region).unwrap();
            let record = rb.peek(PeekFlags::empty(), &region).unwrap();
            let len = record.len();
            record.remove();
            len
        })
    });

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
