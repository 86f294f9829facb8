//! Cost of the raw control field accesses on a mapped cnc file.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use vigil_cnc::now_ms;
use vigil_perf::{ScratchCnc, default_handshake};

fn bench_writes(c: &mut Criterion) {
    let scratch = ScratchCnc::new("writes", default_handshake().unwrap()).unwrap();
    let cnc = &scratch.cnc;

    let mut group = c.benchmark_group("fields");
    group.throughput(Throughput::Elements(1));

    group.bench_function("timestamp_ordered", |b| {
        let mut ts = 1i64;
        b.iter(|| {
            ts += 1;
            cnc.timestamp_ordered(black_box(ts)).unwrap();
        });
    });

    group.bench_function("signal_ready", |b| {
        b.iter(|| cnc.signal_ready(black_box(0x0001_0000)).unwrap());
    });

    group.bench_function("heartbeat_with_clock", |b| {
        b.iter(|| cnc.timestamp_ordered(now_ms()).unwrap());
    });

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let scratch = ScratchCnc::new("reads", default_handshake().unwrap()).unwrap();
    let cnc = &scratch.cnc;
    cnc.timestamp_ordered(now_ms()).unwrap();
    cnc.signal_ready(0x0001_0000).unwrap();

    let mut group = c.benchmark_group("fields");
    group.throughput(Throughput::Elements(1));

    group.bench_function("version_volatile", |b| {
        b.iter(|| black_box(cnc.version_volatile().unwrap()));
    });
    group.bench_function("version_weak", |b| {
        b.iter(|| black_box(cnc.version_weak().unwrap()));
    });
    group.bench_function("timestamp_volatile", |b| {
        b.iter(|| black_box(cnc.timestamp_volatile().unwrap()));
    });
    group.bench_function("timestamp_weak", |b| {
        b.iter(|| black_box(cnc.timestamp_weak().unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_writes, bench_reads);
criterion_main!(benches);
