use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use perfprobe::system::memory::HostMemory;
use perfprobe::system::ticks::{TickFrame, TickSnapshot};
use perfprobe::{CounterSource, SampleError, Sampler};
use std::fmt::Write;
use std::hint::black_box;

fn make_stat(cores: usize) -> String {
    let mut out = String::from("cpu  4705 356 584 3699 23 23 0 0 0 0\n");
    for i in 0..cores {
        let _ = writeln!(
            out,
            "cpu{i} {} {} {} {} 1 2 3 0 0 0",
            1000 + i * 7,
            i % 13,
            300 + i * 3,
            9000 - i
        );
    }
    out.push_str("intr 114930548 113199788 3 0 5 263 0 4\nctxt 1990473\nbtime 1062191376\n");
    out
}

/// Fixed counters; an empty core list leaves only the memory-based tiers.
struct FixedSource {
    cores: Vec<TickSnapshot>,
}

impl CounterSource for FixedSource {
    fn read_per_core_ticks(&self) -> Result<Vec<TickSnapshot>, SampleError> {
        if self.cores.is_empty() {
            return Err(SampleError::SourceUnavailable {
                source_name: "bench",
                reason: "no cores configured".into(),
            });
        }
        Ok(self.cores.clone())
    }

    fn read_host_memory(&self) -> Result<HostMemory, SampleError> {
        Ok(HostMemory {
            total: 16 * 1024 * 1024 * 1024,
            available: 5 * 1024 * 1024 * 1024,
        })
    }
}

fn bench_tick_frame_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_frame_parse_8_64_256");

    for cores in [8usize, 64, 256] {
        let stat = make_stat(cores);
        group.bench_with_input(BenchmarkId::from_parameter(cores), &stat, |b, stat| {
            b.iter(|| {
                let frame = TickFrame::read(black_box(stat.as_bytes()), "bench")
                    .expect("in-memory read cannot fail");
                black_box(frame);
            })
        });
    }

    group.finish();
}

fn bench_resolve_cpu(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_cpu_8_64_256");

    for cores in [8usize, 64, 256] {
        let frame = TickFrame::read(make_stat(cores).as_bytes(), "bench")
            .expect("in-memory read cannot fail");
        let sampler = Sampler::with_source(FixedSource {
            cores: frame.per_core,
        });
        group.bench_with_input(BenchmarkId::from_parameter(cores), &sampler, |b, sampler| {
            b.iter(|| black_box(sampler.sample_cpu()))
        });
    }

    group.finish();
}

fn bench_fallback_to_estimate(c: &mut Criterion) {
    let sampler = Sampler::with_source(FixedSource { cores: Vec::new() });
    c.bench_function("resolve_cpu_memory_pressure", |b| {
        b.iter(|| black_box(sampler.sample_cpu()))
    });
}

criterion_group!(
    benches,
    bench_tick_frame_parse,
    bench_resolve_cpu,
    bench_fallback_to_estimate
);
criterion_main!(benches);
