use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use psrecord::network::parse_line;
use psrecord::sampler::AggregatedSample;
use psrecord::sink::record_line;
use psrecord::system::process::{ProcessEntry, ProcessTree};
use psrecord::system::snapshot::ResourceSample;
use std::hint::black_box;

fn make_entries(n: usize) -> Vec<ProcessEntry> {
    (0..n)
        .map(|i| {
            let pid = i as u32 + 1;
            let ppid = if i == 0 { 0 } else { (i as u32 / 2) + 1 };
            ProcessEntry {
                pid,
                ppid,
                start_time: 1_700_000_000 + i as u64,
                name: format!("proc_{i}"),
                children: Vec::new(),
            }
        })
        .collect()
}

fn make_bandwhich_output(lines: usize) -> Vec<String> {
    (0..lines)
        .map(|i| {
            let name = if i % 4 == 0 { "python3" } else { "firefox" };
            format!(
                r#"process: <1700000000> "{name}" up/down Bytes: {}/{} connections: {}"#,
                i * 17,
                i * 131,
                i % 9
            )
        })
        .collect()
}

fn bench_process_tree_descendants(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_tree_descendants_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let entries = make_entries(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &entries, |b, entries| {
            b.iter(|| {
                let tree = ProcessTree::from_flat(black_box(entries.clone()));
                let found = tree.descendants(1).map(|d| d.len());
                black_box(found);
            })
        });
    }

    group.finish();
}

fn bench_network_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("network_parse_lines_100_1000");

    for size in [100usize, 1000] {
        let lines = make_bandwhich_output(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| {
                let total: usize = lines
                    .iter()
                    .map(|line| parse_line(black_box(line), "python").len())
                    .sum();
                black_box(total);
            })
        });
    }

    group.finish();
}

fn bench_aggregate_and_format(c: &mut Criterion) {
    let children: Vec<ResourceSample> = (0..64)
        .map(|i| ResourceSample {
            cpu_percent: i as f32 * 0.5,
            mem_resident_bytes: 4096 * (i + 1),
            mem_virtual_bytes: 65536 * (i + 1),
            io_read_bytes: 512 * i,
            io_write_bytes: 256 * i,
        })
        .collect();

    c.bench_function("aggregate_64_children_and_format_row", |b| {
        b.iter(|| {
            let mut total = ResourceSample::default();
            for child in black_box(&children) {
                total.merge(child);
            }
            let sample = AggregatedSample::from_total(1.5, &total);
            black_box(record_line(&sample));
        })
    });
}

criterion_group!(
    benches,
    bench_process_tree_descendants,
    bench_network_parse,
    bench_aggregate_and_format
);
criterion_main!(benches);
