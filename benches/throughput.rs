use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use checkdisk::classify::Classifier;
use checkdisk::grammar::Grammar;
use checkdisk::lines::LineReader;

/// Scanner output with `redraws` progress updates, each erased by backspaces.
fn synthetic_output(redraws: usize) -> Vec<u8> {
    let mut out = b"Checking blocks 0 to 976762583\n".to_vec();
    for i in 0..redraws {
        let redraw = format!(
            "Checking for bad blocks (read-only test): {:>6.2}% done, {}:{:02} elapsed. ({}/0/0 errors)",
            (i as f64 * 100.0) / redraws as f64,
            i / 60,
            i % 60,
            i / 1000
        );
        out.extend_from_slice(redraw.as_bytes());
        out.extend(std::iter::repeat_n(0x08u8, redraw.len()));
    }
    out.extend_from_slice(b"Checking for bad blocks (read-only test): done\n");
    out.extend_from_slice(b"Pass completed, 0 bad blocks found. (0/0/0 errors)\n");
    out
}

fn bench_throughput(c: &mut Criterion) {
    let grammar = Grammar::builtin().expect("grammar");
    let classifier = Classifier::new(grammar);

    let mut group = c.benchmark_group("pipeline");
    for redraws in [1_000usize, 50_000usize] {
        let output = synthetic_output(redraws);
        group.throughput(Throughput::Bytes(output.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("reconstruct", redraws),
            &output,
            |b, output| {
                b.iter(|| LineReader::new(output.as_slice()).count());
            },
        );

        group.bench_with_input(
            BenchmarkId::new("reconstruct_classify", redraws),
            &output,
            |b, output| {
                b.iter(|| {
                    let mut events = Vec::with_capacity(redraws + 1);
                    classifier.fold_all(LineReader::new(output.as_slice()), &mut events)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
