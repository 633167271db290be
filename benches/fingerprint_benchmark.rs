//! Fingerprint benchmark: cost of the redundant-work short-circuit.
//!
//! Target: flat in document size, since only the head and tail are read

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use editsync::ContentFingerprint;

fn document(bytes: usize) -> String {
    "fn stream() { let token = next(); }\n".repeat(bytes / 36 + 1)
}

fn fingerprint_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint_compute");
    for size in [1_000, 100_000, 1_000_000] {
        let doc = document(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| ContentFingerprint::compute(black_box("main.rs"), black_box(doc), 100));
        });
    }
    group.finish();
}

fn fingerprint_compare(c: &mut Criterion) {
    let doc = document(100_000);
    let cached = ContentFingerprint::compute("main.rs", &doc, 100);

    c.bench_function("fingerprint_compare_unchanged", |b| {
        b.iter(|| ContentFingerprint::compute("main.rs", black_box(&doc), 100) == cached);
    });
}

fn fingerprint_unicode(c: &mut Criterion) {
    let doc = "héllo wörld 👋🏽 café\n".repeat(5_000);

    c.bench_function("fingerprint_graphemes", |b| {
        b.iter(|| ContentFingerprint::compute("notes.md", black_box(&doc), 100));
    });
}

criterion_group!(benches, fingerprint_by_size, fingerprint_compare, fingerprint_unicode);
criterion_main!(benches);
