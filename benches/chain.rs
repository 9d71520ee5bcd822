//! Benchmarks for chained repetitions: `a*` repeated m times followed by
//! `b`, against `"a"`×N (never matches).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use regex_closure_memo::{MatcherMemory, Node, Pattern};

fn a_star_chain(m: usize) -> Pattern {
    let mut node = Node::literal("b");
    for _ in 0..m {
        node = Node::repetition(Node::literal("a")).then(node);
    }
    Pattern::new(node)
}

fn bench_subject_length(c: &mut Criterion) {
    let pattern = a_star_chain(3);
    let mut group = c.benchmark_group("a*a*a*b");
    for n in [10, 100, 1000] {
        let text = "a".repeat(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &text, |b, text| {
            let mut memory = MatcherMemory::default();
            b.iter(|| memory.matcher(&pattern, black_box(text)).is_match())
        });
    }
    group.finish();
}

fn bench_chain_length(c: &mut Criterion) {
    let text = "a".repeat(10);
    let mut group = c.benchmark_group("chain_length");
    for m in [1, 4, 16, 64, 256] {
        let pattern = a_star_chain(m);
        group.bench_with_input(BenchmarkId::from_parameter(m), &pattern, |b, pattern| {
            let mut memory = MatcherMemory::default();
            b.iter(|| memory.matcher(pattern, black_box(&text)).is_match())
        });
    }
    group.finish();
}

fn bench_memory_reuse(c: &mut Criterion) {
    let pattern = a_star_chain(3);
    let text = "a".repeat(200);

    c.bench_function("fresh_memory", |b| {
        b.iter(|| pattern.is_match(black_box(&text)))
    });

    c.bench_function("reused_memory", |b| {
        let mut memory = MatcherMemory::default();
        b.iter(|| memory.matcher(&pattern, black_box(&text)).is_match())
    });
}

criterion_group!(
    benches,
    bench_subject_length,
    bench_chain_length,
    bench_memory_reuse
);
criterion_main!(benches);
