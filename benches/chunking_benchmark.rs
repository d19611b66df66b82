/// Benchmarks for boundary extraction and the chunking strategies
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vector_sync::embedding::{prepare_text, synthetic_vector};
use vector_sync::indexer::{ChunkingEngine, FileMeta};
use vector_sync::types::ChunkStrategy;

/// Rust source with `modules` modules of a struct, an impl and a free function each
fn generate_source(modules: usize) -> String {
    let mut source = String::new();
    for i in 0..modules {
        source.push_str(&format!(
            r#"
/// Module {i}
pub mod module_{i} {{
    pub fn function_{i}(x: i32) -> i32 {{
        x * {factor}
    }}

    pub struct Data{i} {{
        pub value: i32,
        pub name: String,
    }}

    impl Data{i} {{
        pub fn new(value: i32) -> Self {{
            Self {{
                value,
                name: format!("data_{{}}", value),
            }}
        }}

        pub fn process(&self) -> i32 {{
            self.value * 2
        }}
    }}
}}
"#,
            factor = i + 1
        ));
    }
    source
}

fn benchmark_boundaries(c: &mut Criterion) {
    let engine = ChunkingEngine::new(50).unwrap();
    let mut group = c.benchmark_group("boundaries");

    for modules in [10, 50, 200].iter() {
        let source = generate_source(*modules);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_modules", modules)),
            &source,
            |b, source| b.iter(|| engine.boundaries(black_box(source), "rust")),
        );
    }

    group.finish();
}

fn benchmark_strategies(c: &mut Criterion) {
    let engine = ChunkingEngine::new(50).unwrap();
    let source = generate_source(100);
    let meta = FileMeta {
        path: "src/generated.rs",
        language: "rust",
    };
    let mut group = c.benchmark_group("chunking");

    for strategy in [
        ChunkStrategy::FileLevel,
        ChunkStrategy::FunctionLevel,
        ChunkStrategy::ClassLevel,
        ChunkStrategy::SlidingWindow,
        ChunkStrategy::SlidingWindowWithHighOverlap,
        ChunkStrategy::Hybrid,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(strategy.as_str()),
            &strategy,
            |b, &strategy| b.iter(|| engine.chunk(black_box(&source), strategy, meta)),
        );
    }

    group.finish();
}

fn benchmark_text_preparation(c: &mut Criterion) {
    let source = generate_source(20);

    c.bench_function("prepare_text", |b| {
        b.iter(|| prepare_text(black_box(&source), 2048))
    });
    c.bench_function("synthetic_vector_768", |b| {
        b.iter(|| synthetic_vector(black_box(&source), 768))
    });
}

criterion_group!(
    benches,
    benchmark_boundaries,
    benchmark_strategies,
    benchmark_text_preparation
);
criterion_main!(benches);
