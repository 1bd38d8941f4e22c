//! Search engine benchmarks
//!
//! Run with: cargo bench --bench search_benchmarks

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use strata::config::{SearchConfig, StrataConfig};
use strata::decay::MemoryDecayService;
use strata::models::{MemoryRecord, MemoryType, PartitionKey, QueryType, SearchQuery};
use strata::search::tokenizer::tokenize;
use strata::search::{Bm25Index, HybridSearchEngine};
use tokio::runtime::Runtime;

const WORDS: &[&str] = &[
    "agent", "memory", "episode", "concept", "rust", "search", "index", "decay", "vector",
    "tenant", "layer", "query", "release", "deploy", "cluster", "context", "identity",
];

fn bench_record(i: usize) -> MemoryRecord {
    let content: Vec<&str> = (0..12).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect();
    let embedding: Vec<f32> = (0..32).map(|d| ((i + d) % 13) as f32 / 13.0).collect();
    MemoryRecord::builder("bench", content.join(" "), MemoryType::Semantic)
        .embedding(embedding)
        .build()
}

fn bench_tokenize(c: &mut Criterion) {
    let text = "The agent's memory layers index episodes, concepts and context for fast recall.";
    c.bench_function("tokenize_sentence", |b| b.iter(|| tokenize(black_box(text))));
}

fn bench_bm25(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_search");
    for size in [100usize, 1_000, 10_000] {
        let mut index = Bm25Index::new(SearchConfig::default().bm25);
        for i in 0..size {
            let record = bench_record(i);
            index.add(&record.id, &record.content);
        }
        let query = "rust memory decay";
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| index.search(black_box(query)))
        });
    }
    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let engine = HybridSearchEngine::new(SearchConfig::default()).expect("valid config");
    rt.block_on(async {
        for i in 0..2_000 {
            engine.index_record(&bench_record(i)).await.expect("index");
        }
    });

    let mut group = c.benchmark_group("engine_search");
    let partition = PartitionKey::new("bench", MemoryType::Semantic);
    let query_vector: Vec<f32> = (0..32).map(|d| (d % 13) as f32 / 13.0).collect();
    for query_type in [QueryType::Bm25, QueryType::Vector, QueryType::Hybrid] {
        let query = SearchQuery::new("deploy cluster release")
            .query_type(query_type)
            .embedding(query_vector.clone())
            .limit(10);
        group.bench_function(query_type.to_string(), |b| {
            b.to_async(&rt)
                .iter(|| async { engine.search(&partition, black_box(&query)).await })
        });
    }
    group.finish();
}

fn bench_decay(c: &mut Criterion) {
    let service = MemoryDecayService::new(&StrataConfig::default());
    let mut records: Vec<MemoryRecord> = (0..10_000).map(bench_record).collect();
    c.bench_function("update_decay_factors_10k", |b| {
        b.iter(|| service.update_decay_factors(black_box(&mut records)))
    });
}

criterion_group!(benches, bench_tokenize, bench_bm25, bench_engine, bench_decay);
criterion_main!(benches);
