/// Benchmarks for fusion, reranking and filtering over synthetic candidates
use codebase_rag::retrieval::{
    ConfidenceFilter, DiversityFilter, RankedList, Reranker, reciprocal_rank_fusion,
};
use codebase_rag::{ChunkRecord, ChunkType, SearchResult};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const NAMES: &[&str] = &[
    "authenticate_user",
    "parseUserData",
    "HttpServer",
    "load_config",
    "validate_token",
    "renderTemplate",
    "UserRepository",
    "hash_password",
];

/// Deterministic candidate list spread over a handful of files
fn candidates(count: usize, offset: usize) -> Vec<SearchResult> {
    (0..count)
        .map(|i| {
            let n = i + offset;
            let name = NAMES[n % NAMES.len()];
            let chunk_type = match n % 3 {
                0 => ChunkType::Function,
                1 => ChunkType::Method,
                _ => ChunkType::Class,
            };
            SearchResult::from_record(
                ChunkRecord {
                    id: format!("chunk_{}", n),
                    content: format!("def {}(*args):\n    return helper_{}(args)", name, n),
                    chunk_type,
                    name: name.to_string(),
                    parent_name: None,
                    file_path: format!("src/module_{}/{}.py", n % 7, name.to_lowercase()),
                    language: "python".to_string(),
                    line_start: n * 10,
                    line_end: n * 10 + 8,
                    description: (n % 2 == 0)
                        .then(|| format!("Handles {} for request {}", name.replace('_', " "), n)),
                },
                1.0 - (i as f32 / count as f32),
            )
        })
        .collect()
}

fn benchmark_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("rrf_fusion");

    for size in [10, 100, 1000] {
        let semantic = candidates(size, 0);
        let keyword = candidates(size, size / 2);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                reciprocal_rank_fusion(
                    black_box(vec![
                        RankedList::new("semantic", 0.7, semantic.clone()),
                        RankedList::new("keyword", 0.3, keyword.clone()),
                    ]),
                    60.0,
                )
            });
        });
    }

    group.finish();
}

fn benchmark_rerank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rerank");
    let reranker = Reranker::default();

    for size in [10, 100, 1000] {
        let results = candidates(size, 0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| reranker.rerank(black_box(results.clone()), "parse user data function"));
        });
    }

    group.finish();
}

fn benchmark_full_pipeline(c: &mut Criterion) {
    let reranker = Reranker::default();
    let confidence = ConfidenceFilter::default();
    let diversity = DiversityFilter::default();
    let semantic = candidates(50, 0);
    let keyword = candidates(50, 13);

    c.bench_function("fuse_rerank_filter_50", |b| {
        b.iter(|| {
            let fused = reciprocal_rank_fusion(
                vec![
                    RankedList::new("semantic", 0.7, semantic.clone()),
                    RankedList::new("keyword", 0.3, keyword.clone()),
                ],
                60.0,
            );
            let reranked = reranker.rerank(fused, black_box("authenticate user password"));
            let mut results = diversity.filter(confidence.filter(reranked));
            results.truncate(10);
            results
        });
    });
}

criterion_group!(
    benches,
    benchmark_fusion,
    benchmark_rerank,
    benchmark_full_pipeline
);
criterion_main!(benches);
