use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use trsift_core::RepeatPipeline;
use trsift_core::cluster::{OverlapRule, TieBreak, cluster};
use trsift_core::config::{FilterThresholds, PipelineConfig};
use trsift_core::detector::{NullModeller, TableDetector};
use trsift_core::filter::apply_filters;
use trsift_core::types::{Candidate, CandidateSet, RepeatScore, ScoreModel, Sequence};

use criterion_config::{
    BATCH_CANDIDATES_PER_PROTEIN, BATCH_PROTEINS, CANDIDATE_SET_SIZES, configure_batch_group,
    configure_criterion,
};

/// Deterministic candidates spread along a long protein, with runs of
/// overlapping neighbours and a mix of passing and failing scores
fn synthetic_candidates(count: usize) -> CandidateSet {
    let model = ScoreModel::default();
    (0..count)
        .map(|i| {
            let unit_len = 2 + i % 5;
            let copies = 2 + i % 4;
            let unit: String = "ACDEFGHIKLMNPQRSTVWY"
                .chars()
                .cycle()
                .skip(i % 20)
                .take(unit_len)
                .collect();
            let begin = 1 + i * 7;
            let pvalue = ((i * 37) % 100) as f64 / 1000.0;
            let divergence = ((i * 13) % 20) as f64 / 100.0;
            Candidate::from_alignment(begin, vec![unit; copies])
                .map(|c| c.with_score(model.clone(), RepeatScore::new(pvalue, divergence)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(CandidateSet::from)
        .unwrap_or_default()
}

fn benchmark_filter(c: &mut Criterion) {
    let model = ScoreModel::default();
    let specs = FilterThresholds {
        l_effective_max: Some(5.0),
        ..Default::default()
    }
    .pipeline_filters();

    let mut group = c.benchmark_group("filter");
    for size in CANDIDATE_SET_SIZES {
        let set = synthetic_candidates(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("apply_filters", size), &set, |b, set| {
            b.iter(|| apply_filters(black_box(set), &specs, &model));
        });
    }
    group.finish();
}

fn benchmark_cluster(c: &mut Criterion) {
    let tie_break = TieBreak::by_significance(ScoreModel::default());

    let mut group = c.benchmark_group("cluster");
    for size in CANDIDATE_SET_SIZES {
        let set = synthetic_candidates(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("shared_position", size), &set, |b, set| {
            b.iter(|| cluster(black_box(set), OverlapRule::SharedPosition, &tie_break));
        });
    }
    group.finish();
}

fn benchmark_batch(c: &mut Criterion) {
    let proteins: Vec<Sequence> = (0..BATCH_PROTEINS)
        .map(|i| Sequence::new(format!("P{i}"), "MACDEFGHIK"))
        .collect();
    let detector: TableDetector = proteins
        .iter()
        .map(|protein| (protein.id.clone(), synthetic_candidates(BATCH_CANDIDATES_PER_PROTEIN)))
        .collect();

    let mut group = c.benchmark_group("batch");
    configure_batch_group(&mut group);
    group.throughput(Throughput::Elements(proteins.len() as u64));
    for threads in [1, 4, 7] {
        let config = PipelineConfig {
            num_threads: threads,
            quiet: true,
            ..Default::default()
        };
        let Ok(pipeline) = RepeatPipeline::new(config, detector.clone(), NullModeller) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("threads", threads), &pipeline, |b, pipeline| {
            b.iter(|| pipeline.analyze_batch(black_box(&proteins)));
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = configure_criterion();
    targets = benchmark_filter, benchmark_cluster, benchmark_batch
);
criterion_main!(benches);
