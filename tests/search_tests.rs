mod support;

use meshcut::candidates::CandidateGenerator;
use meshcut::config::SegmentationConfig;
use meshcut::errors::SegmentationError;
use meshcut::search::{FallbackReason, SearchAlgorithm, Segmenter, segmenter_for};
use meshcut::traits::CSGOps;
use std::sync::Arc;
use support::{all_fit, block, total_volume};

fn run(config: &SegmentationConfig, mesh: &meshcut::Mesh) -> meshcut::search::SearchOutcome {
    let validated = config.validate().unwrap();
    let max_parts = meshcut::search::resolve_max_parts(&validated, &mesh.dimensions());
    segmenter_for(&validated, max_parts)
        .segment(Arc::new(mesh.clone()))
        .unwrap()
}

#[test]
fn greedy_parts_fit_and_keep_volume() {
    let mesh = block(600.0, 300.0, 100.0);
    let config = SegmentationConfig::default().with_greedy_search();
    let outcome = run(&config, &mesh);
    let parts: Vec<_> = outcome.path.parts.iter().map(|p| (**p).clone()).collect();

    assert_eq!(outcome.algorithm, SearchAlgorithm::Greedy);
    assert!(parts.len() >= 6);
    assert!(all_fit(&parts, &config.build_volume));
    assert!(support::approx_eq(total_volume(&parts), mesh.volume(), 1e-3 * mesh.volume()));
}

#[test]
fn beam_of_width_one_matches_greedy() {
    let mesh = block(500.0, 120.0, 80.0);
    let greedy = run(&SegmentationConfig::default().with_greedy_search(), &mesh);
    let beam = run(&SegmentationConfig::default().with_beam_search(1, 10, 30.0), &mesh);

    let planes = |o: &meshcut::search::SearchOutcome| -> Vec<_> {
        o.path.cuts.iter().map(|c| c.candidate.plane).collect()
    };
    assert_eq!(planes(&greedy), planes(&beam));
    assert!(support::approx_eq(greedy.path.score, beam.path.score, 1e-12));
}

#[test]
fn beam_never_scores_below_greedy() {
    let mesh = block(400.0, 300.0, 120.0).rotate(0.0, 0.0, 20.0);
    let greedy = run(&SegmentationConfig::default().with_greedy_search(), &mesh);
    let beam = run(&SegmentationConfig::default().with_beam_search(3, 10, 30.0), &mesh);
    assert!(beam.path.score >= greedy.path.score - 1e-12);
    assert!(beam.path.is_complete(&SegmentationConfig::default().build_volume));
}

#[test]
fn short_beam_budget_still_completes() {
    // Needs two cuts along X.
    let mesh = block(600.0, 100.0, 100.0);
    let config = SegmentationConfig::default().with_beam_search(3, 4, 1.0);
    let outcome = run(&config, &mesh);
    assert!(outcome.path.is_complete(&config.build_volume));
    assert!(outcome.path.parts.len() >= 3);
    assert_eq!(outcome.path.cuts.len() + 1, outcome.path.parts.len());
}

#[test]
fn shallow_beam_falls_back_to_greedy() {
    // Two cuts are needed, the beam may take only one.
    let mesh = block(600.0, 100.0, 100.0);
    let config = SegmentationConfig::default().with_beam_search(3, 1, 30.0);
    let outcome = run(&config, &mesh);
    assert_eq!(outcome.fallback, Some(FallbackReason::DepthLimit));
    assert_eq!(outcome.algorithm, SearchAlgorithm::Greedy);
    assert!(outcome.path.is_complete(&config.build_volume));
    assert_eq!(outcome.path.cuts.len(), 2);
}

#[test]
fn expired_budget_falls_back_to_greedy() {
    let mesh = block(600.0, 100.0, 100.0);
    let config = SegmentationConfig::default().with_beam_search(3, 10, 1e-9);
    let outcome = run(&config, &mesh);
    assert_eq!(outcome.fallback, Some(FallbackReason::Timeout));
    assert_eq!(outcome.algorithm, SearchAlgorithm::Greedy);
    assert!(outcome.path.is_complete(&config.build_volume));
    let parts: Vec<_> = outcome.path.parts.iter().map(|p| (**p).clone()).collect();
    assert!(all_fit(&parts, &config.build_volume));
}

#[test]
fn sphere_needs_no_more_parts_than_its_bounds() {
    let sphere = meshcut::Mesh::sphere(200.0, 32, 16, meshcut::mesh::polygon::FaceTag::Surface);
    let config = SegmentationConfig::default();
    let outcome = run(&config, &sphere);
    let estimate = config.build_volume.estimated_cuts(&sphere.dimensions()) + 1;
    let parts: Vec<_> = outcome.path.parts.iter().map(|p| (**p).clone()).collect();

    assert!(all_fit(&parts, &config.build_volume));
    assert!(parts.len() <= estimate, "{} parts, estimate {estimate}", parts.len());
    assert_ne!(outcome.fallback, Some(FallbackReason::DepthLimit));
}

#[test]
fn candidate_scores_are_normalised() {
    let mesh = block(300.0, 200.0, 150.0).rotate(0.0, 0.0, 30.0);
    let candidates = CandidateGenerator::new(&SegmentationConfig::default()).generate(&mesh);
    assert!(!candidates.is_empty());
    for c in &candidates {
        for score in [
            c.fit_score,
            c.utilization_score,
            c.balance_score,
            c.overhang_score,
            c.visibility_score,
            c.total_score,
        ] {
            assert!((0.0..=1.0).contains(&score), "score {score} out of range for {}", c.plane);
        }
    }
}

#[test]
fn part_limit_is_enforced() {
    let mesh = block(1000.0, 100.0, 100.0);
    let config = SegmentationConfig::default().with_greedy_search().with_max_parts(2);
    let validated = config.validate().unwrap();
    let result = segmenter_for(&validated, 2).segment(Arc::new(mesh));
    assert!(matches!(
        result,
        Err(SegmentationError::MaxPartsExceeded { max_parts: 2, .. })
    ));
}
