use super::common::*;
use crate::workflows::quality::domain::ExifRecord;
use crate::workflows::quality::scoring::{
    compute_quality_index, geolocation, timeliness, DamageScorer, DamageTypeWeights,
    QualityIndexAggregator, QualityWeights, ScoringError, SeverityScores, SeverityThresholds,
    WeightedDamageScoring,
};

#[test]
fn identical_coordinates_score_full_location_accuracy() {
    let exif = exif_at(EXPECTED_LATITUDE, EXPECTED_LONGITUDE);
    let score = geolocation::score(&exif, &on_time_context(), 100.0);
    assert!((score - 1.0).abs() < 1e-4, "got {score}");
}

#[test]
fn missing_gps_scores_zero_location_accuracy() {
    let score = geolocation::score(&ExifRecord::default(), &on_time_context(), 100.0);
    assert_eq!(score, 0.0);
}

#[test]
fn photo_far_from_drop_off_scores_zero() {
    // Roughly 2.9 km east of the expected point.
    let exif = exif_at(EXPECTED_LATITUDE, -122.3864);
    assert_eq!(geolocation::score(&exif, &on_time_context(), 100.0), 0.0);
}

#[test]
fn early_delivery_is_fully_timely() {
    let ctx = context("2024-01-10T17:00:00Z", "2024-01-10T16:45:00Z");
    assert_eq!(timeliness::score(&ctx), 1.0);
}

#[test]
fn two_hours_late_is_half_timely() {
    let ctx = context("2024-01-10T17:00:00Z", "2024-01-10T19:00:00Z");
    assert!((timeliness::score(&ctx) - 0.5).abs() < 1e-12);
}

#[test]
fn quality_index_combines_weighted_components() {
    let metrics = compute_quality_index(
        &on_time_context(),
        &exif_at(EXPECTED_LATITUDE, EXPECTED_LONGITUDE),
        &predictions(&[("damage", 0.2)]),
        &QualityWeights::default(),
        100.0,
    )
    .expect("valid configuration");

    assert!((metrics.location_accuracy - 1.0).abs() < 1e-4);
    assert_eq!(metrics.timeliness, 1.0);
    assert!((metrics.damage - 0.8).abs() < 1e-12);
    assert!((metrics.quality_index - 0.92).abs() < 1e-4, "got {}", metrics.quality_index);
}

#[test]
fn unnormalized_weights_give_the_same_index() {
    let weights = QualityWeights {
        timeliness: 3.0,
        location_accuracy: 3.0,
        damage_score: 4.0,
    };
    let exif = exif_at(EXPECTED_LATITUDE, EXPECTED_LONGITUDE);
    let damage = predictions(&[("damage", 0.2)]);

    let scaled = compute_quality_index(&on_time_context(), &exif, &damage, &weights, 100.0)
        .expect("valid configuration");
    let baseline = compute_quality_index(
        &on_time_context(),
        &exif,
        &damage,
        &QualityWeights::default(),
        100.0,
    )
    .expect("valid configuration");

    assert!((scaled.quality_index - baseline.quality_index).abs() < 1e-12);
}

#[test]
fn quality_index_stays_in_unit_interval() {
    let aggregator = aggregator();
    for (delivered, damage) in [
        ("2024-01-10T16:00:00Z", 0.0),
        ("2024-01-10T18:30:00Z", 0.5),
        ("2024-01-11T17:00:00Z", 1.0),
    ] {
        let ctx = context("2024-01-10T17:00:00Z", delivered);
        let metrics = aggregator.aggregate(
            &ctx,
            &ExifRecord::default(),
            &predictions(&[("damage", damage)]),
        );
        assert!((0.0..=1.0).contains(&metrics.quality_index));
    }
}

#[test]
fn aggregator_rejects_invalid_configuration() {
    let zero = QualityWeights {
        timeliness: 0.0,
        location_accuracy: 0.0,
        damage_score: 0.0,
    };
    assert!(matches!(
        QualityIndexAggregator::new(&zero, 50.0, DamageScorer::Simple),
        Err(ScoringError::Weights(_))
    ));
    assert!(matches!(
        QualityIndexAggregator::new(&QualityWeights::default(), 0.0, DamageScorer::Simple),
        Err(ScoringError::InvalidMaxDistance(_))
    ));
}

#[test]
fn weighted_damage_mode_flows_through_the_aggregator() {
    let weighted = WeightedDamageScoring::new(
        DamageTypeWeights::default(),
        SeverityThresholds::default(),
        SeverityScores::default(),
    )
    .expect("default weighted scoring");
    let aggregator = QualityIndexAggregator::new(
        &QualityWeights::default(),
        100.0,
        DamageScorer::Weighted(weighted),
    )
    .expect("valid aggregator");

    let clean = aggregator.aggregate(
        &on_time_context(),
        &ExifRecord::default(),
        &predictions(&[
            ("leakage", 0.02),
            ("boxDeformation", 0.05),
            ("packagingIntegrity", 0.0),
            ("cornerDamage", 0.01),
        ]),
    );
    let crushed = aggregator.aggregate(
        &on_time_context(),
        &ExifRecord::default(),
        &predictions(&[
            ("leakage", 0.95),
            ("boxDeformation", 0.92),
            ("packagingIntegrity", 0.8),
            ("cornerDamage", 0.99),
        ]),
    );

    assert!((clean.damage - 0.95).abs() < 1e-9, "got {}", clean.damage);
    assert!(crushed.damage < clean.damage);
    assert!(crushed.quality_index < clean.quality_index);
}
