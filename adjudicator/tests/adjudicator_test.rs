use adjudicator::schemas::{
    AdjudicationInput, CompetingAssertion, FactType, ResolutionStatus,
};
use adjudicator::weighted::WeightedAdjudicator;
use adjudicator::Adjudicator;
use std::collections::HashMap;
use std::sync::Arc;

fn conflict_input(values: &[(&str, f64, f64)]) -> AdjudicationInput {
    let assertions = values
        .iter()
        .enumerate()
        .map(|(i, (value, prior, penalty))| {
            let mut assertion = CompetingAssertion::new(
                format!("a{}", i),
                "person-1",
                FactType::Death,
                *value,
                "grp-1",
                *prior,
            );
            assertion.pattern_penalty = *penalty;
            assertion
        })
        .collect();

    AdjudicationInput {
        subject_id: "person-1".to_string(),
        subject_name: "Marta Jensen".to_string(),
        fact_type: FactType::Death,
        competing_assertions: assertions,
        subject_context: HashMap::new(),
    }
}

#[tokio::test]
async fn test_dispatch_through_trait_object() {
    let adjudicator: Arc<dyn Adjudicator> = Arc::new(WeightedAdjudicator::default());
    let verdict = adjudicator
        .adjudicate(&conflict_input(&[("1945", 0.9, 0.0), ("1947", 0.2, 0.1)]))
        .await
        .unwrap();

    assert_eq!(verdict.resolution_status, ResolutionStatus::Resolved);
    assert_eq!(verdict.current_winning_assertion_index, Some(0));
}

#[tokio::test]
async fn test_penalties_can_flip_the_ranking() {
    let adjudicator = WeightedAdjudicator::default();
    // The nominally heavier assertion carries a disqualifying penalty.
    let verdict = adjudicator
        .adjudicate(&conflict_input(&[("2150", 0.8, 0.3), ("1947", 0.75, 0.0)]))
        .await
        .unwrap();

    if let Some(winner) = verdict.current_winning_assertion_index {
        assert_eq!(winner, 1);
    } else {
        assert_ne!(verdict.resolution_status, ResolutionStatus::Resolved);
    }
}

#[tokio::test]
async fn test_pending_verdict_suggests_tie_breaker_queries() {
    let adjudicator = WeightedAdjudicator::default();
    let verdict = adjudicator
        .adjudicate(&conflict_input(&[("1945", 0.5, 0.0), ("1947", 0.5, 0.0)]))
        .await
        .unwrap();

    assert_eq!(verdict.resolution_status, ResolutionStatus::PendingReview);
    assert_eq!(verdict.tie_breaker_queries.len(), 2);
    assert!(verdict.tie_breaker_queries[0]
        .query_string
        .contains("Marta Jensen"));
    assert!(verdict.tie_breaker_queries[0].query_string.contains("death"));
}

#[test]
fn test_verdict_round_trips_through_json() {
    let raw = r#"{
        "resolution_status": "insufficient_evidence",
        "current_confidence": 0.15,
        "tie_breaker_queries": [{"query_string": "search civil registers"}],
        "analysis": "weak priors on both sides"
    }"#;

    let verdict: adjudicator::schemas::AdjudicationVerdict = serde_json::from_str(raw).unwrap();
    assert_eq!(
        verdict.resolution_status,
        ResolutionStatus::InsufficientEvidence
    );
    assert!(verdict.current_winning_assertion_index.is_none());

    let serialized = serde_json::to_string(&verdict).unwrap();
    assert!(serialized.contains("\"insufficient_evidence\""));
}
