use adjudicator::schemas::{AdjudicationInput, AdjudicationVerdict, ResolutionStatus};
use adjudicator::weighted::WeightedAdjudicator;
use adjudicator::Adjudicator;
use async_trait::async_trait;
use kinsearch_core::record::RawRecord;
use kinsearch_core::trace::RunTrace;
use pipeline::schemas::ResolvedEntity;
use pipeline::verifier::EvidenceVerifier;
use serde_json::{json, Value};
use std::sync::Arc;

fn entity(id: &str, sources: &[&str], cluster_confidence: f64) -> ResolvedEntity {
    ResolvedEntity {
        entity_id: id.to_string(),
        record_ids: Vec::new(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        best_name: Some("John Smith".to_string()),
        best_birth_year: Some(1850),
        best_death_year: None,
        best_birth_place: None,
        record_count: sources.len(),
        source_count: sources.len(),
        cluster_confidence,
        corroboration_boost: 0.0,
    }
}

fn record(source: &str, id: &str, record_type: &str, hint: f64) -> RawRecord {
    RawRecord::new(source, id, record_type).with_confidence(hint)
}

#[tokio::test]
async fn test_even_conflict_stays_pending_and_contested() {
    let verifier =
        EvidenceVerifier::with_adjudicator(Arc::new(WeightedAdjudicator::default()));
    let subject = entity("e1", &["index_a", "index_b"], 0.6);
    let records = vec![
        record("index_a", "r1", "index", 0.6).with_field("birth_year", "1880"),
        record("index_b", "r2", "index", 0.6).with_field("birth_year", "1882"),
    ];
    let trace = RunTrace::new(Value::Null);

    let score = verifier.verify(&subject, &records, &trace).await;

    let birth = score
        .field_evidence
        .iter()
        .find(|f| f.field_name == "birth_year")
        .unwrap();
    assert!(birth.is_contested);
    assert!((birth.consensus_score - 0.5).abs() < f64::EPSILON);

    assert_eq!(score.conflicts.len(), 1);
    let conflict = &score.conflicts[0];
    assert_eq!(conflict.assertions.len(), 2);
    assert_eq!(
        conflict.verdict.resolution_status,
        ResolutionStatus::PendingReview
    );
    assert!(conflict
        .assertions
        .iter()
        .all(|a| a.status == ResolutionStatus::PendingReview));
    // Even split: each assertion carries half the prior weight.
    assert!(conflict
        .assertions
        .iter()
        .all(|a| (a.prior_weight - 0.5).abs() < f64::EPSILON));
}

#[tokio::test]
async fn test_clear_margin_resolves_and_forces_the_field() {
    let verifier =
        EvidenceVerifier::with_adjudicator(Arc::new(WeightedAdjudicator::default()));
    let subject = entity("e1", &["parish_register", "family_tree_site"], 0.7);
    let records = vec![
        record("parish_register", "r1", "image_marriage", 0.9)
            .with_field("marriage_year", "1902"),
        record("family_tree_site", "r2", "profile", 0.3).with_field("marriage_year", "1903"),
    ];
    let trace = RunTrace::new(Value::Null);

    let score = verifier.verify(&subject, &records, &trace).await;

    let conflict = &score.conflicts[0];
    assert_eq!(conflict.verdict.resolution_status, ResolutionStatus::Resolved);
    let winner = conflict.verdict.current_winning_assertion_index.unwrap();
    assert_eq!(conflict.assertions[winner].proposed_value, "1902");
    assert_eq!(
        conflict.assertions[winner].status,
        ResolutionStatus::Resolved
    );
    assert!(conflict
        .assertions
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != winner)
        .all(|(_, a)| a.status == ResolutionStatus::Rejected));

    let field = score
        .field_evidence
        .iter()
        .find(|f| f.field_name == "marriage_year")
        .unwrap();
    assert_eq!(field.best_value.as_deref(), Some("1902"));
    assert!(field.is_consensus);
    assert!(!field.is_contested);
}

struct FailingAdjudicator;

#[async_trait]
impl Adjudicator for FailingAdjudicator {
    async fn adjudicate(&self, _input: &AdjudicationInput) -> anyhow::Result<AdjudicationVerdict> {
        Err(anyhow::anyhow!("model endpoint unreachable"))
    }
}

#[tokio::test]
async fn test_adjudicator_failure_degrades_to_pending() {
    let verifier = EvidenceVerifier::with_adjudicator(Arc::new(FailingAdjudicator));
    let subject = entity("e1", &["index_a", "index_b"], 0.6);
    let records = vec![
        record("index_a", "r1", "index", 0.6).with_field("death_year", "1945"),
        record("index_b", "r2", "index", 0.6).with_field("death_year", "1947"),
    ];
    let trace = RunTrace::new(Value::Null);

    let score = verifier.verify(&subject, &records, &trace).await;

    let conflict = &score.conflicts[0];
    assert_eq!(
        conflict.verdict.resolution_status,
        ResolutionStatus::PendingReview
    );
    assert!(conflict.verdict.analysis.contains("adjudicator error"));
    // The field stays contested; no winner was forced.
    let field = score
        .field_evidence
        .iter()
        .find(|f| f.field_name == "death_year")
        .unwrap();
    assert!(field.is_contested);
}

#[tokio::test]
async fn test_firewall_drops_unsupported_claim_values() {
    let verifier = EvidenceVerifier::new();
    let subject = entity("e1", &["scraped_obituaries", "civil_register"], 0.6);

    let hallucinated = record("scraped_obituaries", "r1", "obituary", 0.8)
        .with_field("birth_year", "1880")
        .with_raw_data(json!({
            "source_text": "... died 1945, survived by two daughters ...",
            "claims": [{
                "field": "birth_year",
                "value": "1880",
                "citation_snippet": "born 1880 in Boston"
            }],
        }));
    let honest = record("civil_register", "r2", "image_birth", 0.7)
        .with_field("birth_year", "1882");

    let trace = RunTrace::new(Value::Null);
    let score = verifier.verify(&subject, &[hallucinated, honest], &trace).await;

    let birth = score
        .field_evidence
        .iter()
        .find(|f| f.field_name == "birth_year")
        .unwrap();
    // Only the supported observation remains; no conflict, full consensus.
    assert_eq!(birth.values.len(), 1);
    assert_eq!(birth.values[0].source, "civil_register");
    assert_eq!(birth.best_value.as_deref(), Some("1882"));
    assert!(birth.is_consensus);
    assert!(score.conflicts.is_empty());
}

#[tokio::test]
async fn test_supported_claim_survives_firewall() {
    let verifier = EvidenceVerifier::new();
    let subject = entity("e1", &["scraped_obituaries"], 0.6);

    let supported = record("scraped_obituaries", "r1", "obituary", 0.8)
        .with_field("birth_year", "1880")
        .with_raw_data(json!({
            "source_text": "John Smith, born 1880 in Boston, died 1945.",
            "claims": [{
                "field": "birth_year",
                "value": "1880",
                "citation_snippet": "born 1880 in Boston"
            }],
        }));

    let trace = RunTrace::new(Value::Null);
    let score = verifier.verify(&subject, &[supported], &trace).await;

    let birth = score
        .field_evidence
        .iter()
        .find(|f| f.field_name == "birth_year")
        .unwrap();
    assert_eq!(birth.best_value.as_deref(), Some("1880"));
}

#[tokio::test]
async fn test_low_consensus_contested_fields_require_review() {
    let verifier =
        EvidenceVerifier::with_adjudicator(Arc::new(WeightedAdjudicator::default()));
    let subject = entity("e1", &["index_a", "index_b"], 0.8);
    let records = vec![
        record("index_a", "r1", "index", 0.6)
            .with_field("birth_year", "1880")
            .with_field("death_year", "1945"),
        record("index_b", "r2", "index", 0.6)
            .with_field("birth_year", "1882")
            .with_field("death_year", "1947"),
    ];
    let trace = RunTrace::new(Value::Null);

    let score = verifier.verify(&subject, &records, &trace).await;

    assert!(score.requires_human_review);
    let reason = score.review_reason.as_deref().unwrap();
    assert!(reason.contains("birth_year"));
    assert!(reason.contains("death_year"));
    // overall = cluster_confidence * mean consensus = 0.8 * 0.5.
    assert!((score.overall_confidence - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn test_no_fields_yields_neutral_confidence() {
    let verifier = EvidenceVerifier::new();
    let subject = entity("e1", &["index_a"], 0.9);
    let records = vec![record("index_a", "r1", "index", 0.9)];
    let trace = RunTrace::new(Value::Null);

    let score = verifier.verify(&subject, &records, &trace).await;

    assert!(score.field_evidence.is_empty());
    assert!(!score.requires_human_review);
    assert!((score.overall_confidence - 0.45).abs() < 1e-9);
}
