use crate::schemas::{
    ConflictResolution, EvidenceScore, FieldEvidence, FieldObservation, ResolvedEntity,
};
use adjudicator::firewall::{claim_passes, ExtractedClaim};
use adjudicator::policy::{
    DefaultPatternDetector, ErrorPatternDetector, InverseGapBonus, TemporalBonusPolicy,
};
use adjudicator::schemas::{
    AdjudicationInput, AdjudicationVerdict, CompetingAssertion, FactType, ResolutionStatus,
};
use adjudicator::Adjudicator;
use chrono::NaiveDate;
use kinsearch_core::ids;
use kinsearch_core::normalize::{extract_year, normalize_value};
use kinsearch_core::record::RawRecord;
use kinsearch_core::trace::{AgentRole, RunTrace, TraceEventType};
use serde_json::{json, Value};
use sources::source::Tier;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Evaluates evidence quality per GPS standards: tier classification,
/// per-field weighted consensus, conflict adjudication, and the compliance
/// score. Never errors; malformed fields simply contribute nothing.
pub struct EvidenceVerifier {
    adjudicator: Option<Arc<dyn Adjudicator>>,
    patterns: Arc<dyn ErrorPatternDetector>,
    temporal: Arc<dyn TemporalBonusPolicy>,
    strict_citations: bool,
}

impl EvidenceVerifier {
    pub fn new() -> Self {
        Self {
            adjudicator: None,
            patterns: Arc::new(DefaultPatternDetector),
            temporal: Arc::new(InverseGapBonus),
            strict_citations: true,
        }
    }

    pub fn with_adjudicator(adjudicator: Arc<dyn Adjudicator>) -> Self {
        Self {
            adjudicator: Some(adjudicator),
            ..Self::new()
        }
    }

    pub fn pattern_detector(mut self, detector: Arc<dyn ErrorPatternDetector>) -> Self {
        self.patterns = detector;
        self
    }

    pub fn temporal_policy(mut self, policy: Arc<dyn TemporalBonusPolicy>) -> Self {
        self.temporal = policy;
        self
    }

    pub fn strict_citations(mut self, strict: bool) -> Self {
        self.strict_citations = strict;
        self
    }

    pub async fn verify(
        &self,
        entity: &ResolvedEntity,
        records: &[RawRecord],
        trace: &RunTrace,
    ) -> EvidenceScore {
        let started = Instant::now();

        let mut original_count = 0usize;
        let mut derivative_count = 0usize;
        let mut authored_count = 0usize;
        for record in records {
            match classify_source(record) {
                Tier::Original => original_count += 1,
                Tier::Derivative => derivative_count += 1,
                Tier::Authored => authored_count += 1,
            }
        }

        let mut field_evidence = self.evaluate_fields(records);
        let conflicts = self.adjudicate_conflicts(entity, &mut field_evidence).await;

        let contested_count = field_evidence.iter().filter(|f| f.is_contested).count();
        let consensus_count = field_evidence.iter().filter(|f| f.is_consensus).count();

        let avg_consensus = if field_evidence.is_empty() {
            0.5
        } else {
            field_evidence.iter().map(|f| f.consensus_score).sum::<f64>()
                / field_evidence.len() as f64
        };

        let gps_compliance_score = gps_score(
            original_count,
            derivative_count,
            authored_count,
            contested_count,
            consensus_count,
            entity.source_count,
        );

        let requires_human_review = contested_count > 0 && avg_consensus < 0.6;
        let review_reason = requires_human_review.then(|| {
            let names: Vec<&str> = field_evidence
                .iter()
                .filter(|f| f.is_contested)
                .map(|f| f.field_name.as_str())
                .collect();
            format!("Contested fields: {}", names.join(", "))
        });

        let result = EvidenceScore {
            entity_id: entity.entity_id.clone(),
            field_evidence,
            conflicts,
            overall_confidence: (entity.cluster_confidence * avg_consensus).min(1.0),
            gps_compliance_score,
            original_source_count: original_count,
            derivative_source_count: derivative_count,
            authored_source_count: authored_count,
            requires_human_review,
            review_reason,
        };

        trace.add_event_timed(
            TraceEventType::EvidenceVerified,
            AgentRole::Verifier,
            format!(
                "Verified entity {}: confidence={:.2}, GPS={:.2}",
                entity.entity_id, result.overall_confidence, result.gps_compliance_score
            ),
            json!({
                "entity_id": entity.entity_id,
                "confidence": result.overall_confidence,
                "gps_score": result.gps_compliance_score,
                "contested_fields": contested_count,
                "requires_review": result.requires_human_review,
            }),
            started.elapsed().as_secs_f64() * 1000.0,
        );

        result
    }

    /// Builds weighted observations for every field any record reports,
    /// then folds each field into consensus evidence. Field order is first
    /// encounter with names sorted per record, so it is deterministic.
    fn evaluate_fields(&self, records: &[RawRecord]) -> Vec<FieldEvidence> {
        let mut order: Vec<String> = Vec::new();
        let mut observations: HashMap<String, Vec<FieldObservation>> = HashMap::new();

        for record in records {
            let tier = classify_source(record);
            let confidence = record.confidence_hint.unwrap_or(0.5);
            let weight = tier.weight() * confidence;
            let source_date = source_date_of(record);

            let fields = self.screened_fields(record);
            let mut names: Vec<&String> = fields.keys().collect();
            names.sort();

            for name in names {
                let value = &fields[name];
                if value.trim().is_empty() {
                    continue;
                }
                let bucket = observations.entry(name.clone()).or_default();
                if bucket.is_empty() {
                    order.push(name.clone());
                }
                bucket.push(FieldObservation {
                    value: value.clone(),
                    source: record.source.clone(),
                    tier,
                    confidence,
                    weight,
                    source_date,
                });
            }
        }

        order
            .into_iter()
            .map(|name| {
                let obs = observations.remove(&name).unwrap_or_default();
                build_field_evidence(&name, obs)
            })
            .collect()
    }

    /// Hallucination firewall. Records that carry extraction provenance
    /// (`raw_data.source_text` + `raw_data.claims`) only contribute a field
    /// when some claim for it quotes text actually present in the source.
    fn screened_fields(&self, record: &RawRecord) -> HashMap<String, String> {
        let mut fields = record.extracted_fields.clone();
        if !self.strict_citations {
            return fields;
        }

        let Some(source_text) = record.raw_data.get("source_text").and_then(Value::as_str)
        else {
            return fields;
        };
        let Some(raw_claims) = record.raw_data.get("claims").and_then(Value::as_array) else {
            return fields;
        };

        let mut supported: HashMap<String, bool> = HashMap::new();
        for raw in raw_claims {
            let Ok(claim) = serde_json::from_value::<ExtractedClaim>(raw.clone()) else {
                continue;
            };
            let entry = supported.entry(claim.field.clone()).or_insert(false);
            *entry = *entry || claim_passes(&claim, source_text);
        }

        fields.retain(|name, _| supported.get(name).copied().unwrap_or(true));
        fields
    }

    /// Creates one competing assertion per distinct value on fact-type
    /// fields with more than one observed value, and asks the adjudicator to
    /// pick. A resolved verdict forces the field to the winner; every other
    /// status leaves the conflict standing.
    async fn adjudicate_conflicts(
        &self,
        entity: &ResolvedEntity,
        field_evidence: &mut [FieldEvidence],
    ) -> Vec<ConflictResolution> {
        let mut conflicts = Vec::new();

        for evidence in field_evidence.iter_mut() {
            let Some(fact_type) = FactType::from_field_name(&evidence.field_name) else {
                continue;
            };

            let groups = group_observations(&evidence.values);
            if groups.len() < 2 {
                continue;
            }

            let conflict_group_id =
                ids::content_id(&[entity.entity_id.as_str(), evidence.field_name.as_str()]);
            let total_weight: f64 = groups.iter().map(|g| g.weight).sum();

            let mut context = HashMap::new();
            if let Some(birth_year) = entity.best_birth_year {
                context.insert("birth_year".to_string(), birth_year.to_string());
            }

            let assertions: Vec<CompetingAssertion> = groups
                .iter()
                .map(|group| {
                    let prior_weight = if total_weight > 0.0 {
                        group.weight / total_weight
                    } else {
                        0.0
                    };
                    let mut assertion = CompetingAssertion::new(
                        ids::content_id(&[
                            entity.entity_id.as_str(),
                            evidence.field_name.as_str(),
                            group.key.as_str(),
                        ]),
                        entity.entity_id.clone(),
                        fact_type,
                        group.champion.value.clone(),
                        conflict_group_id.clone(),
                        prior_weight,
                    );

                    if let (Some(source_date), Some(event_date)) =
                        (group.champion.source_date, event_date_of(&group.champion.value))
                    {
                        assertion.temporal_proximity_bonus =
                            self.temporal.bonus(source_date, event_date);
                    }

                    let detected =
                        self.patterns.detect(fact_type, &group.champion.value, &context);
                    assertion.pattern_penalty = detected.iter().map(|p| p.penalty).sum();
                    assertion.detected_patterns =
                        detected.into_iter().map(|p| p.tag).collect();

                    assertion
                })
                .collect();

            let input = AdjudicationInput {
                subject_id: entity.entity_id.clone(),
                subject_name: entity.best_name.clone().unwrap_or_default(),
                fact_type,
                competing_assertions: assertions.clone(),
                subject_context: context,
            };

            let verdict = match &self.adjudicator {
                None => AdjudicationVerdict::pending(
                    "no adjudicator configured; manual review required",
                ),
                Some(adjudicator) => match adjudicator.adjudicate(&input).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!(
                            field = %evidence.field_name,
                            "adjudicator failed, conflict preserved: {}", e
                        );
                        AdjudicationVerdict::pending(format!("adjudicator error: {}", e))
                    }
                },
            };

            let mut final_assertions = assertions;
            if verdict.resolution_status == ResolutionStatus::Resolved {
                if let Some(winner) = verdict.current_winning_assertion_index {
                    if winner < final_assertions.len() {
                        for (index, assertion) in final_assertions.iter_mut().enumerate() {
                            assertion.status = if index == winner {
                                ResolutionStatus::Resolved
                            } else {
                                ResolutionStatus::Rejected
                            };
                        }
                        evidence.best_value =
                            Some(final_assertions[winner].proposed_value.clone());
                        evidence.is_contested = false;
                        evidence.is_consensus = true;
                    }
                }
            }

            conflicts.push(ConflictResolution {
                field_name: evidence.field_name.clone(),
                fact_type,
                assertions: final_assertions,
                verdict,
            });
        }

        conflicts
    }
}

impl Default for EvidenceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Source tier classification by keyword. Parish/civil/church/archive
/// sources serving images of originals rank as original; compiled trees and
/// GEDCOM uploads as authored; everything else derivative.
pub fn classify_source(record: &RawRecord) -> Tier {
    let source = record.source.to_lowercase();
    let record_type = record.record_type.to_lowercase();

    let original_custodian = ["parish", "civil", "church", "archive"]
        .iter()
        .any(|kw| source.contains(kw));
    if original_custodian && (record_type.contains("image") || record_type.contains("original")) {
        return Tier::Original;
    }

    if ["tree", "wikitree", "gedcom", "compilation"]
        .iter()
        .any(|kw| source.contains(kw))
    {
        return Tier::Authored;
    }

    Tier::Derivative
}

struct ValueGroup {
    key: String,
    weight: f64,
    champion: FieldObservation,
}

/// Groups observations by normalized value, preserving first-encounter
/// order. Each group's champion is its heaviest observation (first wins
/// ties).
fn group_observations(observations: &[FieldObservation]) -> Vec<ValueGroup> {
    let mut groups: Vec<ValueGroup> = Vec::new();

    for obs in observations {
        let key = normalize_value(&obs.value);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => {
                group.weight += obs.weight;
                if obs.weight > group.champion.weight {
                    group.champion = obs.clone();
                }
            }
            None => groups.push(ValueGroup {
                key,
                weight: obs.weight,
                champion: obs.clone(),
            }),
        }
    }

    groups
}

fn build_field_evidence(field_name: &str, observations: Vec<FieldObservation>) -> FieldEvidence {
    if observations.is_empty() {
        return FieldEvidence::empty(field_name);
    }

    let mut groups = group_observations(&observations);
    groups.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let total_weight: f64 = groups.iter().map(|g| g.weight).sum();
    let consensus_score = if total_weight > 0.0 {
        groups[0].weight / total_weight
    } else {
        0.0
    };

    let is_contested = groups.len() > 1 && consensus_score < 0.7;
    let is_consensus = groups.len() == 1 || consensus_score >= 0.7;

    FieldEvidence {
        field_name: field_name.to_string(),
        best_value: Some(groups[0].champion.value.clone()),
        values: observations,
        consensus_score,
        is_contested,
        is_consensus,
    }
}

fn source_date_of(record: &RawRecord) -> Option<NaiveDate> {
    record
        .raw_data
        .get("source_date")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// Approximate event date for temporal proximity: mid-year of the first
/// plausible year token.
fn event_date_of(value: &str) -> Option<NaiveDate> {
    extract_year(value).and_then(|year| NaiveDate::from_ymd_opt(year, 7, 1))
}

/// GPS compliance score: weighted blend of source quality, evidence
/// agreement, and multi-source corroboration.
pub fn gps_score(
    original: usize,
    derivative: usize,
    authored: usize,
    contested: usize,
    consensus: usize,
    source_count: usize,
) -> f64 {
    let total_sources = (original + derivative + authored) as f64;
    let quality_factor = if total_sources == 0.0 {
        0.0
    } else {
        (original as f64 * 1.0 + derivative as f64 * 0.7 + authored as f64 * 0.4) / total_sources
    };

    let total_fields = (contested + consensus) as f64;
    let agreement_factor = if total_fields == 0.0 {
        0.5
    } else {
        consensus as f64 / total_fields
    };

    let corroboration_factor = (source_count as f64 / 3.0).min(1.0);

    quality_factor * 0.4 + agreement_factor * 0.4 + corroboration_factor * 0.2
}
