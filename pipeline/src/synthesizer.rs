use crate::schemas::{
    AlternativeValue, ContestedFieldOutput, EvidenceScore, ResolvedEntity, Synthesis,
};
use kinsearch_core::record::RawRecord;
use kinsearch_core::trace::{AgentRole, RunTrace, TraceEventType};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

/// Produces the written conclusion for an entity: best estimates, contested
/// fields with their alternatives, citations, and recommended next steps.
#[derive(Default)]
pub struct SynthesisAgent;

impl SynthesisAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(
        &self,
        entity: &ResolvedEntity,
        evidence: &EvidenceScore,
        records: &[RawRecord],
        trace: &RunTrace,
    ) -> Synthesis {
        let started = Instant::now();

        let mut best_estimate = BTreeMap::new();
        let mut contested_fields = Vec::new();
        let mut consensus_fields = Vec::new();

        for field in &evidence.field_evidence {
            if let Some(best_value) = &field.best_value {
                best_estimate.insert(field.field_name.clone(), best_value.clone());
            }

            if field.is_contested {
                contested_fields.push(ContestedFieldOutput {
                    field: field.field_name.clone(),
                    best_value: field.best_value.clone(),
                    alternative_values: field
                        .values
                        .iter()
                        .map(|obs| AlternativeValue {
                            value: obs.value.clone(),
                            source: obs.source.clone(),
                            confidence: obs.confidence,
                        })
                        .collect(),
                    consensus_score: field.consensus_score,
                });
            } else if field.is_consensus {
                consensus_fields.push(field.field_name.clone());
            }
        }

        let supporting_citations = generate_citations(records);
        let next_steps = generate_next_steps(evidence, entity);

        let gps_compliant = evidence.gps_compliance_score >= 0.7
            && !evidence.requires_human_review
            && evidence.original_source_count > 0;

        let gps_notes = (!gps_compliant).then(|| {
            let mut notes = Vec::new();
            if evidence.original_source_count == 0 {
                notes.push("No original sources".to_string());
            }
            if evidence.requires_human_review {
                notes.push(format!(
                    "Needs review: {}",
                    evidence.review_reason.as_deref().unwrap_or("unspecified")
                ));
            }
            if evidence.gps_compliance_score < 0.7 {
                notes.push(format!(
                    "Low GPS score: {:.2}",
                    evidence.gps_compliance_score
                ));
            }
            notes.join("; ")
        });

        let result = Synthesis {
            entity_id: entity.entity_id.clone(),
            best_estimate,
            supporting_citations,
            contested_fields,
            consensus_fields,
            overall_confidence: evidence.overall_confidence,
            next_steps,
            gps_compliant,
            gps_notes,
        };

        trace.add_event_timed(
            TraceEventType::SynthesisCompleted,
            AgentRole::Synthesizer,
            format!(
                "Synthesis complete: GPS={}, confidence={:.2}",
                result.gps_compliant, result.overall_confidence
            ),
            json!({
                "entity_id": entity.entity_id,
                "gps_compliant": result.gps_compliant,
                "confidence": result.overall_confidence,
                "contested_count": result.contested_fields.len(),
            }),
            started.elapsed().as_secs_f64() * 1000.0,
        );

        result
    }
}

/// One citation per record: `source, record <id>, (<type>), <url>` with
/// missing parts omitted; deduplicated preserving first appearance.
fn generate_citations(records: &[RawRecord]) -> Vec<String> {
    let mut citations = Vec::new();
    let mut seen = HashSet::new();

    for record in records {
        let mut parts = vec![record.source.clone()];
        if !record.record_id.is_empty() {
            parts.push(format!("record {}", record.record_id));
        }
        if !record.record_type.is_empty() {
            parts.push(format!("({})", record.record_type));
        }
        if let Some(url) = &record.url {
            parts.push(format!("<{}>", url));
        }

        let citation = parts.join(", ");
        if seen.insert(citation.clone()) {
            citations.push(citation);
        }
    }

    citations
}

fn generate_next_steps(evidence: &EvidenceScore, entity: &ResolvedEntity) -> Vec<String> {
    let mut steps = Vec::new();

    if evidence.overall_confidence < 0.7 {
        steps.push("Expand search to additional record types".to_string());
    }
    if evidence.original_source_count == 0 {
        steps.push("Seek original sources (parish records, civil registers)".to_string());
    }
    if evidence.requires_human_review {
        steps.push(format!(
            "Manual review needed: {}",
            evidence.review_reason.as_deref().unwrap_or("unspecified")
        ));
    }
    if entity.source_count < 2 {
        steps.push("Corroborate with additional independent sources".to_string());
    }
    if steps.is_empty() {
        steps.push("Evidence sufficient for GPS compliance".to_string());
    }

    steps
}
