use crate::schemas::{EntityClusters, ExecutionResult, ResolvedEntity};
use kinsearch_core::ids;
use kinsearch_core::normalize::{extract_year, normalize_value};
use kinsearch_core::record::RawRecord;
use kinsearch_core::trace::{AgentRole, RunTrace, TraceEventType};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// Identifying fields a fingerprint is built from. A record needs at least
/// two of them populated to be clusterable at all.
const FINGERPRINT_FIELDS: [&str; 6] = [
    "full_name",
    "given_name",
    "surname",
    "birth_date",
    "birth_year",
    "birth_place",
];

/// Clusters records into person entities by content fingerprint and scores
/// each cluster with a corroboration-aware confidence.
#[derive(Default)]
pub struct EntityResolver;

impl EntityResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, execution: &ExecutionResult, trace: &RunTrace) -> EntityClusters {
        let started = Instant::now();

        // Clusters keep first-encounter order so equal-confidence entities
        // sort deterministically.
        let mut order: Vec<String> = Vec::new();
        let mut clusters: HashMap<String, Vec<&RawRecord>> = HashMap::new();
        let mut unresolved: Vec<String> = Vec::new();

        for record in &execution.all_records {
            match Self::fingerprint(record) {
                Some(fingerprint) => {
                    let cluster = clusters.entry(fingerprint.clone()).or_default();
                    if cluster.is_empty() {
                        order.push(fingerprint);
                    }
                    cluster.push(record);
                }
                None => unresolved.push(record.record_id.clone()),
            }
        }

        let mut entities: Vec<ResolvedEntity> = order
            .iter()
            .map(|fingerprint| Self::build_entity(fingerprint, &clusters[fingerprint]))
            .collect();
        entities.sort_by(|a, b| b.cluster_confidence.total_cmp(&a.cluster_confidence));

        let multi_source_entities = entities.iter().filter(|e| e.source_count > 1).count();
        let result = EntityClusters {
            execution_id: execution.execution_id.clone(),
            total_input_records: execution.all_records.len(),
            total_entities: entities.len(),
            multi_source_entities,
            entities,
            unresolved_record_ids: unresolved,
        };

        trace.add_event_timed(
            TraceEventType::EntitiesResolved,
            AgentRole::Resolver,
            format!(
                "Resolved {} entities from {} records",
                result.total_entities, result.total_input_records
            ),
            json!({
                "total_entities": result.total_entities,
                "multi_source": result.multi_source_entities,
                "unresolved": result.unresolved_record_ids.len(),
            }),
            started.elapsed().as_secs_f64() * 1000.0,
        );

        result
    }

    /// Deterministic content fingerprint: sorted `key:value` pairs over the
    /// normalized identifying fields, hashed. None when fewer than two
    /// fields are present.
    pub fn fingerprint(record: &RawRecord) -> Option<String> {
        let mut parts: Vec<String> = FINGERPRINT_FIELDS
            .iter()
            .filter_map(|key| {
                record
                    .field(key)
                    .map(normalize_value)
                    .filter(|value| !value.is_empty())
                    .map(|value| format!("{}:{}", key, value))
            })
            .collect();

        if parts.len() < 2 {
            return None;
        }

        parts.sort();
        let part_refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        Some(ids::content_id(&part_refs))
    }

    fn build_entity(fingerprint: &str, records: &[&RawRecord]) -> ResolvedEntity {
        let mut sources = BTreeSet::new();
        let mut record_ids = Vec::new();
        for record in records {
            sources.insert(record.source.clone());
            record_ids.push(record.record_id.clone());
        }

        let best_name = Self::best_value(records, &["full_name"]);
        let best_birth_place = Self::best_value(records, &["birth_place"]);
        let best_birth_year = Self::best_value(records, &["birth_year", "birth_date"])
            .as_deref()
            .and_then(extract_year);
        let best_death_year = Self::best_value(records, &["death_year", "death_date"])
            .as_deref()
            .and_then(extract_year);

        let base_confidence = records
            .iter()
            .map(|r| r.confidence_hint.unwrap_or(0.5))
            .sum::<f64>()
            / records.len() as f64;
        let corroboration_boost = (0.05 * (sources.len().saturating_sub(1)) as f64).min(0.2);

        ResolvedEntity {
            entity_id: fingerprint.to_string(),
            record_count: records.len(),
            source_count: sources.len(),
            record_ids,
            sources,
            best_name,
            best_birth_year,
            best_death_year,
            best_birth_place,
            cluster_confidence: (base_confidence + corroboration_boost).min(1.0),
            corroboration_boost,
        }
    }

    /// Highest-confidence value across records for the first populated field
    /// in `field_names`; ties keep the first encounter.
    fn best_value(records: &[&RawRecord], field_names: &[&str]) -> Option<String> {
        let mut best: Option<(String, f64)> = None;

        for record in records {
            let confidence = record.confidence_hint.unwrap_or(0.5);
            for field in field_names {
                if let Some(value) = record.field(field) {
                    if !value.trim().is_empty() {
                        if best.as_ref().map_or(true, |(_, c)| confidence > *c) {
                            best = Some((value.to_string(), confidence));
                        }
                        break;
                    }
                }
            }
        }

        best.map(|(value, _)| value)
    }
}
