use adjudicator::schemas::{AdjudicationVerdict, CompetingAssertion, FactType};
use kinsearch_core::query::SearchQuery;
use kinsearch_core::record::RawRecord;
use kinsearch_core::trace::TraceSnapshot;
use serde::{Deserialize, Serialize};
use sources::source::{Region, Tier};
use std::collections::{BTreeMap, BTreeSet};

/// Per-source slice of the plan's budget. Priorities strictly determine
/// execution order, ties broken by source name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBudget {
    pub source_name: String,
    pub priority: i64,
    pub max_results: usize,
    pub timeout_seconds: f64,
    pub retry_count: u32,
}

impl SourceBudget {
    /// Budget used when a source appears in a pass without a planned entry.
    pub fn fallback(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            priority: 0,
            max_results: 30,
            timeout_seconds: 10.0,
            retry_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub plan_id: String,
    pub surname: Option<String>,
    pub surname_variants: BTreeSet<String>,
    pub given_name: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_year_range: i32,
    pub birth_place: Option<String>,
    pub death_year: Option<i32>,
    pub record_types: Vec<String>,
    pub region: Option<Region>,
    pub source_budgets: Vec<SourceBudget>,
    pub total_budget_seconds: f64,
    pub max_total_results: usize,
    pub first_pass_enabled: bool,
    pub first_pass_source_limit: usize,
    pub second_pass_threshold: f64,
}

impl SearchPlan {
    /// Source names in execution order (budgets are stored pre-sorted).
    pub fn sources_by_priority(&self) -> Vec<String> {
        self.source_budgets
            .iter()
            .map(|b| b.source_name.clone())
            .collect()
    }

    pub fn budget_for(&self, source_name: &str) -> Option<&SourceBudget> {
        self.source_budgets
            .iter()
            .find(|b| b.source_name == source_name)
    }

    pub fn total_max_results(&self) -> usize {
        self.source_budgets.iter().map(|b| b.max_results).sum()
    }

    /// The query the executor sends to every planned source.
    pub fn to_query(&self) -> SearchQuery {
        SearchQuery {
            surname: self.surname.clone(),
            surname_variants: self.surname_variants.iter().cloned().collect(),
            given_name: self.given_name.clone(),
            birth_year: self.birth_year,
            birth_year_range: self.birth_year_range,
            birth_place: self.birth_place.clone(),
            death_year: self.death_year,
            record_types: self.record_types.clone(),
            ..SearchQuery::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceExecutionResult {
    pub source_name: String,
    pub success: bool,
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub search_time_ms: f64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceExecutionResult {
    pub fn failure(source_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            success: false,
            records: Vec::new(),
            total_count: 0,
            search_time_ms: 0.0,
            retry_count: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub plan_id: String,
    pub source_results: Vec<SourceExecutionResult>,
    /// Pass-1 records strictly precede pass-2 records; within a pass the
    /// order is source completion order and must not be relied on.
    pub all_records: Vec<RawRecord>,
    pub sources_searched: Vec<String>,
    pub sources_failed: Vec<String>,
    pub pass_number: u8,
    pub confidence_after_pass: f64,
    pub total_records: usize,
    pub total_execution_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    /// Content fingerprint; doubles as the stable entity id.
    pub entity_id: String,
    pub record_ids: Vec<String>,
    pub sources: BTreeSet<String>,
    pub best_name: Option<String>,
    pub best_birth_year: Option<i32>,
    pub best_death_year: Option<i32>,
    pub best_birth_place: Option<String>,
    pub record_count: usize,
    pub source_count: usize,
    pub cluster_confidence: f64,
    pub corroboration_boost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityClusters {
    pub execution_id: String,
    /// Sorted by descending cluster confidence, stable within ties.
    pub entities: Vec<ResolvedEntity>,
    pub unresolved_record_ids: Vec<String>,
    pub total_input_records: usize,
    pub total_entities: usize,
    pub multi_source_entities: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldObservation {
    pub value: String,
    pub source: String,
    pub tier: Tier,
    pub confidence: f64,
    pub weight: f64,
    /// Creation date of the source document, when the source reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEvidence {
    pub field_name: String,
    pub values: Vec<FieldObservation>,
    pub best_value: Option<String>,
    pub consensus_score: f64,
    pub is_contested: bool,
    pub is_consensus: bool,
}

impl FieldEvidence {
    pub fn empty(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            values: Vec::new(),
            best_value: None,
            consensus_score: 0.0,
            is_contested: false,
            is_consensus: false,
        }
    }
}

/// Outcome of adjudicating one contested fact-type field. Assertions carry
/// their final statuses; the verdict explains them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub field_name: String,
    pub fact_type: FactType,
    pub assertions: Vec<CompetingAssertion>,
    pub verdict: AdjudicationVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceScore {
    pub entity_id: String,
    pub field_evidence: Vec<FieldEvidence>,
    #[serde(default)]
    pub conflicts: Vec<ConflictResolution>,
    pub overall_confidence: f64,
    pub gps_compliance_score: f64,
    pub original_source_count: usize,
    pub derivative_source_count: usize,
    pub authored_source_count: usize,
    pub requires_human_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeValue {
    pub value: String,
    pub source: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestedFieldOutput {
    pub field: String,
    pub best_value: Option<String>,
    pub alternative_values: Vec<AlternativeValue>,
    pub consensus_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub entity_id: String,
    pub best_estimate: BTreeMap<String, String>,
    pub supporting_citations: Vec<String>,
    pub contested_fields: Vec<ContestedFieldOutput>,
    pub consensus_fields: Vec<String>,
    pub overall_confidence: f64,
    pub next_steps: Vec<String>,
    pub gps_compliant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerResponse {
    /// Highest-confidence synthesis, None when nothing was found.
    pub synthesis: Option<Synthesis>,
    pub all_syntheses: Vec<Synthesis>,
    pub trace: TraceSnapshot,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub requires_human_decision: bool,
}
