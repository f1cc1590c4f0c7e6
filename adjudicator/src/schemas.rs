use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fact categories that participate in conflict adjudication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactType {
    Birth,
    Death,
    Marriage,
    Relationship,
}

impl FactType {
    /// Maps an extracted field name onto a fact type, None for fields that
    /// never spawn competing assertions (places, occupations, free text).
    pub fn from_field_name(field_name: &str) -> Option<Self> {
        let lower = field_name.to_lowercase();
        if lower.contains("birth") {
            Some(FactType::Birth)
        } else if lower.contains("death") {
            Some(FactType::Death)
        } else if lower.contains("marriage") {
            Some(FactType::Marriage)
        } else if lower.contains("spouse") || lower.contains("father") || lower.contains("mother")
        {
            Some(FactType::Relationship)
        } else {
            None
        }
    }

    /// Birth and death drive downstream identity decisions, so close calls
    /// on them escalate instead of resolving.
    pub fn is_high_stakes(self) -> bool {
        matches!(self, FactType::Birth | FactType::Death)
    }
}

impl std::fmt::Display for FactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FactType::Birth => "birth",
            FactType::Death => "death",
            FactType::Marriage => "marriage",
            FactType::Relationship => "relationship",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    PendingReview,
    Resolved,
    Rejected,
    InsufficientEvidence,
    HumanReviewRequired,
}

/// One proposed value inside a conflict group. No competing claim is ever
/// discarded; losers are marked rejected, not deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetingAssertion {
    pub id: String,
    pub subject_id: String,
    pub fact_type: FactType,
    pub proposed_value: String,
    #[serde(default)]
    pub evidence_claim_ids: Vec<String>,
    pub conflict_group_id: String,
    pub status: ResolutionStatus,
    pub prior_weight: f64,
    #[serde(default)]
    pub temporal_proximity_bonus: f64,
    #[serde(default)]
    pub detected_patterns: Vec<String>,
    #[serde(default)]
    pub pattern_penalty: f64,
}

impl CompetingAssertion {
    pub fn new(
        id: impl Into<String>,
        subject_id: impl Into<String>,
        fact_type: FactType,
        proposed_value: impl Into<String>,
        conflict_group_id: impl Into<String>,
        prior_weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            subject_id: subject_id.into(),
            fact_type,
            proposed_value: proposed_value.into(),
            evidence_claim_ids: Vec::new(),
            conflict_group_id: conflict_group_id.into(),
            status: ResolutionStatus::PendingReview,
            prior_weight,
            temporal_proximity_bonus: 0.0,
            detected_patterns: Vec::new(),
            pattern_penalty: 0.0,
        }
    }

    /// Net score the tie-breaker ranks by.
    pub fn score(&self) -> f64 {
        self.prior_weight + self.temporal_proximity_bonus - self.pattern_penalty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationInput {
    pub subject_id: String,
    #[serde(default)]
    pub subject_name: String,
    pub fact_type: FactType,
    pub competing_assertions: Vec<CompetingAssertion>,
    #[serde(default)]
    pub subject_context: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreakerQuery {
    pub query_string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationVerdict {
    pub resolution_status: ResolutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_winning_assertion_index: Option<usize>,
    pub current_confidence: f64,
    #[serde(default)]
    pub tie_breaker_queries: Vec<TieBreakerQuery>,
    pub analysis: String,
}

impl AdjudicationVerdict {
    /// Verdict used when the adjudicator itself failed; conflicts stay open.
    pub fn pending(analysis: impl Into<String>) -> Self {
        Self {
            resolution_status: ResolutionStatus::PendingReview,
            current_winning_assertion_index: None,
            current_confidence: 0.0,
            tie_breaker_queries: Vec::new(),
            analysis: analysis.into(),
        }
    }
}
