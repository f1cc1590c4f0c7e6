use crate::schemas::{
    AdjudicationInput, AdjudicationVerdict, ResolutionStatus, TieBreakerQuery,
};
use crate::Adjudicator;
use async_trait::async_trait;
use tracing::debug;

/// Deterministic tie-breaker over assertion scores
/// (`prior_weight + temporal_bonus - pattern_penalty`).
///
/// A clear margin resolves the conflict; a close call on a high-stakes fact
/// escalates to human review; anything else stays pending with suggested
/// follow-up queries. Scores below the evidence floor resolve nothing.
pub struct WeightedAdjudicator {
    resolve_margin: f64,
    high_stakes_margin: f64,
    evidence_floor: f64,
}

impl WeightedAdjudicator {
    pub fn new(resolve_margin: f64, high_stakes_margin: f64, evidence_floor: f64) -> Self {
        Self {
            resolve_margin,
            high_stakes_margin,
            evidence_floor,
        }
    }

    fn tie_breaker_queries(input: &AdjudicationInput) -> Vec<TieBreakerQuery> {
        input
            .competing_assertions
            .iter()
            .map(|assertion| TieBreakerQuery {
                query_string: format!(
                    "Verify {} {} = {} against original records",
                    if input.subject_name.is_empty() {
                        input.subject_id.as_str()
                    } else {
                        input.subject_name.as_str()
                    },
                    assertion.fact_type,
                    assertion.proposed_value
                ),
            })
            .collect()
    }
}

impl Default for WeightedAdjudicator {
    fn default() -> Self {
        Self {
            resolve_margin: 0.15,
            high_stakes_margin: 0.3,
            evidence_floor: 0.2,
        }
    }
}

#[async_trait]
impl Adjudicator for WeightedAdjudicator {
    async fn adjudicate(&self, input: &AdjudicationInput) -> anyhow::Result<AdjudicationVerdict> {
        let assertions = &input.competing_assertions;

        if assertions.is_empty() {
            return Ok(AdjudicationVerdict {
                resolution_status: ResolutionStatus::InsufficientEvidence,
                current_winning_assertion_index: None,
                current_confidence: 0.0,
                tie_breaker_queries: Vec::new(),
                analysis: "No assertions to adjudicate".to_string(),
            });
        }

        if assertions.len() == 1 {
            return Ok(AdjudicationVerdict {
                resolution_status: ResolutionStatus::Resolved,
                current_winning_assertion_index: Some(0),
                current_confidence: assertions[0].score().clamp(0.0, 1.0),
                tie_breaker_queries: Vec::new(),
                analysis: "Single uncontested assertion".to_string(),
            });
        }

        // Stable ranking: score descending, original order on exact ties.
        let mut ranked: Vec<usize> = (0..assertions.len()).collect();
        ranked.sort_by(|&a, &b| assertions[b].score().total_cmp(&assertions[a].score()));

        let top = ranked[0];
        let top_score = assertions[top].score();
        let runner_up_score = assertions[ranked[1]].score();
        let margin = top_score - runner_up_score;

        debug!(
            subject = %input.subject_id,
            fact = %input.fact_type,
            top_score,
            margin,
            "adjudicating conflict group"
        );

        if top_score < self.evidence_floor {
            return Ok(AdjudicationVerdict {
                resolution_status: ResolutionStatus::InsufficientEvidence,
                current_winning_assertion_index: None,
                current_confidence: top_score.clamp(0.0, 1.0),
                tie_breaker_queries: Self::tie_breaker_queries(input),
                analysis: format!(
                    "Best assertion scores {:.2}, below evidence floor {:.2}",
                    top_score, self.evidence_floor
                ),
            });
        }

        let required_margin = if input.fact_type.is_high_stakes() {
            self.high_stakes_margin
        } else {
            self.resolve_margin
        };

        if margin >= required_margin {
            return Ok(AdjudicationVerdict {
                resolution_status: ResolutionStatus::Resolved,
                current_winning_assertion_index: Some(top),
                current_confidence: (0.5 + margin).min(1.0),
                tie_breaker_queries: Vec::new(),
                analysis: format!(
                    "'{}' wins by margin {:.2} over '{}'",
                    assertions[top].proposed_value,
                    margin,
                    assertions[ranked[1]].proposed_value
                ),
            });
        }

        if input.fact_type.is_high_stakes() && margin >= self.resolve_margin {
            return Ok(AdjudicationVerdict {
                resolution_status: ResolutionStatus::HumanReviewRequired,
                current_winning_assertion_index: None,
                current_confidence: (0.5 + margin).min(1.0),
                tie_breaker_queries: Self::tie_breaker_queries(input),
                analysis: format!(
                    "Margin {:.2} favors '{}' but {} facts require a clearer win",
                    margin, assertions[top].proposed_value, input.fact_type
                ),
            });
        }

        Ok(AdjudicationVerdict {
            resolution_status: ResolutionStatus::PendingReview,
            current_winning_assertion_index: None,
            current_confidence: (0.5 + margin).min(1.0),
            tie_breaker_queries: Self::tie_breaker_queries(input),
            analysis: format!(
                "Competing values within margin {:.2}; additional evidence needed",
                margin
            ),
        })
    }
}
