use crate::schemas::FactType;
use chrono::{Datelike, NaiveDate, Utc};
use kinsearch_core::normalize::extract_year;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cap on any single heuristic penalty. Penalties are cumulative and
/// reported as-is; they never short-circuit adjudication.
pub const MAX_PATTERN_PENALTY: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub tag: String,
    pub penalty: f64,
}

impl DetectedPattern {
    fn new(tag: &str, penalty: f64) -> Self {
        Self {
            tag: tag.to_string(),
            penalty: penalty.clamp(0.0, MAX_PATTERN_PENALTY),
        }
    }
}

/// Pluggable catalog of known transcription and inference error patterns.
pub trait ErrorPatternDetector: Send + Sync {
    fn detect(
        &self,
        fact_type: FactType,
        value: &str,
        context: &HashMap<String, String>,
    ) -> Vec<DetectedPattern>;
}

/// Heuristics that recur in genealogical records: census-age rounding,
/// impossible lifespans, and clerical dates in the future.
#[derive(Debug, Default)]
pub struct DefaultPatternDetector;

impl ErrorPatternDetector for DefaultPatternDetector {
    fn detect(
        &self,
        fact_type: FactType,
        value: &str,
        context: &HashMap<String, String>,
    ) -> Vec<DetectedPattern> {
        let mut patterns = Vec::new();
        let Some(year) = extract_year(value) else {
            return patterns;
        };

        if year > Utc::now().year() {
            patterns.push(DetectedPattern::new("future_dated", 0.3));
        }

        if matches!(fact_type, FactType::Birth | FactType::Death) && year % 10 == 0 {
            patterns.push(DetectedPattern::new("age_heaping", 0.05));
        }

        if fact_type == FactType::Death {
            if let Some(birth_year) = context.get("birth_year").and_then(|v| extract_year(v)) {
                let lifespan = year - birth_year;
                if lifespan < 0 {
                    patterns.push(DetectedPattern::new("death_before_birth", 0.3));
                } else if lifespan > 110 {
                    patterns.push(DetectedPattern::new("implausible_lifespan", 0.2));
                }
            }
        }

        patterns
    }
}

/// Bonus curve for records created close in time to the event they report.
pub trait TemporalBonusPolicy: Send + Sync {
    /// Bonus in [0, 0.1]; callers skip the call entirely when either date is
    /// unknown.
    fn bonus(&self, source_date: NaiveDate, event_date: NaiveDate) -> f64;
}

/// `0.1 / (1 + gap_years)` — contemporaneous records get the full bonus,
/// which decays smoothly with distance.
#[derive(Debug, Default)]
pub struct InverseGapBonus;

impl TemporalBonusPolicy for InverseGapBonus {
    fn bonus(&self, source_date: NaiveDate, event_date: NaiveDate) -> f64 {
        let gap_days = (source_date - event_date).num_days().abs() as f64;
        let gap_years = gap_days / 365.25;
        (0.1 / (1.0 + gap_years)).clamp(0.0, 0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_birth(year: &str) -> HashMap<String, String> {
        HashMap::from([("birth_year".to_string(), year.to_string())])
    }

    #[test]
    fn test_round_year_flags_age_heaping() {
        let detector = DefaultPatternDetector;
        let patterns = detector.detect(FactType::Birth, "1880", &HashMap::new());
        assert!(patterns.iter().any(|p| p.tag == "age_heaping"));
    }

    #[test]
    fn test_implausible_lifespan_detected() {
        let detector = DefaultPatternDetector;
        let patterns = detector.detect(FactType::Death, "1999", &context_with_birth("1850"));
        assert!(patterns.iter().any(|p| p.tag == "implausible_lifespan"));

        let backwards = detector.detect(FactType::Death, "1840", &context_with_birth("1850"));
        assert!(backwards.iter().any(|p| p.tag == "death_before_birth"));
    }

    #[test]
    fn test_penalties_stay_within_cap() {
        let detector = DefaultPatternDetector;
        for pattern in detector.detect(FactType::Death, "2150", &context_with_birth("1850")) {
            assert!(pattern.penalty <= MAX_PATTERN_PENALTY);
        }
    }

    #[test]
    fn test_temporal_bonus_decays_with_gap() {
        let policy = InverseGapBonus;
        let event = NaiveDate::from_ymd_opt(1880, 6, 1).unwrap();
        let same_year = NaiveDate::from_ymd_opt(1880, 8, 1).unwrap();
        let decades_later = NaiveDate::from_ymd_opt(1940, 6, 1).unwrap();

        let near = policy.bonus(same_year, event);
        let far = policy.bonus(decades_later, event);
        assert!(near > far);
        assert!(near <= 0.1);
        assert!(far >= 0.0);
    }
}
