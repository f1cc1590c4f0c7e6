use crate::schemas::{SearchPlan, SourceBudget};
use kinsearch_core::config::PlannerConfig;
use kinsearch_core::ids;
use kinsearch_core::normalize::title_case;
use kinsearch_core::query::SearchQuery;
use sources::source::Region;
use sources::SourceRouter;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Symmetric substitution table for historical surname spellings
/// (Johnson/Johnsen, Philips/Filips, Bergman/Burgmann, ...). Each
/// substitution is applied once to the original surname, never to variants.
const SURNAME_TRANSFORMS: [(&str, &str); 12] = [
    ("son", "sen"),
    ("sen", "son"),
    ("ck", "k"),
    ("k", "ck"),
    ("ph", "f"),
    ("f", "ph"),
    ("ie", "y"),
    ("y", "ie"),
    ("mann", "man"),
    ("man", "mann"),
    ("berg", "burg"),
    ("burg", "berg"),
];

const DEFAULT_RECORD_TYPES: [&str; 4] = ["birth", "death", "marriage", "census"];

pub struct QueryPlanner {
    router: Arc<SourceRouter>,
    config: PlannerConfig,
}

impl QueryPlanner {
    pub fn new(router: Arc<SourceRouter>) -> Self {
        Self::with_config(router, PlannerConfig::default())
    }

    pub fn with_config(router: Arc<SourceRouter>, config: PlannerConfig) -> Self {
        Self { router, config }
    }

    /// Builds a search plan: surname variants for exhaustive search, region
    /// inference, source ranking, and per-source budget allocation. Pure
    /// apart from the fresh plan id.
    pub fn create_plan(
        &self,
        query: &SearchQuery,
        explicit_region: Option<&str>,
        max_sources: Option<usize>,
        total_budget_seconds: f64,
    ) -> SearchPlan {
        let surname_variants = query
            .surname
            .as_deref()
            .map(generate_variants)
            .unwrap_or_default();

        let region = determine_region(query.birth_place.as_deref(), explicit_region);

        let mut ranked = self.router.rank_sources_for_query(query, region);
        if let Some(limit) = max_sources {
            ranked.truncate(limit);
        }

        let per_source_timeout =
            (total_budget_seconds / ranked.len().max(1) as f64).min(30.0);

        let source_budgets = ranked
            .into_iter()
            .map(|(source_name, priority)| {
                let timeout =
                    (per_source_timeout * (1.0 + 0.2 * priority as f64)).min(45.0);
                SourceBudget {
                    source_name,
                    priority,
                    max_results: if priority >= 2 { 50 } else { 30 },
                    timeout_seconds: timeout,
                    retry_count: if priority >= 2 { 2 } else { 1 },
                }
            })
            .collect::<Vec<_>>();

        debug!(
            sources = source_budgets.len(),
            variants = surname_variants.len(),
            region = ?region,
            "created search plan"
        );

        SearchPlan {
            plan_id: ids::fresh_id("plan"),
            surname: query.surname.clone(),
            surname_variants,
            given_name: query.given_name.clone(),
            birth_year: query.birth_year,
            birth_year_range: query.birth_year_range,
            birth_place: query.birth_place.clone(),
            death_year: query.death_year,
            record_types: if query.record_types.is_empty() {
                DEFAULT_RECORD_TYPES.iter().map(|s| s.to_string()).collect()
            } else {
                query.record_types.clone()
            },
            region,
            source_budgets,
            total_budget_seconds,
            max_total_results: self.config.max_total_results,
            first_pass_enabled: true,
            first_pass_source_limit: self.config.first_pass_source_limit,
            second_pass_threshold: self.config.second_pass_threshold,
        }
    }
}

/// Original plus each single-substitution variant, title-cased, deduplicated.
pub fn generate_variants(surname: &str) -> BTreeSet<String> {
    let mut variants = BTreeSet::new();
    variants.insert(surname.to_string());

    let lower = surname.to_lowercase();
    for (old, new) in SURNAME_TRANSFORMS {
        if lower.contains(old) {
            variants.insert(title_case(&lower.replace(old, new)));
        }
    }

    variants
}

/// Explicit region wins via the canonical-name table; otherwise the birth
/// place is matched against region keywords, first hit wins.
pub fn determine_region(birth_place: Option<&str>, explicit_region: Option<&str>) -> Option<Region> {
    if let Some(name) = explicit_region {
        return Region::from_name(name);
    }
    birth_place.and_then(Region::infer_from_place)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sources::source::{SourceMetadata, Tier};
    use sources::MockSource;

    fn router() -> Arc<SourceRouter> {
        let mut router = SourceRouter::new();
        for (name, metadata) in [
            (
                "parish_archive",
                SourceMetadata::new(Tier::Original).with_region(Region::Germany),
            ),
            (
                "freebmd",
                SourceMetadata::new(Tier::Derivative).with_region(Region::England),
            ),
            ("rootsweb", SourceMetadata::new(Tier::Derivative)),
        ] {
            router
                .register(Arc::new(MockSource::with_metadata(name, metadata)))
                .unwrap();
        }
        Arc::new(router)
    }

    #[test]
    fn test_variants_include_original_and_substitutions() {
        let variants = generate_variants("Johnson");
        assert!(variants.contains("Johnson"));
        assert!(variants.contains("Johnsen"));

        let variants = generate_variants("Bergman");
        assert!(variants.contains("Bergman"));
        assert!(variants.contains("Burgman"));
        assert!(variants.contains("Bergmann"));
    }

    #[test]
    fn test_surname_without_matching_rules_keeps_only_original() {
        let variants = generate_variants("Smith");
        assert_eq!(variants.len(), 1);
        assert!(variants.contains("Smith"));
    }

    #[test]
    fn test_region_explicit_wins_over_place() {
        let region = determine_region(Some("Boston, USA"), Some("germany"));
        assert_eq!(region, Some(Region::Germany));

        let inferred = determine_region(Some("Boston, USA"), None);
        assert_eq!(inferred, Some(Region::Usa));
    }

    #[test]
    fn test_budget_allocation_follows_priority() {
        let planner = QueryPlanner::new(router());
        let query = SearchQuery::for_surname("Berg");
        let plan = planner.create_plan(&query, Some("germany"), None, 120.0);

        // parish_archive: region match (2) + tier bonus (1) = priority 3.
        let top = &plan.source_budgets[0];
        assert_eq!(top.source_name, "parish_archive");
        assert_eq!(top.priority, 3);
        assert_eq!(top.max_results, 50);
        assert_eq!(top.retry_count, 2);

        let low = plan.budget_for("rootsweb").unwrap();
        assert_eq!(low.max_results, 30);
        assert_eq!(low.retry_count, 1);

        // per-source timeout = min(30, 120/3) = 30; priority 3 scales to 48,
        // clamped at 45.
        assert!((top.timeout_seconds - 45.0).abs() < 1e-9);
        assert!((low.timeout_seconds - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_replanning_is_deterministic_modulo_plan_id() {
        let planner = QueryPlanner::new(router());
        let query = SearchQuery::for_surname("Johnson");

        let a = planner.create_plan(&query, None, Some(2), 60.0);
        let b = planner.create_plan(&query, None, Some(2), 60.0);

        assert_ne!(a.plan_id, b.plan_id);
        assert_eq!(a.surname_variants, b.surname_variants);
        assert_eq!(a.sources_by_priority(), b.sources_by_priority());
        assert_eq!(a.source_budgets, b.source_budgets);
    }

    #[test]
    fn test_plan_defaults() {
        let planner = QueryPlanner::new(router());
        let plan = planner.create_plan(&SearchQuery::for_surname("Smith"), None, None, 120.0);

        assert_eq!(
            plan.record_types,
            vec!["birth", "death", "marriage", "census"]
        );
        assert_eq!(plan.first_pass_source_limit, 5);
        assert!((plan.second_pass_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(plan.max_total_results, 200);
        assert!(plan.first_pass_enabled);
    }
}
