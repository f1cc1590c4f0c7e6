use crate::source::{GenealogySource, Region, Tier};
use kinsearch_core::query::SearchQuery;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("source already registered: {0}")]
    DuplicateSource(String),
}

/// Process-local registry of data sources. Registration happens before the
/// router is shared; during a run the map is read-only.
#[derive(Default)]
pub struct SourceRouter {
    sources: HashMap<String, Arc<dyn GenealogySource>>,
}

impl SourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn GenealogySource>) -> Result<(), RouterError> {
        let name = source.name().to_string();
        if self.sources.contains_key(&name) {
            return Err(RouterError::DuplicateSource(name));
        }
        debug!(source = %name, "registered source");
        self.sources.insert(name, source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenealogySource>> {
        self.sources.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Ranks registered sources for a query.
    ///
    /// Priority = 2·region_match + record_type_matches + tier_bonus, sorted
    /// by descending priority with ties broken by source name, so identical
    /// inputs always produce the same ordering.
    pub fn rank_sources_for_query(
        &self,
        query: &SearchQuery,
        region: Option<Region>,
    ) -> Vec<(String, i64)> {
        let mut ranked: Vec<(String, i64)> = self
            .sources
            .iter()
            .filter(|(name, _)| !query.exclude_sources.contains(name))
            .map(|(name, source)| {
                let metadata = source.metadata();

                let region_match = region.is_some_and(|r| metadata.supports_region(r)) as i64;
                let record_type_matches = query
                    .record_types
                    .iter()
                    .filter(|rt| metadata.record_types.contains(*rt))
                    .count() as i64;
                let tier_bonus = (metadata.tier_hint == Tier::Original) as i64;

                let priority = 2 * region_match + record_type_matches + tier_bonus;
                (name.clone(), priority)
            })
            .collect();

        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}
