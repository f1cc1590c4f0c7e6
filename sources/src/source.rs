use crate::cancel::CancelToken;
use async_trait::async_trait;
use kinsearch_core::query::SearchQuery;
use kinsearch_core::record::RawRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Belgium,
    Netherlands,
    Germany,
    France,
    Ireland,
    Scotland,
    England,
    Wales,
    ChannelIslands,
    Usa,
    Canada,
}

/// Keyword table used both for canonical-name lookup and for substring
/// inference over free-text places. Order matters: first hit wins.
const REGION_KEYWORDS: [(&str, Region); 14] = [
    ("belgium", Region::Belgium),
    ("netherlands", Region::Netherlands),
    ("germany", Region::Germany),
    ("france", Region::France),
    ("ireland", Region::Ireland),
    ("scotland", Region::Scotland),
    ("england", Region::England),
    ("wales", Region::Wales),
    ("jersey", Region::ChannelIslands),
    ("guernsey", Region::ChannelIslands),
    ("channel islands", Region::ChannelIslands),
    ("usa", Region::Usa),
    ("united states", Region::Usa),
    ("canada", Region::Canada),
];

impl Region {
    /// Canonical-name lookup for an explicitly supplied region.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        REGION_KEYWORDS
            .iter()
            .find(|(keyword, _)| *keyword == normalized)
            .map(|(_, region)| *region)
    }

    /// Substring match over a free-text place, first keyword hit wins.
    pub fn infer_from_place(place: &str) -> Option<Self> {
        let place_lower = place.to_lowercase();
        REGION_KEYWORDS
            .iter()
            .find(|(keyword, _)| place_lower.contains(keyword))
            .map(|(_, region)| *region)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Region::Belgium => "belgium",
            Region::Netherlands => "netherlands",
            Region::Germany => "germany",
            Region::France => "france",
            Region::Ireland => "ireland",
            Region::Scotland => "scotland",
            Region::England => "england",
            Region::Wales => "wales",
            Region::ChannelIslands => "channel_islands",
            Region::Usa => "usa",
            Region::Canada => "canada",
        };
        write!(f, "{}", s)
    }
}

/// Source authority classification. Affects evidence weighting downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Original,
    Derivative,
    Authored,
}

impl Tier {
    pub fn weight(self) -> f64 {
        match self {
            Tier::Original => 3.0,
            Tier::Derivative => 2.0,
            Tier::Authored => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub regions: BTreeSet<Region>,
    pub record_types: BTreeSet<String>,
    pub tier_hint: Tier,
}

impl SourceMetadata {
    pub fn new(tier_hint: Tier) -> Self {
        Self {
            regions: BTreeSet::new(),
            record_types: BTreeSet::new(),
            tier_hint,
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.regions.insert(region);
        self
    }

    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_types.insert(record_type.into());
        self
    }

    pub fn supports_region(&self, region: Region) -> bool {
        self.regions.contains(&region)
    }
}

/// Interface every genealogical data source implements. Implementations must
/// tolerate parallel `search` calls on disjoint queries.
#[async_trait]
pub trait GenealogySource: Send + Sync {
    fn name(&self) -> &str;

    fn metadata(&self) -> SourceMetadata;

    async fn search(
        &self,
        query: &SearchQuery,
        cancel: CancelToken,
    ) -> anyhow::Result<Vec<RawRecord>>;
}
