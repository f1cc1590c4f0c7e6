pub mod firewall;
pub mod policy;
pub mod schemas;
pub mod weighted;

use async_trait::async_trait;
use schemas::{AdjudicationInput, AdjudicationVerdict};

pub use firewall::{citation_supported, claim_passes, ExtractedClaim};
pub use policy::{
    DefaultPatternDetector, DetectedPattern, ErrorPatternDetector, InverseGapBonus,
    TemporalBonusPolicy,
};
pub use schemas::{
    CompetingAssertion, FactType, ResolutionStatus, TieBreakerQuery,
};
pub use weighted::WeightedAdjudicator;

/// External capability that chooses among competing assertions when
/// automatic consensus fails. Implementations are expected to be backed by
/// a model or a human queue; this crate ships a deterministic weighted one.
#[async_trait]
pub trait Adjudicator: Send + Sync {
    async fn adjudicate(&self, input: &AdjudicationInput) -> anyhow::Result<AdjudicationVerdict>;
}
