use kinsearch_core::normalize::normalize_whitespace;
use serde::{Deserialize, Serialize};

/// A value extracted from a source document together with the quote that is
/// supposed to support it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedClaim {
    pub field: String,
    pub value: String,
    #[serde(default)]
    pub citation_snippet: String,
}

/// Whitespace-normalized, case-insensitive containment check. A claim whose
/// citation cannot be found in the source text it was allegedly extracted
/// from is treated as hallucinated.
pub fn citation_supported(citation: &str, source_text: &str) -> bool {
    if citation.trim().is_empty() || source_text.trim().is_empty() {
        return false;
    }
    normalize_whitespace(source_text).contains(&normalize_whitespace(citation))
}

/// Claims without a snippet carry no citation to verify and pass through.
pub fn claim_passes(claim: &ExtractedClaim, source_text: &str) -> bool {
    if claim.citation_snippet.trim().is_empty() {
        return true;
    }
    citation_supported(&claim.citation_snippet, source_text)
}
