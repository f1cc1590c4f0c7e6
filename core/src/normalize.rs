use regex::Regex;
use std::sync::OnceLock;

/// Canonical form used for grouping and fingerprinting field values.
pub fn normalize_value(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Collapses runs of whitespace to single spaces and lowercases, the form
/// used for citation-in-source containment checks.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(1\d{3}|20\d{2})\b").expect("year pattern is valid"))
}

/// First plausible 4-digit year token in the text, within [1000, 2099].
pub fn extract_year(text: &str) -> Option<i32> {
    year_pattern()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Title-cases each whitespace-separated word; used for surname variants.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
