use serde::{Deserialize, Serialize};

pub const DEFAULT_YEAR_RANGE: i32 = 5;

/// Query for searching genealogical sources. A surname is expected unless
/// strong identifiers (given name plus a birth anchor) are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub given_name: Option<String>,
    pub surname: Option<String>,
    /// Historical spellings and phonetic variants, original included.
    pub surname_variants: Vec<String>,
    pub birth_year: Option<i32>,
    pub birth_year_range: i32,
    pub birth_place: Option<String>,
    pub death_year: Option<i32>,
    pub death_year_range: i32,
    pub death_place: Option<String>,
    pub residence: Option<String>,
    pub spouse_name: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    /// Record types to search: birth, death, marriage, census, military, etc.
    pub record_types: Vec<String>,
    /// Source repositories to skip.
    pub exclude_sources: Vec<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            given_name: None,
            surname: None,
            surname_variants: Vec::new(),
            birth_year: None,
            birth_year_range: DEFAULT_YEAR_RANGE,
            birth_place: None,
            death_year: None,
            death_year_range: DEFAULT_YEAR_RANGE,
            death_place: None,
            residence: None,
            spouse_name: None,
            father_name: None,
            mother_name: None,
            record_types: Vec::new(),
            exclude_sources: Vec::new(),
        }
    }
}

impl SearchQuery {
    pub fn for_surname(surname: impl Into<String>) -> Self {
        Self {
            surname: Some(surname.into()),
            ..Self::default()
        }
    }

    /// Min/max year window for searching, None when the anchor year is absent.
    pub fn year_range(year: Option<i32>, range: i32) -> Option<(i32, i32)> {
        year.map(|y| (y - range, y + range))
    }

    pub fn birth_year_window(&self) -> Option<(i32, i32)> {
        Self::year_range(self.birth_year, self.birth_year_range)
    }

    pub fn death_year_window(&self) -> Option<(i32, i32)> {
        Self::year_range(self.death_year, self.death_year_range)
    }

    /// True when the query can anchor a search without a surname.
    pub fn has_strong_identifiers(&self) -> bool {
        self.given_name.as_deref().is_some_and(|n| !n.trim().is_empty())
            && (self.birth_year.is_some() || self.birth_place.is_some())
    }
}
