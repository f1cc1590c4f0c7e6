use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw record returned from a data source before processing.
///
/// `extracted_fields` stays string-keyed because sources are open-ended; an
/// absent key means the source did not report that field. `raw_data` carries
/// the original response untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Which source returned this record.
    pub source: String,
    /// ID within the source.
    pub record_id: String,
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub raw_data: serde_json::Value,
    #[serde(default)]
    pub extracted_fields: HashMap<String, String>,
    #[serde(default = "Utc::now")]
    pub accessed_at: DateTime<Utc>,
    /// Source's own confidence if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_hint: Option<f64>,
}

impl RawRecord {
    pub fn new(
        source: impl Into<String>,
        record_id: impl Into<String>,
        record_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            record_id: record_id.into(),
            record_type: record_type.into(),
            url: None,
            raw_data: serde_json::Value::Null,
            extracted_fields: HashMap::new(),
            accessed_at: Utc::now(),
            confidence_hint: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extracted_fields.insert(name.into(), value.into());
        self
    }

    pub fn with_confidence(mut self, hint: f64) -> Self {
        self.confidence_hint = Some(hint);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_raw_data(mut self, raw_data: serde_json::Value) -> Self {
        self.raw_data = raw_data;
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.extracted_fields.get(name).map(String::as_str)
    }
}
