use crate::cancel::CancelToken;
use crate::source::{GenealogySource, Region, SourceMetadata, Tier};
use anyhow::anyhow;
use async_trait::async_trait;
use kinsearch_core::query::SearchQuery;
use kinsearch_core::record::RawRecord;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Deterministic in-memory source for tests and wiring examples. Returns a
/// fixed record set, optionally failing the first N calls or sleeping before
/// answering.
pub struct MockSource {
    name: String,
    metadata: SourceMetadata,
    records: Vec<RawRecord>,
    remaining_failures: AtomicU32,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(name: impl Into<String>, tier: Tier) -> Self {
        Self::with_metadata(name, SourceMetadata::new(tier))
    }

    pub fn with_metadata(name: impl Into<String>, metadata: SourceMetadata) -> Self {
        Self {
            name: name.into(),
            metadata,
            records: Vec::new(),
            remaining_failures: AtomicU32::new(0),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.metadata.regions.insert(region);
        self
    }

    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.metadata.record_types.insert(record_type.into());
        self
    }

    /// Records are retagged with this source's name so fixtures stay honest.
    pub fn with_records(mut self, records: Vec<RawRecord>) -> Self {
        self.records = records
            .into_iter()
            .map(|mut record| {
                record.source = self.name.clone();
                record
            })
            .collect();
        self
    }

    pub fn failing_times(self, failures: u32) -> Self {
        self.remaining_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenealogySource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> SourceMetadata {
        self.metadata.clone()
    }

    async fn search(
        &self,
        _query: &SearchQuery,
        mut cancel: CancelToken,
    ) -> anyhow::Result<Vec<RawRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(anyhow!("search cancelled")),
            }
        }

        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("simulated connection failure"));
        }

        Ok(self.records.clone())
    }
}
