use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventType {
    PlanCreated,
    BudgetCheck,
    ExecutionStarted,
    SourceSearched,
    SourceFailed,
    ExecutionCompleted,
    EntitiesResolved,
    EvidenceVerified,
    SynthesisCompleted,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    BudgetPolicy,
    Executor,
    Resolver,
    Verifier,
    Synthesizer,
    Manager,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Monotonic position within the run.
    #[serde(rename = "stage_id")]
    pub sequence: u64,
    pub ts: DateTime<Utc>,
    #[serde(rename = "kind")]
    pub event_type: TraceEventType,
    pub role: AgentRole,
    pub message: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Owned, cloneable export of a finished (or in-flight) trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    pub original_query: Value,
    pub started_at: DateTime<Utc>,
    pub events: Vec<TraceEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TraceOutcome>,
}

impl TraceSnapshot {
    pub fn event_types(&self) -> Vec<TraceEventType> {
        self.events.iter().map(|e| e.event_type).collect()
    }

    pub fn success(&self) -> bool {
        self.outcome.as_ref().is_some_and(|o| o.success)
    }
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("trace serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only ordered log of a single research run.
///
/// Appends are serialized through the internal mutex, so concurrent executor
/// tasks may share one trace behind an `Arc`. Events keep a monotonic
/// sequence; finalization is first-write-wins.
#[derive(Debug)]
pub struct RunTrace {
    original_query: Value,
    started_at: DateTime<Utc>,
    events: Mutex<Vec<TraceEvent>>,
    sequence: AtomicU64,
    outcome: Mutex<Option<TraceOutcome>>,
}

impl RunTrace {
    pub fn new(original_query: Value) -> Self {
        Self {
            original_query,
            started_at: Utc::now(),
            events: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
            outcome: Mutex::new(None),
        }
    }

    pub fn add_event(
        &self,
        event_type: TraceEventType,
        role: AgentRole,
        message: impl Into<String>,
        payload: Value,
    ) {
        self.push(event_type, role, message.into(), payload, None, None);
    }

    pub fn add_event_timed(
        &self,
        event_type: TraceEventType,
        role: AgentRole,
        message: impl Into<String>,
        payload: Value,
        duration_ms: f64,
    ) {
        self.push(event_type, role, message.into(), payload, Some(duration_ms), None);
    }

    pub fn add_error(&self, role: AgentRole, message: impl Into<String>, error: impl Into<String>) {
        self.push(
            TraceEventType::Error,
            role,
            message.into(),
            Value::Null,
            None,
            Some(error.into()),
        );
    }

    pub fn add_failure(
        &self,
        event_type: TraceEventType,
        role: AgentRole,
        message: impl Into<String>,
        payload: Value,
        error: impl Into<String>,
    ) {
        self.push(event_type, role, message.into(), payload, None, Some(error.into()));
    }

    fn push(
        &self,
        event_type: TraceEventType,
        role: AgentRole,
        message: String,
        payload: Value,
        duration_ms: Option<f64>,
        error: Option<String>,
    ) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = TraceEvent {
            sequence,
            ts: Utc::now(),
            event_type,
            role,
            message,
            payload,
            duration_ms,
            error,
        };

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push(event);
    }

    /// Records the run outcome. The first finalization wins; later calls are
    /// ignored so partial results already traced stay intact.
    pub fn finalize(&self, success: bool, error: Option<String>) {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if outcome.is_none() {
            *outcome = Some(TraceOutcome {
                success,
                error,
                finished_at: Utc::now(),
            });
        }
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn outcome(&self) -> Option<TraceOutcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self) -> TraceSnapshot {
        TraceSnapshot {
            original_query: self.original_query.clone(),
            started_at: self.started_at,
            events: self.events(),
            outcome: self.outcome(),
        }
    }

    /// Writes one JSON line per event, terminated by the finalization record.
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> Result<(), TraceError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        for event in self.events() {
            let line = serde_json::to_string(&event)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        if let Some(outcome) = self.outcome() {
            let line = serde_json::to_string(&outcome)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_events_keep_monotonic_sequence() {
        let trace = RunTrace::new(json!({"surname": "Smith"}));

        trace.add_event(
            TraceEventType::PlanCreated,
            AgentRole::Planner,
            "plan ready",
            Value::Null,
        );
        trace.add_event(
            TraceEventType::ExecutionStarted,
            AgentRole::Executor,
            "pass 1",
            Value::Null,
        );

        let events = trace.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[1].sequence, 2);
    }

    #[test]
    fn test_finalize_is_first_write_wins() {
        let trace = RunTrace::new(Value::Null);
        trace.finalize(true, None);
        trace.finalize(false, Some("late".to_string()));

        let outcome = trace.outcome().unwrap();
        assert!(outcome.success);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_jsonl_writes_event_type_and_outcome() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");

        let trace = RunTrace::new(json!({"surname": "Berg"}));
        trace.add_event_timed(
            TraceEventType::SourceSearched,
            AgentRole::Executor,
            "freebmd: 3 records",
            json!({"source": "freebmd", "count": 3}),
            12.5,
        );
        trace.finalize(true, None);
        trace.write_jsonl(&path).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("\"kind\":\"source_searched\""));
        assert!(content.contains("\"duration_ms\":12.5"));
        assert!(content.lines().last().unwrap().contains("\"success\":true"));
    }

    #[test]
    fn test_replay_rejects_unknown_event_kind() {
        let raw = r#"{
            "stage_id": 1,
            "ts": "2024-01-01T00:00:00Z",
            "kind": "telemetry_flush",
            "role": "executor",
            "message": "x",
            "payload": null
        }"#;
        assert!(serde_json::from_str::<TraceEvent>(raw).is_err());

        let known = raw.replace("telemetry_flush", "source_failed");
        let event: TraceEvent = serde_json::from_str(&known).unwrap();
        assert_eq!(event.event_type, TraceEventType::SourceFailed);
    }
}
