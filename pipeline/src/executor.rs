use crate::schemas::{ExecutionResult, SearchPlan, SourceBudget, SourceExecutionResult};
use kinsearch_core::ids;
use kinsearch_core::query::SearchQuery;
use kinsearch_core::record::RawRecord;
use kinsearch_core::trace::{AgentRole, RunTrace, TraceEventType};
use serde_json::json;
use sources::{CancelToken, SourceRouter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Fans searches out to planned sources as concurrent tasks, respecting
/// per-source deadlines and retry budgets, and expands to a second pass when
/// first-pass confidence falls below the plan's threshold.
pub struct SourceExecutor {
    router: Arc<SourceRouter>,
}

impl SourceExecutor {
    pub fn new(router: Arc<SourceRouter>) -> Self {
        Self { router }
    }

    pub async fn execute(
        &self,
        plan: &SearchPlan,
        trace: &Arc<RunTrace>,
        cancel: &CancelToken,
    ) -> ExecutionResult {
        let started = Instant::now();
        let query = Arc::new(plan.to_query());

        let ordered = plan.sources_by_priority();
        let first_pass: Vec<String> = ordered
            .iter()
            .take(plan.first_pass_source_limit)
            .cloned()
            .collect();

        trace.add_event(
            TraceEventType::ExecutionStarted,
            AgentRole::Executor,
            format!("Starting first pass with {} sources", first_pass.len()),
            json!({"sources": first_pass, "pass": 1}),
        );

        let first_results = self
            .execute_sources(&query, &first_pass, plan, trace, cancel, started)
            .await;
        let confidence = estimate_confidence(&first_results);

        let mut result = ExecutionResult {
            execution_id: ids::fresh_id("exec"),
            plan_id: plan.plan_id.clone(),
            source_results: first_results,
            all_records: Vec::new(),
            sources_searched: Vec::new(),
            sources_failed: Vec::new(),
            pass_number: 1,
            confidence_after_pass: confidence,
            total_records: 0,
            total_execution_time_ms: 0.0,
        };
        aggregate(&mut result, 0);

        let should_expand = plan.first_pass_enabled
            && confidence < plan.second_pass_threshold
            && !cancel.is_cancelled();
        if should_expand {
            let remaining: Vec<String> = ordered
                .iter()
                .filter(|name| !first_pass.contains(name))
                .cloned()
                .collect();

            if !remaining.is_empty() {
                trace.add_event(
                    TraceEventType::ExecutionStarted,
                    AgentRole::Executor,
                    format!(
                        "Low confidence ({:.2}), expanding to {} more sources",
                        confidence,
                        remaining.len()
                    ),
                    json!({"sources": remaining, "pass": 2}),
                );

                let already = result.source_results.len();
                let second_results = self
                    .execute_sources(&query, &remaining, plan, trace, cancel, started)
                    .await;
                result.source_results.extend(second_results);
                result.pass_number = 2;
                aggregate(&mut result, already);

                result.confidence_after_pass = estimate_confidence(&result.source_results);
            }
        }

        result.total_records = result.all_records.len();
        result.total_execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            records = result.total_records,
            sources = result.sources_searched.len(),
            failed = result.sources_failed.len(),
            passes = result.pass_number,
            "execution complete"
        );

        trace.add_event_timed(
            TraceEventType::ExecutionCompleted,
            AgentRole::Executor,
            format!(
                "Execution complete: {} records from {} sources",
                result.total_records,
                result.sources_searched.len()
            ),
            json!({
                "total_records": result.total_records,
                "sources_searched": result.sources_searched,
                "sources_failed": result.sources_failed,
                "passes": result.pass_number,
            }),
            result.total_execution_time_ms,
        );

        result
    }

    async fn execute_sources(
        &self,
        query: &Arc<SearchQuery>,
        source_names: &[String],
        plan: &SearchPlan,
        trace: &Arc<RunTrace>,
        cancel: &CancelToken,
        run_started: Instant,
    ) -> Vec<SourceExecutionResult> {
        let mut join_set = JoinSet::new();

        for name in source_names {
            let budget = plan
                .budget_for(name)
                .cloned()
                .unwrap_or_else(|| SourceBudget::fallback(name.clone()));
            let router = Arc::clone(&self.router);
            let query = Arc::clone(query);
            let trace = Arc::clone(trace);
            let cancel = cancel.clone();
            let total_budget_seconds = plan.total_budget_seconds;

            join_set.spawn(async move {
                execute_single(router, query, budget, trace, cancel, run_started, total_budget_seconds)
                    .await
            });
        }

        // Results land in completion order; downstream stages treat the set
        // as unordered.
        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("source task aborted: {}", e);
                    results.push(SourceExecutionResult::failure(
                        "unknown",
                        format!("source task aborted: {}", e),
                    ));
                }
            }
        }
        results
    }
}

enum Attempt {
    Records(Vec<RawRecord>),
    Failed(String),
    Cancelled,
}

async fn execute_single(
    router: Arc<SourceRouter>,
    query: Arc<SearchQuery>,
    budget: SourceBudget,
    trace: Arc<RunTrace>,
    cancel: CancelToken,
    run_started: Instant,
    total_budget_seconds: f64,
) -> SourceExecutionResult {
    let started = Instant::now();
    let source_name = budget.source_name.clone();

    let Some(source) = router.get(&source_name) else {
        let error = format!("Source not registered: {}", source_name);
        trace.add_failure(
            TraceEventType::SourceFailed,
            AgentRole::Executor,
            error.clone(),
            json!({"source": source_name, "error": error}),
            error.clone(),
        );
        return SourceExecutionResult::failure(source_name, error);
    };

    let deadline = Duration::from_secs_f64(budget.timeout_seconds.max(0.0));
    let mut last_error = String::new();
    let mut attempts: u32 = 0;

    for attempt in 0..=budget.retry_count {
        if cancel.is_cancelled() {
            last_error = "cancelled".to_string();
            break;
        }
        // The total budget is advisory: it stops new retries, not the
        // in-flight attempt.
        if attempt > 0 && run_started.elapsed().as_secs_f64() > total_budget_seconds {
            last_error = format!("total budget exhausted; last error: {}", last_error);
            break;
        }
        attempts = attempt + 1;

        let mut attempt_cancel = cancel.clone();
        let outcome = tokio::select! {
            biased;
            _ = attempt_cancel.cancelled() => Attempt::Cancelled,
            searched = tokio::time::timeout(deadline, source.search(&query, cancel.clone())) => {
                match searched {
                    Err(_) => Attempt::Failed("timeout".to_string()),
                    Ok(Err(e)) => Attempt::Failed(e.to_string()),
                    Ok(Ok(records)) => Attempt::Records(records),
                }
            }
        };

        match outcome {
            Attempt::Records(mut records) => {
                records.truncate(budget.max_results);
                let search_time_ms = started.elapsed().as_secs_f64() * 1000.0;

                trace.add_event_timed(
                    TraceEventType::SourceSearched,
                    AgentRole::Executor,
                    format!("Source {}: {} records", source_name, records.len()),
                    json!({"source": source_name, "count": records.len()}),
                    search_time_ms,
                );

                let total_count = records.len();
                return SourceExecutionResult {
                    source_name,
                    success: true,
                    records,
                    total_count,
                    search_time_ms,
                    retry_count: attempts - 1,
                    error: None,
                };
            }
            Attempt::Failed(error) => {
                last_error = error;
            }
            Attempt::Cancelled => {
                last_error = "cancelled".to_string();
                break;
            }
        }
    }

    let search_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    trace.add_failure(
        TraceEventType::SourceFailed,
        AgentRole::Executor,
        format!(
            "Source {} failed after {} attempts: {}",
            source_name, attempts, last_error
        ),
        json!({"source": source_name, "error": last_error, "attempts": attempts}),
        last_error.clone(),
    );

    SourceExecutionResult {
        source_name,
        success: false,
        records: Vec::new(),
        total_count: 0,
        search_time_ms,
        retry_count: attempts.saturating_sub(1),
        error: Some(last_error),
    }
}

/// Folds source results from `from` onward into the aggregate record list
/// and the searched/failed rosters.
fn aggregate(result: &mut ExecutionResult, from: usize) {
    let mut appended: Vec<RawRecord> = Vec::new();
    for source_result in &result.source_results[from..] {
        if source_result.success {
            appended.extend(source_result.records.iter().cloned());
            result.sources_searched.push(source_result.source_name.clone());
        } else {
            result.sources_failed.push(source_result.source_name.clone());
        }
    }
    result.all_records.extend(appended);
}

/// Confidence after a pass: half the record yield (saturating at 10
/// records), half the fraction of sources that answered. Empty input is 0.
pub fn estimate_confidence(results: &[SourceExecutionResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }

    let successful: Vec<&SourceExecutionResult> = results.iter().filter(|r| r.success).collect();
    if successful.is_empty() {
        return 0.0;
    }

    let total_records: usize = successful.iter().map(|r| r.total_count).sum();
    let record_factor = (total_records as f64 / 10.0).min(1.0);
    let source_factor = successful.len() as f64 / results.len() as f64;

    (record_factor + source_factor) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(count: usize) -> SourceExecutionResult {
        SourceExecutionResult {
            source_name: format!("s{}", count),
            success: true,
            records: Vec::new(),
            total_count: count,
            search_time_ms: 1.0,
            retry_count: 0,
            error: None,
        }
    }

    #[test]
    fn test_confidence_empty_and_all_failed_is_zero() {
        assert_eq!(estimate_confidence(&[]), 0.0);
        assert_eq!(
            estimate_confidence(&[SourceExecutionResult::failure("a", "timeout")]),
            0.0
        );
    }

    #[test]
    fn test_confidence_saturates_on_record_count() {
        let results = vec![ok(25)];
        assert!((estimate_confidence(&results) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_mixes_record_and_source_factors() {
        let results = vec![ok(5), SourceExecutionResult::failure("b", "timeout")];
        // record_factor 0.5, source_factor 0.5.
        assert!((estimate_confidence(&results) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_is_monotone_in_added_success() {
        let mut results = vec![ok(2), SourceExecutionResult::failure("b", "timeout")];
        let before = estimate_confidence(&results);
        results.push(ok(3));
        let after = estimate_confidence(&results);
        assert!(after >= before);
    }
}
