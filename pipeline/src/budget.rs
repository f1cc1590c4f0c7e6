use crate::schemas::SearchPlan;
use kinsearch_core::config::BudgetConfig;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BudgetViolation {
    #[error("total budget {actual:.0}s exceeds max {max:.0}s")]
    TotalBudget { actual: f64, max: f64 },
    #[error("source count {actual} exceeds max {max}")]
    SourceCount { actual: usize, max: usize },
    #[error("total results {actual} exceeds max {max}")]
    TotalResults { actual: usize, max: usize },
}

/// Process-wide caps every plan must fit inside. A failing plan is adjusted,
/// never rejected; both outcomes are recorded in the trace by the manager.
pub struct BudgetPolicy {
    max_total_seconds: f64,
    max_sources: usize,
    max_results: usize,
}

impl BudgetPolicy {
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            max_total_seconds: config.max_total_seconds,
            max_sources: config.max_sources,
            max_results: config.max_results,
        }
    }

    pub fn validate(&self, plan: &SearchPlan) -> Result<(), BudgetViolation> {
        if plan.total_budget_seconds > self.max_total_seconds {
            return Err(BudgetViolation::TotalBudget {
                actual: plan.total_budget_seconds,
                max: self.max_total_seconds,
            });
        }
        if plan.source_budgets.len() > self.max_sources {
            return Err(BudgetViolation::SourceCount {
                actual: plan.source_budgets.len(),
                max: self.max_sources,
            });
        }
        let total_results = plan.total_max_results();
        if total_results > self.max_results {
            return Err(BudgetViolation::TotalResults {
                actual: total_results,
                max: self.max_results,
            });
        }
        Ok(())
    }

    /// Fits a plan inside the caps, preserving source ordering: trim the
    /// source list, scale per-source result limits proportionally, clamp the
    /// time budget. A plan already within the caps comes back unchanged.
    pub fn adjust(&self, plan: &SearchPlan) -> SearchPlan {
        let mut adjusted = plan.clone();

        adjusted.source_budgets.truncate(self.max_sources);

        let total_results = adjusted.total_max_results();
        if total_results > self.max_results && !adjusted.source_budgets.is_empty() {
            let factor = self.max_results as f64 / total_results as f64;
            for budget in &mut adjusted.source_budgets {
                budget.max_results = ((budget.max_results as f64 * factor) as usize).max(1);
            }
        }

        adjusted.total_budget_seconds = adjusted.total_budget_seconds.min(self.max_total_seconds);

        adjusted
    }
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self::new(&BudgetConfig::default())
    }
}
