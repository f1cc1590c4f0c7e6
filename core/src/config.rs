use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Process-wide caps the budget policy enforces on every plan.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_total_seconds: f64,
    pub max_sources: usize,
    pub max_results: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_total_seconds: 300.0,
            max_sources: 20,
            max_results: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    pub total_budget_seconds: f64,
    pub max_sources: Option<usize>,
    pub first_pass_source_limit: usize,
    pub second_pass_threshold: f64,
    pub max_total_results: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            total_budget_seconds: 120.0,
            max_sources: None,
            first_pass_source_limit: 5,
            second_pass_threshold: 0.7,
            max_total_results: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ResearchConfig {
    pub budget: BudgetConfig,
    pub planner: PlannerConfig,
}

impl ResearchConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("KINSEARCH").separator("__"));

        builder.build()?.try_deserialize()
    }
}
