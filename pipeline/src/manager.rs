use crate::budget::BudgetPolicy;
use crate::executor::SourceExecutor;
use crate::planner::QueryPlanner;
use crate::resolver::EntityResolver;
use crate::schemas::ManagerResponse;
use crate::synthesizer::SynthesisAgent;
use crate::verifier::EvidenceVerifier;
use adjudicator::weighted::WeightedAdjudicator;
use kinsearch_core::config::ResearchConfig;
use kinsearch_core::error::{ErrorKind, KinsearchError};
use kinsearch_core::query::SearchQuery;
use kinsearch_core::record::RawRecord;
use kinsearch_core::trace::{AgentRole, RunTrace, TraceEventType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sources::{CancelToken, SourceRouter};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Caller-facing research request, the whole exposed input surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResearchRequest {
    pub surname: Option<String>,
    pub given_name: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_place: Option<String>,
    pub death_year: Option<i32>,
    pub record_types: Vec<String>,
    pub region: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("surname is required unless given name plus a birth anchor are present")]
    MissingSurname,
}

impl ResearchRequest {
    pub fn parse_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), RequestValidationError> {
        let has_surname = self
            .surname
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if has_surname || self.to_query().has_strong_identifiers() {
            Ok(())
        } else {
            Err(RequestValidationError::MissingSurname)
        }
    }

    pub fn to_query(&self) -> SearchQuery {
        SearchQuery {
            surname: self.surname.clone().filter(|s| !s.trim().is_empty()),
            given_name: self.given_name.clone(),
            birth_year: self.birth_year,
            birth_place: self.birth_place.clone(),
            death_year: self.death_year,
            record_types: self.record_types.clone(),
            ..SearchQuery::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid research request: {0}")]
    InvalidRequest(#[from] RequestValidationError),
}

impl KinsearchError for PipelineError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidRequest(_) => ErrorKind::Configuration,
        }
    }
}

/// Drives the staged pipeline: plan, budget check, execute, resolve, then
/// verify and synthesize per entity. Owns the run trace; stage artifacts
/// flow forward read-only.
pub struct PipelineManager {
    planner: QueryPlanner,
    executor: SourceExecutor,
    resolver: EntityResolver,
    verifier: EvidenceVerifier,
    synthesizer: SynthesisAgent,
    budget_policy: BudgetPolicy,
    config: ResearchConfig,
}

impl PipelineManager {
    pub fn new(router: Arc<SourceRouter>) -> Self {
        Self::with_config(router, ResearchConfig::default())
    }

    pub fn with_config(router: Arc<SourceRouter>, config: ResearchConfig) -> Self {
        Self {
            planner: QueryPlanner::with_config(Arc::clone(&router), config.planner.clone()),
            executor: SourceExecutor::new(Arc::clone(&router)),
            resolver: EntityResolver::new(),
            verifier: EvidenceVerifier::with_adjudicator(Arc::new(
                WeightedAdjudicator::default(),
            )),
            synthesizer: SynthesisAgent::new(),
            budget_policy: BudgetPolicy::new(&config.budget),
            config,
        }
    }

    pub fn with_verifier(mut self, verifier: EvidenceVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub async fn run(&self, request: &ResearchRequest) -> ManagerResponse {
        self.run_with_cancel(request, CancelToken::never()).await
    }

    pub async fn run_with_cancel(
        &self,
        request: &ResearchRequest,
        cancel: CancelToken,
    ) -> ManagerResponse {
        let original_query = serde_json::to_value(request).unwrap_or(Value::Null);
        let trace = Arc::new(RunTrace::new(original_query));

        match self.run_stages(request, &trace, cancel).await {
            Ok(response) => response,
            Err(e) => {
                error!("pipeline error: {}", e);
                trace.add_error(AgentRole::Manager, format!("Pipeline error: {}", e), e.to_string());
                trace.finalize(false, Some(e.to_string()));
                ManagerResponse {
                    synthesis: None,
                    all_syntheses: Vec::new(),
                    trace: trace.snapshot(),
                    success: false,
                    error: Some(e.to_string()),
                    requires_human_decision: false,
                }
            }
        }
    }

    async fn run_stages(
        &self,
        request: &ResearchRequest,
        trace: &Arc<RunTrace>,
        cancel: CancelToken,
    ) -> Result<ManagerResponse, PipelineError> {
        request.validate()?;
        let query = request.to_query();

        let mut plan = self.planner.create_plan(
            &query,
            request.region.as_deref(),
            self.config.planner.max_sources,
            self.config.planner.total_budget_seconds,
        );
        trace.add_event(
            TraceEventType::PlanCreated,
            AgentRole::Planner,
            format!("Created search plan with {} sources", plan.source_budgets.len()),
            json!({
                "plan_id": plan.plan_id,
                "sources": plan.sources_by_priority(),
                "surname_variants": plan.surname_variants,
                "region": plan.region.map(|r| r.to_string()),
            }),
        );

        match self.budget_policy.validate(&plan) {
            Ok(()) => {
                trace.add_event(
                    TraceEventType::BudgetCheck,
                    AgentRole::BudgetPolicy,
                    "Plan validated against budget constraints",
                    json!({
                        "budget_seconds": plan.total_budget_seconds,
                        "source_count": plan.source_budgets.len(),
                        "max_results": plan.total_max_results(),
                    }),
                );
            }
            Err(violation) => {
                plan = self.budget_policy.adjust(&plan);
                trace.add_event(
                    TraceEventType::BudgetCheck,
                    AgentRole::BudgetPolicy,
                    format!("Plan adjusted: {}", violation),
                    json!({
                        "adjusted": true,
                        "source_count": plan.source_budgets.len(),
                        "max_results": plan.total_max_results(),
                        "budget_seconds": plan.total_budget_seconds,
                    }),
                );
            }
        }

        let execution = self.executor.execute(&plan, trace, &cancel).await;
        if execution.total_records == 0 {
            info!("no records found; finalizing with empty synthesis");
            trace.finalize(true, None);
            return Ok(self.empty_response(trace));
        }

        let clusters = self.resolver.resolve(&execution, trace);
        if clusters.total_entities == 0 {
            info!("no entities resolved; finalizing with empty synthesis");
            trace.finalize(true, None);
            return Ok(self.empty_response(trace));
        }

        let mut records_by_entity: HashMap<String, Vec<RawRecord>> = HashMap::new();
        for record in &execution.all_records {
            if let Some(fingerprint) = EntityResolver::fingerprint(record) {
                records_by_entity
                    .entry(fingerprint)
                    .or_default()
                    .push(record.clone());
            }
        }

        let mut all_syntheses = Vec::new();
        for entity in &clusters.entities {
            let records = records_by_entity
                .get(&entity.entity_id)
                .cloned()
                .unwrap_or_default();

            let evidence = self.verifier.verify(entity, &records, trace).await;
            let synthesis = self
                .synthesizer
                .synthesize(entity, &evidence, &records, trace);
            all_syntheses.push(synthesis);
        }

        let requires_human_decision = all_syntheses
            .iter()
            .any(|synthesis| !synthesis.contested_fields.is_empty());

        trace.finalize(true, None);

        Ok(ManagerResponse {
            synthesis: all_syntheses.first().cloned(),
            all_syntheses,
            trace: trace.snapshot(),
            success: true,
            error: None,
            requires_human_decision,
        })
    }

    fn empty_response(&self, trace: &RunTrace) -> ManagerResponse {
        ManagerResponse {
            synthesis: None,
            all_syntheses: Vec::new(),
            trace: trace.snapshot(),
            success: true,
            error: None,
            requires_human_decision: false,
        }
    }
}
