use adjudicator::Adjudicator;
use kinsearch_core::config::ResearchConfig;
use pipeline::manager::{PipelineManager, ResearchRequest};
use pipeline::schemas::ManagerResponse;
use pipeline::verifier::EvidenceVerifier;
use sources::router::{RouterError, SourceRouter};
use sources::source::GenealogySource;
use sources::CancelToken;
use std::sync::Arc;

pub use adjudicator::weighted::WeightedAdjudicator;
pub use kinsearch_core::init_tracing;
pub use pipeline::manager::RequestValidationError;
pub use sources::cancel::{cancel_pair, CancelHandle};
pub use sources::MockSource;

/// Entry point for callers: register sources once, then run GPS research
/// queries against them.
///
/// ```no_run
/// # async fn demo() {
/// use kinsearch_sdk::{ResearchClient, MockSource};
/// use pipeline::manager::ResearchRequest;
/// use sources::source::Tier;
/// use std::sync::Arc;
///
/// let client = ResearchClient::builder()
///     .register_source(Arc::new(MockSource::new("freebmd", Tier::Derivative)))
///     .unwrap()
///     .build();
///
/// let request = ResearchRequest {
///     surname: Some("Smith".to_string()),
///     birth_year: Some(1880),
///     ..ResearchRequest::default()
/// };
/// let response = client.run(&request).await;
/// assert!(response.success);
/// # }
/// ```
pub struct ResearchClient {
    manager: PipelineManager,
}

impl ResearchClient {
    pub fn builder() -> ResearchClientBuilder {
        ResearchClientBuilder::default()
    }

    pub async fn run(&self, request: &ResearchRequest) -> ManagerResponse {
        self.manager.run(request).await
    }

    pub async fn run_with_cancel(
        &self,
        request: &ResearchRequest,
        cancel: CancelToken,
    ) -> ManagerResponse {
        self.manager.run_with_cancel(request, cancel).await
    }
}

#[derive(Default)]
pub struct ResearchClientBuilder {
    router: SourceRouter,
    config: Option<ResearchConfig>,
    adjudicator: Option<Arc<dyn Adjudicator>>,
}

impl ResearchClientBuilder {
    pub fn register_source(
        mut self,
        source: Arc<dyn GenealogySource>,
    ) -> Result<Self, RouterError> {
        self.router.register(source)?;
        Ok(self)
    }

    pub fn with_config(mut self, config: ResearchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_adjudicator(mut self, adjudicator: Arc<dyn Adjudicator>) -> Self {
        self.adjudicator = Some(adjudicator);
        self
    }

    pub fn build(self) -> ResearchClient {
        let router = Arc::new(self.router);
        let config = self.config.unwrap_or_default();

        let mut manager = PipelineManager::with_config(router, config);
        if let Some(adjudicator) = self.adjudicator {
            manager = manager.with_verifier(EvidenceVerifier::with_adjudicator(adjudicator));
        }

        ResearchClient { manager }
    }
}
