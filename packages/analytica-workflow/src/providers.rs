use crate::error::Result;
use crate::model::{
    Citation, ExecutionOutcome, Pathway, PlanConstraints, QueryAttempt, Question, RetrievedPassage,
    RouteDecision, SchemaDescriptor,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Pathway classification capability.
///
/// `Ok(None)` means the classifier could not reach a confident decision;
/// the router resolves that locally via the configured fallback and never
/// surfaces it as an error.
#[async_trait]
pub trait RouteClassifier: Send + Sync {
    async fn classify(&self, question: &Question) -> Result<Option<RouteDecision>>;
}

/// Document retrieval capability.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns at most `k` passages, most relevant first. An empty result
    /// is a valid outcome (retrieval miss), not an error.
    async fn search(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>>;
}

/// Constraint extraction capability.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Empty passages must yield empty constraints.
    async fn extract(&self, passages: &[RetrievedPassage]) -> Result<PlanConstraints>;
}

/// Everything the generator may consult for one attempt.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub question: &'a Question,
    pub schema: &'a SchemaDescriptor,
    pub constraints: Option<&'a PlanConstraints>,
    pub prior_attempt: Option<&'a QueryAttempt>,
    pub error_feedback: Option<&'a str>,
    /// Attempt number the produced `QueryAttempt` must carry; owned by the
    /// orchestrator, never advanced by the generator.
    pub attempt_number: u32,
}

/// Structured-query generation capability.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<QueryAttempt>;
}

/// Structured-query execution capability.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execution errors are reported inside the outcome, classified by
    /// kind; an `Err` return is reserved for faults outside the executor's
    /// documented outcomes (collaborator fault).
    async fn run(&self, query: &str) -> Result<ExecutionOutcome>;

    /// CREATE statements of the structured source, fetched once per
    /// request before the first generation.
    async fn describe_schema(&self) -> Result<SchemaDescriptor>;
}

/// Converged evidence handed to the synthesizer, exactly once per request.
#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub question: Question,
    pub format_hint: Option<String>,
    pub pathway: Pathway,
    pub passages: Vec<RetrievedPassage>,
    /// Outcome of the last execution attempt, if the pathway ran one.
    pub outcome: Option<ExecutionOutcome>,
    /// Query text of the last attempt, for structured citations.
    pub query: Option<String>,
    /// Repair attempts exhausted or short-circuited without rows.
    pub degraded: bool,
}

/// Synthesizer output mapped back onto the request context.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub answer: String,
    pub explanation: String,
    pub confidence: f32,
    pub citations: Vec<Citation>,
}

/// Answer composition capability. Must be pure in its input: identical
/// `SynthesisInput` yields an identical output.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn compose(&self, input: &SynthesisInput) -> Result<SynthesisOutput>;
}

/// Immutable capability bundle, constructed once at process start and
/// shared by reference across all orchestrator runs.
#[derive(Clone)]
pub struct ProviderBundle {
    pub classifier: Arc<dyn RouteClassifier>,
    pub retriever: Arc<dyn Retriever>,
    pub planner: Arc<dyn Planner>,
    pub generator: Arc<dyn QueryGenerator>,
    pub executor: Arc<dyn QueryExecutor>,
    pub synthesizer: Arc<dyn Synthesizer>,
}
