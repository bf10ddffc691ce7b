use crate::config::WorkflowConfig;
use crate::context::{RequestContext, Stage};
use crate::error::{Result, WorkflowError};
use crate::model::{Pathway, Question, RouteDecision};
use crate::providers::{GenerationRequest, ProviderBundle, SynthesisInput};
use crate::repair::RepairController;
use crate::router::Router;
use std::future::Future;
use tracing::{error, info, warn};

/// The workflow state machine. Drives one `RequestContext` from routing to
/// a terminal state, invoking capability providers in pathway-dependent
/// order with a per-stage deadline.
///
/// Transition table:
///
/// | From        | Event                       | To           |
/// |-------------|-----------------------------|--------------|
/// | routing     | text                        | retrieving   |
/// | routing     | structured                  | generating   |
/// | routing     | hybrid                      | retrieving   |
/// | routing     | hybrid, no retrieval intent | planning     |
/// | retrieving  | done, text                  | synthesizing |
/// | retrieving  | done, hybrid                | planning     |
/// | planning    | done                        | generating   |
/// | generating  | query produced              | executing    |
/// | executing   | rows                        | synthesizing |
/// | executing   | recoverable error, budget   | generating   |
/// | executing   | otherwise                   | synthesizing (degraded) |
/// | synthesizing| answer produced             | done         |
/// | any         | collaborator fault          | failed       |
pub struct Orchestrator {
    providers: ProviderBundle,
    config: WorkflowConfig,
    router: Router,
    repair: RepairController,
}

impl Orchestrator {
    pub fn new(providers: ProviderBundle, config: WorkflowConfig) -> Self {
        let router = Router::new(providers.classifier.clone(), config.fallback_pathway);
        let repair = RepairController::new(config.max_attempts);
        Self {
            providers,
            config,
            router,
            repair,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Process one question to a terminal state. Per-request errors are
    /// absorbed into the context's status; this never returns an error.
    pub async fn process(&self, question: Question, format_hint: Option<String>) -> RequestContext {
        let mut ctx = RequestContext::new(question, format_hint);
        let mut stage = Stage::Routing;
        let mut degraded = false;

        info!(request_id = %ctx.question.id, "processing request");

        while !stage.is_terminal() {
            stage = match self.step(stage, &mut ctx, &mut degraded).await {
                Ok(next) => next,
                Err(e) => {
                    error!(
                        request_id = %ctx.question.id,
                        stage = %stage,
                        error = %e,
                        "collaborator fault, failing request"
                    );
                    // fail() only errors on an already-terminal context,
                    // which the loop condition rules out.
                    let _ = ctx.fail(stage, e.to_string());
                    Stage::Failed
                }
            };
        }

        info!(
            request_id = %ctx.question.id,
            pathway = ?ctx.pathway(),
            attempts = ctx.attempts_made(),
            status = ?ctx.status(),
            "request finished"
        );
        ctx
    }

    /// Execute one stage and return the next one.
    async fn step(
        &self,
        stage: Stage,
        ctx: &mut RequestContext,
        degraded: &mut bool,
    ) -> Result<Stage> {
        match stage {
            Stage::Routing => self.route(ctx).await,
            Stage::Retrieving => self.retrieve(ctx).await,
            Stage::Planning => self.plan(ctx).await,
            Stage::Generating => self.generate(ctx).await,
            Stage::Executing => self.execute(ctx, degraded).await,
            Stage::Synthesizing => self.synthesize(ctx, *degraded).await,
            Stage::Done | Stage::Failed => Ok(stage),
        }
    }

    async fn route(&self, ctx: &mut RequestContext) -> Result<Stage> {
        // Routing favors availability: a classifier that does not answer in
        // time is treated like a low-confidence classification.
        let decision = match tokio::time::timeout(
            self.config.request_timeout(),
            self.router.decide(&ctx.question),
        )
        .await
        {
            Ok(decision) => decision,
            Err(_) => {
                warn!(
                    request_id = %ctx.question.id,
                    "classifier deadline expired, using fallback pathway"
                );
                RouteDecision::new(self.config.fallback_pathway)
            }
        };

        ctx.set_route(decision)?;
        info!(
            request_id = %ctx.question.id,
            pathway = %decision.pathway,
            skip_retrieval = decision.skip_retrieval,
            "routed"
        );

        Ok(match decision.pathway {
            Pathway::Text => Stage::Retrieving,
            Pathway::Structured => Stage::Generating,
            Pathway::Hybrid if decision.skip_retrieval => Stage::Planning,
            Pathway::Hybrid => Stage::Retrieving,
        })
    }

    async fn retrieve(&self, ctx: &mut RequestContext) -> Result<Stage> {
        let passages = self
            .with_deadline(
                Stage::Retrieving,
                self.providers
                    .retriever
                    .search(&ctx.question.text, self.config.retrieval_k),
            )
            .await?;

        if passages.is_empty() {
            // Retrieval miss: downstream stages tolerate the empty list.
            warn!(request_id = %ctx.question.id, "no passages retrieved");
        } else {
            info!(
                request_id = %ctx.question.id,
                passages = passages.len(),
                "retrieved passages"
            );
        }
        ctx.passages = passages;

        Ok(match ctx.pathway() {
            Some(Pathway::Text) => Stage::Synthesizing,
            _ => Stage::Planning,
        })
    }

    async fn plan(&self, ctx: &mut RequestContext) -> Result<Stage> {
        let constraints = self
            .with_deadline(
                Stage::Planning,
                self.providers.planner.extract(&ctx.passages),
            )
            .await?;
        ctx.constraints = Some(constraints);
        Ok(Stage::Generating)
    }

    async fn generate(&self, ctx: &mut RequestContext) -> Result<Stage> {
        if ctx.schema.is_none() {
            let schema = self
                .with_deadline(Stage::Generating, self.providers.executor.describe_schema())
                .await?;
            ctx.schema = Some(schema);
        }
        // Borrow checker: schema is guaranteed set above.
        let schema = ctx.schema.clone().unwrap_or_default();

        // Feedback is derived from the latest failed attempt; the repair
        // controller owns its wording.
        let feedback = match (ctx.last_attempt(), ctx.last_outcome()) {
            (Some(attempt), Some(outcome)) if !outcome.is_success() => {
                Some(self.repair.build_feedback(attempt, outcome))
            }
            _ => None,
        };

        let request = GenerationRequest {
            question: &ctx.question,
            schema: &schema,
            constraints: ctx.constraints.as_ref(),
            prior_attempt: ctx.last_attempt(),
            error_feedback: feedback.as_deref(),
            attempt_number: ctx.next_attempt_number(),
        };

        let attempt = self
            .with_deadline(Stage::Generating, self.providers.generator.generate(request))
            .await?;

        info!(
            request_id = %ctx.question.id,
            attempt = attempt.attempt,
            query = %attempt.query,
            "generated query"
        );
        ctx.record_attempt(attempt)?;
        Ok(Stage::Executing)
    }

    async fn execute(&self, ctx: &mut RequestContext, degraded: &mut bool) -> Result<Stage> {
        let query = ctx
            .last_attempt()
            .map(|a| a.query.clone())
            .ok_or_else(|| WorkflowError::InvalidStateTransition {
                from: "executing".to_string(),
                to: "executing".to_string(),
            })?;

        let outcome = self
            .with_deadline(Stage::Executing, self.providers.executor.run(&query))
            .await?;

        let next = if outcome.is_success() {
            info!(
                request_id = %ctx.question.id,
                rows = outcome.row_count(),
                "query succeeded"
            );
            Stage::Synthesizing
        } else if self.repair.should_retry(&outcome, ctx.attempts_made()) {
            warn!(
                request_id = %ctx.question.id,
                attempt = ctx.attempts_made(),
                kind = ?outcome.error_kind(),
                "query failed, retrying with feedback"
            );
            Stage::Generating
        } else {
            warn!(
                request_id = %ctx.question.id,
                attempts = ctx.attempts_made(),
                kind = ?outcome.error_kind(),
                "query failed, proceeding degraded"
            );
            *degraded = true;
            Stage::Synthesizing
        };

        ctx.record_outcome(outcome)?;
        Ok(next)
    }

    async fn synthesize(&self, ctx: &mut RequestContext, degraded: bool) -> Result<Stage> {
        let input = SynthesisInput {
            question: ctx.question.clone(),
            format_hint: ctx.format_hint.clone(),
            // Routing always precedes synthesis; the fallback only guards
            // against a malformed caller-built context.
            pathway: ctx.pathway().unwrap_or(self.config.fallback_pathway),
            passages: ctx.passages.clone(),
            outcome: ctx.last_outcome().cloned(),
            query: ctx.last_attempt().map(|a| a.query.clone()),
            degraded,
        };

        // No repair loop here: a second synthesis over identical inputs
        // cannot fix a fault.
        let output = self
            .with_deadline(Stage::Synthesizing, self.providers.synthesizer.compose(&input))
            .await?;

        ctx.answer = output.answer;
        ctx.explanation = output.explanation;
        ctx.confidence = output.confidence;
        ctx.citations = output.citations;
        ctx.complete(degraded)?;
        Ok(Stage::Done)
    }

    /// Run a provider call under the per-stage deadline. Expiry is a
    /// non-recoverable fault for that stage.
    async fn with_deadline<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(WorkflowError::StageTimeout {
                stage: stage.as_str().to_string(),
                timeout_ms: self.config.request_timeout_ms,
            }),
        }
    }
}
