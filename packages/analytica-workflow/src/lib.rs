/*
 * Analytica Workflow - Hybrid Question-Answering State Machine
 *
 * Routes analytic questions over a structured dataset plus a text corpus
 * through one of three pathways (text, structured, hybrid), repairs failed
 * structured queries inside a bounded loop, and converges every pathway
 * into a single cited answer.
 *
 * Architecture:
 * - Explicit finite-state machine (Orchestrator) over a RequestContext
 * - Router with availability-first fallback pathway
 * - Bounded generate/execute repair cycle (RepairController)
 * - Capability providers behind narrow async traits
 * - Batch driver with a bounded, fault-contained worker pool
 */

pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod providers;
pub mod repair;
pub mod router;

pub use batch::{read_batch, write_reports, BatchDriver, BatchRecord};
pub use config::WorkflowConfig;
pub use context::{
    AttemptRecord, ReportStatus, RequestContext, RequestReport, RequestStatus, Stage,
};
pub use error::{Result, WorkflowError};
pub use model::{
    Citation, ExecutionErrorKind, ExecutionOutcome, Pathway, PlanConstraints, QueryAttempt,
    Question, RetrievedPassage, RouteDecision, SchemaDescriptor,
};
pub use orchestrator::Orchestrator;
pub use providers::{
    GenerationRequest, Planner, ProviderBundle, QueryExecutor, QueryGenerator, RouteClassifier,
    Retriever, SynthesisInput, SynthesisOutput, Synthesizer,
};
pub use repair::RepairController;
pub use router::Router;
