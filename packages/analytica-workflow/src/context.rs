use crate::error::{Result, WorkflowError};
use crate::model::{
    Citation, ExecutionOutcome, Pathway, PlanConstraints, QueryAttempt, Question, RetrievedPassage,
    RouteDecision, SchemaDescriptor,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow stage identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Routing,
    Retrieving,
    Planning,
    Generating,
    Executing,
    Synthesizing,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Routing => "routing",
            Stage::Retrieving => "retrieving",
            Stage::Planning => "planning",
            Stage::Generating => "generating",
            Stage::Executing => "executing",
            Stage::Synthesizing => "synthesizing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal status of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestStatus {
    InFlight,
    Done { degraded: bool },
    Failed { stage: Stage, error: String },
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::InFlight)
    }
}

/// One query attempt paired with its execution outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: QueryAttempt,
    pub outcome: Option<ExecutionOutcome>,
}

/// Mutable record threaded through one question's processing.
///
/// Owned exclusively by the orchestrator run driving it; the attempt
/// counter and pathway are only ever advanced here, never by a provider.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub question: Question,
    pub format_hint: Option<String>,
    decision: Option<RouteDecision>,
    pub passages: Vec<RetrievedPassage>,
    pub constraints: Option<PlanConstraints>,
    pub schema: Option<SchemaDescriptor>,
    attempts: Vec<AttemptRecord>,
    pub answer: String,
    pub explanation: String,
    pub confidence: f32,
    pub citations: Vec<Citation>,
    status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RequestContext {
    pub fn new(question: Question, format_hint: Option<String>) -> Self {
        Self {
            question,
            format_hint,
            decision: None,
            passages: Vec::new(),
            constraints: None,
            schema: None,
            attempts: Vec::new(),
            answer: String::new(),
            explanation: String::new(),
            confidence: 0.0,
            citations: Vec::new(),
            status: RequestStatus::InFlight,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record the routing decision. Immutable once set.
    pub fn set_route(&mut self, decision: RouteDecision) -> Result<()> {
        if self.decision.is_some() {
            return Err(WorkflowError::InvalidStateTransition {
                from: "routed".to_string(),
                to: "routing".to_string(),
            });
        }
        self.decision = Some(decision);
        Ok(())
    }

    pub fn route(&self) -> Option<RouteDecision> {
        self.decision
    }

    pub fn pathway(&self) -> Option<Pathway> {
        self.decision.map(|d| d.pathway)
    }

    pub fn status(&self) -> &RequestStatus {
        &self.status
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Attempt number the next generation call should carry.
    pub fn next_attempt_number(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    /// Record a generated query. Attempt numbers must be contiguous from 1
    /// and the previous attempt must already have an outcome.
    pub fn record_attempt(&mut self, attempt: QueryAttempt) -> Result<()> {
        if attempt.attempt != self.next_attempt_number() {
            return Err(WorkflowError::InvalidStateTransition {
                from: format!("attempt {}", self.attempts.len()),
                to: format!("attempt {}", attempt.attempt),
            });
        }
        if self.attempts.last().is_some_and(|r| r.outcome.is_none()) {
            return Err(WorkflowError::InvalidStateTransition {
                from: "executing".to_string(),
                to: "generating".to_string(),
            });
        }
        self.attempts.push(AttemptRecord {
            attempt,
            outcome: None,
        });
        Ok(())
    }

    /// Attach the execution outcome to the most recent attempt.
    pub fn record_outcome(&mut self, outcome: ExecutionOutcome) -> Result<()> {
        match self.attempts.last_mut() {
            Some(record) if record.outcome.is_none() => {
                record.outcome = Some(outcome);
                Ok(())
            }
            _ => Err(WorkflowError::InvalidStateTransition {
                from: "generating".to_string(),
                to: "executing".to_string(),
            }),
        }
    }

    pub fn last_attempt(&self) -> Option<&QueryAttempt> {
        self.attempts.last().map(|r| &r.attempt)
    }

    pub fn last_outcome(&self) -> Option<&ExecutionOutcome> {
        self.attempts.last().and_then(|r| r.outcome.as_ref())
    }

    /// The query that produced rows, if any attempt succeeded.
    pub fn successful_query(&self) -> Option<&QueryAttempt> {
        self.attempts
            .iter()
            .find(|r| r.outcome.as_ref().is_some_and(|o| o.is_success()))
            .map(|r| &r.attempt)
    }

    /// Transition: in-flight -> done.
    pub fn complete(&mut self, degraded: bool) -> Result<()> {
        if self.status.is_terminal() {
            return Err(WorkflowError::InvalidStateTransition {
                from: "terminal".to_string(),
                to: "done".to_string(),
            });
        }
        self.status = RequestStatus::Done { degraded };
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Transition: in-flight -> failed, recording the originating stage.
    pub fn fail(&mut self, stage: Stage, error: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(WorkflowError::InvalidStateTransition {
                from: "terminal".to_string(),
                to: "failed".to_string(),
            });
        }
        self.status = RequestStatus::Failed {
            stage,
            error: error.into(),
        };
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Final output record for the batch sink.
    pub fn report(&self) -> RequestReport {
        let (status, degraded, error) = match &self.status {
            RequestStatus::Done { degraded } => (ReportStatus::Done, *degraded, None),
            RequestStatus::Failed { stage, error } => (
                ReportStatus::Failed,
                false,
                Some(format!("{}: {}", stage, error)),
            ),
            // A report on an unfinished context only happens on driver bugs;
            // surface it as a failure rather than panicking.
            RequestStatus::InFlight => (
                ReportStatus::Failed,
                false,
                Some("request never reached a terminal state".to_string()),
            ),
        };

        let mut citations = self.citations.clone();
        citations.sort();
        citations.dedup();

        RequestReport {
            id: self.question.id.clone(),
            pathway: self.pathway(),
            status,
            degraded,
            answer: self.answer.clone(),
            explanation: self.explanation.clone(),
            confidence: self.confidence,
            citations,
            attempts: self.attempts_made(),
            sql: self.last_attempt().map(|a| a.query.clone()),
            error,
            duration_ms: self
                .finished_at
                .map(|end| (end - self.created_at).num_milliseconds().max(0) as u64)
                .unwrap_or(0),
        }
    }
}

/// Terminal status as written to the output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Done,
    Failed,
}

/// One output record per input question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestReport {
    pub id: String,
    pub pathway: Option<Pathway>,
    pub status: ReportStatus,
    pub degraded: bool,
    pub answer: String,
    pub explanation: String,
    pub confidence: f32,
    pub citations: Vec<Citation>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}
