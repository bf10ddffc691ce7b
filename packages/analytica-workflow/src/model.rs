use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};

/// Immutable input question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Processing pathway, decided once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pathway {
    Text,
    Structured,
    Hybrid,
}

impl Pathway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pathway::Text => "text",
            Pathway::Structured => "structured",
            Pathway::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Pathway::Text),
            "structured" => Ok(Pathway::Structured),
            "hybrid" => Ok(Pathway::Hybrid),
            _ => Err(WorkflowError::parse(format!("invalid pathway: {}", s))),
        }
    }

    /// Does this pathway run the generate/execute cycle at all?
    pub fn uses_structured_query(&self) -> bool {
        matches!(self, Pathway::Structured | Pathway::Hybrid)
    }

    /// Does this pathway consult the document index?
    pub fn uses_retrieval(&self) -> bool {
        matches!(self, Pathway::Text | Pathway::Hybrid)
    }
}

impl std::fmt::Display for Pathway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Router output: pathway plus the hybrid retrieval-skip sub-decision.
///
/// `skip_retrieval` is only meaningful for `Pathway::Hybrid`; a hybrid
/// question with no retrievable intent goes straight to planning over an
/// empty passage list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub pathway: Pathway,
    pub skip_retrieval: bool,
}

impl RouteDecision {
    pub fn new(pathway: Pathway) -> Self {
        Self {
            pathway,
            skip_retrieval: false,
        }
    }

    pub fn hybrid_without_retrieval() -> Self {
        Self {
            pathway: Pathway::Hybrid,
            skip_retrieval: true,
        }
    }
}

/// One retrieved document chunk, most relevant first in sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub doc_id: String,
    pub content: String,
    pub score: f32,
}

/// Structured hints extracted from passages; opaque to the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanConstraints {
    pub hints: Vec<String>,
}

impl PlanConstraints {
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

/// Schema description handed to the query generator (CREATE statements).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDescriptor(pub String);

impl SchemaDescriptor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One generated query, numbered from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAttempt {
    pub query: String,
    pub attempt: u32,
    /// Error feedback from the prior attempt, if any.
    pub feedback: Option<String>,
}

/// Classified executor error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionErrorKind {
    Syntax,
    SchemaMismatch,
    Timeout,
    AccessDenied,
    Unknown,
}

impl ExecutionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionErrorKind::Syntax => "syntax",
            ExecutionErrorKind::SchemaMismatch => "schema-mismatch",
            ExecutionErrorKind::Timeout => "timeout",
            ExecutionErrorKind::AccessDenied => "access-denied",
            ExecutionErrorKind::Unknown => "unknown",
        }
    }

    /// Only syntax and schema-reference errors are worth regenerating for.
    /// Timeouts, access denials and unclassified errors short-circuit the
    /// repair loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExecutionErrorKind::Syntax | ExecutionErrorKind::SchemaMismatch
        )
    }
}

impl std::fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running one query attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
    },
    Failure {
        kind: ExecutionErrorKind,
        message: String,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Rows { .. })
    }

    pub fn error_kind(&self) -> Option<ExecutionErrorKind> {
        match self {
            ExecutionOutcome::Rows { .. } => None,
            ExecutionOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            ExecutionOutcome::Rows { rows, .. } => rows.len(),
            ExecutionOutcome::Failure { .. } => 0,
        }
    }
}

/// Reference to evidence used in the final answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub locator: String,
}

impl Citation {
    /// Cite a retrieved document chunk.
    pub fn passage(doc_id: impl Into<String>) -> Self {
        Self {
            source: "docs".to_string(),
            locator: doc_id.into(),
        }
    }

    /// Cite a table of the structured data source.
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            source: "database".to_string(),
            locator: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathway_roundtrip() {
        for pathway in &[Pathway::Text, Pathway::Structured, Pathway::Hybrid] {
            let s = pathway.as_str();
            let parsed = Pathway::from_str(s).unwrap();
            assert_eq!(*pathway, parsed);
        }
    }

    #[test]
    fn test_pathway_invalid() {
        assert!(Pathway::from_str("sql").is_err());
    }

    #[test]
    fn test_pathway_capability_usage() {
        assert!(!Pathway::Text.uses_structured_query());
        assert!(Pathway::Structured.uses_structured_query());
        assert!(!Pathway::Structured.uses_retrieval());
        assert!(Pathway::Hybrid.uses_retrieval());
        assert!(Pathway::Hybrid.uses_structured_query());
    }

    #[test]
    fn test_recoverable_error_kinds() {
        assert!(ExecutionErrorKind::Syntax.is_recoverable());
        assert!(ExecutionErrorKind::SchemaMismatch.is_recoverable());
        assert!(!ExecutionErrorKind::Timeout.is_recoverable());
        assert!(!ExecutionErrorKind::AccessDenied.is_recoverable());
        assert!(!ExecutionErrorKind::Unknown.is_recoverable());
    }

    #[test]
    fn test_outcome_accessors() {
        let rows = ExecutionOutcome::Rows {
            columns: vec!["n".to_string()],
            rows: vec![vec![serde_json::json!(5)]],
        };
        assert!(rows.is_success());
        assert_eq!(rows.row_count(), 1);
        assert_eq!(rows.error_kind(), None);

        let failure = ExecutionOutcome::Failure {
            kind: ExecutionErrorKind::Syntax,
            message: "near \"SELEC\": syntax error".to_string(),
        };
        assert!(!failure.is_success());
        assert_eq!(failure.error_kind(), Some(ExecutionErrorKind::Syntax));
    }

    #[test]
    fn test_citation_constructors() {
        let doc = Citation::passage("kpi_definitions.md::chunk_2");
        assert_eq!(doc.source, "docs");

        let table = Citation::table("Orders");
        assert_eq!(table.source, "database");
        assert_eq!(table.locator, "Orders");
    }
}
