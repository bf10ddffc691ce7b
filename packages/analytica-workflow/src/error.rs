use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("collaborator fault in {stage}: {message}")]
    Collaborator { stage: String, message: String },

    #[error("{stage} deadline expired after {timeout_ms}ms")]
    StageTimeout { stage: String, timeout_ms: u64 },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("batch input error: {0}")]
    BatchInput(String),

    #[error("batch output error: {0}")]
    BatchOutput(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn collaborator(stage: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            stage: stage.to_string(),
            message: message.to_string(),
        }
    }

    pub fn parse<E: std::fmt::Display>(e: E) -> Self {
        Self::Parse(e.to_string())
    }

    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    /// True when the whole batch run must stop, not just one request.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            WorkflowError::BatchInput(_) | WorkflowError::BatchOutput(_) | WorkflowError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_fault_message() {
        let err = WorkflowError::collaborator("retrieving", "index unavailable");
        assert_eq!(
            err.to_string(),
            "collaborator fault in retrieving: index unavailable"
        );
    }

    #[test]
    fn test_batch_fatal_classification() {
        assert!(WorkflowError::BatchInput("missing file".into()).is_batch_fatal());
        assert!(!WorkflowError::collaborator("routing", "oops").is_batch_fatal());
    }
}
