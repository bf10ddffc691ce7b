use crate::model::Pathway;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Recognized workflow options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Bound on the generate/execute repair loop.
    pub max_attempts: u32,
    /// Per-stage deadline for provider calls, in milliseconds.
    pub request_timeout_ms: u64,
    /// Batch driver parallelism.
    pub worker_concurrency: usize,
    /// Pathway used when classification is not confident.
    pub fallback_pathway: Pathway,
    /// Passages requested per retrieval.
    pub retrieval_k: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            request_timeout_ms: 30_000,
            worker_concurrency: 4,
            fallback_pathway: Pathway::Hybrid,
            retrieval_k: 3,
        }
    }
}

impl WorkflowConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.fallback_pathway, Pathway::Hybrid);
        assert_eq!(config.retrieval_k, 3);
        assert!(config.worker_concurrency > 0);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: WorkflowConfig = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.request_timeout_ms, 30_000);
    }
}
