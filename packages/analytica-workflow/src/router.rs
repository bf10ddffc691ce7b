use crate::model::{Pathway, Question, RouteDecision};
use crate::providers::RouteClassifier;
use std::sync::Arc;
use tracing::warn;

/// Pathway decision policy around a pluggable classifier.
///
/// Routing never fails a request: a classifier fault or a low-confidence
/// result resolves to the configured fallback pathway.
pub struct Router {
    classifier: Arc<dyn RouteClassifier>,
    fallback: Pathway,
}

impl Router {
    pub fn new(classifier: Arc<dyn RouteClassifier>, fallback: Pathway) -> Self {
        Self {
            classifier,
            fallback,
        }
    }

    pub async fn decide(&self, question: &Question) -> RouteDecision {
        match self.classifier.classify(question).await {
            Ok(Some(decision)) => decision,
            Ok(None) => {
                warn!(
                    question_id = %question.id,
                    fallback = %self.fallback,
                    "classifier not confident, using fallback pathway"
                );
                RouteDecision::new(self.fallback)
            }
            Err(e) => {
                warn!(
                    question_id = %question.id,
                    fallback = %self.fallback,
                    error = %e,
                    "classifier fault, using fallback pathway"
                );
                RouteDecision::new(self.fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, WorkflowError};
    use async_trait::async_trait;

    struct FixedClassifier(Option<RouteDecision>);

    #[async_trait]
    impl RouteClassifier for FixedClassifier {
        async fn classify(&self, _question: &Question) -> Result<Option<RouteDecision>> {
            Ok(self.0)
        }
    }

    struct FaultyClassifier;

    #[async_trait]
    impl RouteClassifier for FaultyClassifier {
        async fn classify(&self, _question: &Question) -> Result<Option<RouteDecision>> {
            Err(WorkflowError::collaborator("routing", "model unavailable"))
        }
    }

    #[tokio::test]
    async fn test_confident_decision_passes_through() {
        let router = Router::new(
            Arc::new(FixedClassifier(Some(RouteDecision::new(Pathway::Text)))),
            Pathway::Hybrid,
        );
        let decision = router.decide(&Question::new("q1", "what is AOV?")).await;
        assert_eq!(decision.pathway, Pathway::Text);
    }

    #[tokio::test]
    async fn test_low_confidence_uses_fallback() {
        let router = Router::new(Arc::new(FixedClassifier(None)), Pathway::Hybrid);
        let decision = router.decide(&Question::new("q1", "hmm")).await;
        assert_eq!(decision.pathway, Pathway::Hybrid);
        assert!(!decision.skip_retrieval);
    }

    #[tokio::test]
    async fn test_classifier_fault_never_surfaces() {
        let router = Router::new(Arc::new(FaultyClassifier), Pathway::Hybrid);
        let decision = router.decide(&Question::new("q1", "anything")).await;
        assert_eq!(decision.pathway, Pathway::Hybrid);
    }
}
