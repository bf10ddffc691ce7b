//! Heuristic constraint planner.

use analytica_workflow::{PlanConstraints, Planner, Result, RetrievedPassage};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::debug;

const HINT_TRIGGERS: &[&str] = &["assume", "defined as", "formula", "calculated as", "excludes"];
const MAX_HINTS: usize = 8;

/// Extracts query-relevant hints from retrieved passages: year tokens and
/// definition/assumption sentences. Empty passages yield empty constraints.
pub struct HeuristicPlanner;

impl HeuristicPlanner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for HeuristicPlanner {
    async fn extract(&self, passages: &[RetrievedPassage]) -> Result<PlanConstraints> {
        // BTreeSet keeps hints deduplicated and deterministic.
        let mut hints = BTreeSet::new();

        for passage in passages {
            for year in year_tokens(&passage.content) {
                hints.insert(format!("year mentioned: {}", year));
            }
            for sentence in sentences(&passage.content) {
                let lower = sentence.to_lowercase();
                if HINT_TRIGGERS.iter().any(|t| lower.contains(t)) {
                    hints.insert(sentence.trim().to_string());
                }
            }
        }

        let hints: Vec<String> = hints.into_iter().take(MAX_HINTS).collect();
        debug!(hints = hints.len(), passages = passages.len(), "extracted constraints");
        Ok(PlanConstraints { hints })
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '\n']).filter(|s| !s.trim().is_empty())
}

/// Four-digit year tokens (19xx/20xx) standing alone in the text.
fn year_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|tok| tok.len() == 4 && (tok.starts_with("19") || tok.starts_with("20")))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(content: &str) -> RetrievedPassage {
        RetrievedPassage {
            doc_id: "kpi.md::chunk_0".to_string(),
            content: content.to_string(),
            score: 1.0,
        }
    }

    #[tokio::test]
    async fn test_empty_passages_yield_empty_constraints() {
        let constraints = HeuristicPlanner::new().extract(&[]).await.unwrap();
        assert!(constraints.is_empty());
    }

    #[tokio::test]
    async fn test_extracts_years_and_assumptions() {
        let constraints = HeuristicPlanner::new()
            .extract(&[passage(
                "Fiscal reporting covers 1997 and 1998. Assume cost of goods is 0.7 * UnitPrice.",
            )])
            .await
            .unwrap();

        assert!(constraints
            .hints
            .iter()
            .any(|h| h == "year mentioned: 1997"));
        assert!(constraints
            .hints
            .iter()
            .any(|h| h.contains("0.7 * UnitPrice")));
    }

    #[tokio::test]
    async fn test_hints_are_deduplicated() {
        let constraints = HeuristicPlanner::new()
            .extract(&[
                passage("Revenue peaked in 1997."),
                passage("Orders doubled in 1997."),
            ])
            .await
            .unwrap();

        let year_hints: Vec<_> = constraints
            .hints
            .iter()
            .filter(|h| h.contains("1997"))
            .collect();
        assert_eq!(year_hints.len(), 1);
    }
}
