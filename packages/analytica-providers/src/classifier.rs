//! Keyword-marker pathway classifier.
//!
//! A deterministic baseline for the routing capability: marker-word sets
//! separate structured (aggregate/numeric) intent from document intent.
//! Questions matching neither set are reported as not-confident and left
//! to the router's fallback policy.

use analytica_workflow::{Pathway, Question, Result, RouteClassifier, RouteDecision};
use async_trait::async_trait;
use tracing::debug;

const STRUCTURED_MARKERS: &[&str] = &[
    "how many",
    "number of",
    "count",
    "total",
    "sum of",
    "average",
    "avg",
    "top ",
    "highest",
    "lowest",
    "most ",
    "least ",
    "revenue",
    "sales",
    "freight",
    "quantity",
    "per month",
    "per year",
    "per customer",
    "per region",
];

const DOC_MARKERS: &[&str] = &[
    "policy",
    "according to",
    "documentation",
    "docs",
    "define",
    "definition",
    "what does",
    "what is meant",
    "explain",
    "describe",
    "guideline",
    "assumption",
];

// Derived metrics whose formulas live in the documentation; computing them
// needs both the docs and the database.
const METRIC_JARGON: &[&str] = &[
    "aov",
    "average order value",
    "gross margin",
    "cogs",
    "cost of goods",
    "repeat rate",
    "customer lifetime",
];

pub struct KeywordRouteClassifier;

impl KeywordRouteClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeywordRouteClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

#[async_trait]
impl RouteClassifier for KeywordRouteClassifier {
    async fn classify(&self, question: &Question) -> Result<Option<RouteDecision>> {
        let text = question.text.to_lowercase();

        let structured = matches_any(&text, STRUCTURED_MARKERS);
        let documental = matches_any(&text, DOC_MARKERS);
        let needs_definitions = matches_any(&text, METRIC_JARGON);

        let decision = match (structured, documental || needs_definitions) {
            (true, true) => Some(RouteDecision::new(Pathway::Hybrid)),
            (true, false) => Some(RouteDecision::new(Pathway::Structured)),
            (false, true) => Some(RouteDecision::new(Pathway::Text)),
            (false, false) => None,
        };

        debug!(
            question_id = %question.id,
            structured,
            documental,
            needs_definitions,
            decision = ?decision.map(|d| d.pathway),
            "classified question"
        );
        Ok(decision)
    }
}
