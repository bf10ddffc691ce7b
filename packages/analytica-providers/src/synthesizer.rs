//! Deterministic template synthesizer.
//!
//! Composes the final answer from whatever evidence converged: rows from
//! the structured source, retrieved passages, or neither. Pure in its
//! input, so identical `SynthesisInput` always yields an identical answer.

use analytica_workflow::{
    Citation, ExecutionOutcome, Result, SynthesisInput, SynthesisOutput, Synthesizer,
};
use async_trait::async_trait;

const EXCERPT_CHARS: usize = 240;

pub struct TemplateSynthesizer;

impl TemplateSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TemplateSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for TemplateSynthesizer {
    async fn compose(&self, input: &SynthesisInput) -> Result<SynthesisOutput> {
        let mut citations: Vec<Citation> = input
            .passages
            .iter()
            .map(|p| Citation::passage(&p.doc_id))
            .collect();

        let rows_available = input.outcome.as_ref().is_some_and(|o| o.is_success());
        if rows_available {
            if let Some(query) = &input.query {
                citations.extend(tables_in_query(query).into_iter().map(Citation::table));
            }
        }

        let (answer, explanation) = compose_answer(input);
        let answer = normalize_answer(&answer, input.format_hint.as_deref());

        // Supporting documentation carries the answer whenever present and
        // nothing went wrong; rows alone rank below that.
        let confidence = if input.degraded {
            0.3
        } else if !input.passages.is_empty() {
            0.9
        } else if rows_available {
            0.7
        } else {
            0.1
        };

        Ok(SynthesisOutput {
            answer,
            explanation,
            confidence,
            citations,
        })
    }
}

fn compose_answer(input: &SynthesisInput) -> (String, String) {
    let top_passage = input.passages.first();

    if input.degraded {
        let error = match &input.outcome {
            Some(ExecutionOutcome::Failure { message, .. }) => message.clone(),
            _ => "structured query unavailable".to_string(),
        };
        return match top_passage {
            Some(passage) => (
                format!(
                    "The structured query could not be completed ({}). Based on the documentation: {}",
                    error,
                    excerpt(&passage.content)
                ),
                format!(
                    "Answered from {} retrieved passage(s) after exhausting query repair.",
                    input.passages.len()
                ),
            ),
            None => (
                format!("Unable to produce a confident result: {}", error),
                "No rows and no supporting documentation were available.".to_string(),
            ),
        };
    }

    match &input.outcome {
        Some(ExecutionOutcome::Rows { columns, rows }) => {
            let answer = if rows.is_empty() {
                "No rows matched the query.".to_string()
            } else if rows.len() == 1 && columns.len() == 1 {
                value_text(&rows[0][0])
            } else {
                let preview: Vec<String> = rows[0].iter().map(value_text).collect();
                format!(
                    "{} row(s) returned; first row: {}",
                    rows.len(),
                    preview.join(", ")
                )
            };
            let explanation = format!(
                "Derived from {} row(s) returned by the structured source ({} pathway).",
                rows.len(),
                input.pathway
            );
            (answer, explanation)
        }
        _ => match top_passage {
            Some(passage) => (
                excerpt(&passage.content),
                format!(
                    "Answered from {} retrieved passage(s); no structured query was run.",
                    input.passages.len()
                ),
            ),
            None => (
                "No supporting documentation was found for this question.".to_string(),
                "Retrieval returned no passages and no structured query was run.".to_string(),
            ),
        },
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

/// Tables referenced by the executed query (after FROM/JOIN), for
/// structured citations.
pub fn tables_in_query(query: &str) -> Vec<String> {
    let upper = query.to_ascii_uppercase();
    let mut tables = Vec::new();

    for keyword in ["FROM ", "JOIN "] {
        let mut search_from = 0;
        while let Some(pos) = upper[search_from..].find(keyword) {
            let at = search_from + pos;
            let after = at + keyword.len();
            let word_boundary = at == 0 || !upper.as_bytes()[at - 1].is_ascii_alphanumeric();
            if word_boundary {
                if let Some(name) = leading_ident(&query[after..]) {
                    tables.push(name);
                }
            }
            search_from = after;
        }
    }

    tables.sort();
    tables.dedup();
    tables
}

fn leading_ident(text: &str) -> Option<String> {
    let text = text.trim_start();
    if let Some(rest) = text.strip_prefix('[') {
        return rest.split(']').next().map(str::to_string);
    }
    if let Some(rest) = text.strip_prefix('"') {
        return rest.split('"').next().map(str::to_string);
    }
    let ident: String = text
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if ident.is_empty() {
        None
    } else {
        Some(ident)
    }
}

/// Normalize the answer text to the requested shape: `int`, `float`,
/// `list[...]` or `dict` hints coerce the text; anything else passes
/// through trimmed.
pub fn normalize_answer(answer: &str, format_hint: Option<&str>) -> String {
    let answer = answer.trim();
    let hint = format_hint.unwrap_or("").to_lowercase();

    if hint == "int" {
        return first_number(answer, false).unwrap_or_else(|| "0".to_string());
    }
    if hint == "float" {
        return first_number(answer, true).unwrap_or_else(|| "0.0".to_string());
    }
    if hint.contains("list") {
        if answer.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(answer) {
                return value.to_string();
            }
        }
        let items: Vec<serde_json::Value> = answer
            .split(',')
            .map(|s| serde_json::Value::String(s.trim().to_string()))
            .collect();
        return serde_json::Value::Array(items).to_string();
    }
    if hint.contains("dict") {
        if answer.starts_with('{') {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(answer) {
                return value.to_string();
            }
        }
        return serde_json::json!({ "value": answer }).to_string();
    }

    answer.to_string()
}

/// First numeric token in the text, optionally with a decimal part.
fn first_number(text: &str, allow_decimal: bool) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() || (chars[i] == '-' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())) {
            let start = i;
            if chars[i] == '-' {
                i += 1;
            }
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if allow_decimal && i < chars.len() && chars[i] == '.' {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            return Some(chars[start..i].iter().collect());
        }
        i += 1;
    }
    None
}
