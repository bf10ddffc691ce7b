//! Rule-based structured-query generator.
//!
//! A deterministic baseline for the generation capability: picks a target
//! table by matching schema table names against the question, aggregates
//! on count/total/average intent, and consumes repair feedback by
//! re-picking the table or dropping the column choice.

use analytica_workflow::{GenerationRequest, QueryAttempt, QueryGenerator, Result};
use async_trait::async_trait;
use tracing::debug;

pub struct RuleBasedGenerator;

impl RuleBasedGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RuleBasedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryGenerator for RuleBasedGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<QueryAttempt> {
        let question = request.question.text.to_lowercase();
        let schema = request.schema.as_str();
        let feedback = request.error_feedback.unwrap_or("");

        let tables = table_names(schema);
        let table = pick_table(&tables, &question, feedback);

        let query = match table {
            Some(table) => build_query(schema, &table, &question, feedback),
            // No schema available at all: probe the source so the failure
            // is classified by the executor rather than invented here.
            None => "SELECT name FROM sqlite_master WHERE type = 'table'".to_string(),
        };

        let query = sanitize_query(&query);
        debug!(attempt = request.attempt_number, query = %query, "generated query");

        Ok(QueryAttempt {
            query,
            attempt: request.attempt_number,
            feedback: request.error_feedback.map(str::to_string),
        })
    }
}

fn build_query(schema: &str, table: &str, question: &str, feedback: &str) -> String {
    let target = quote_ident(table);
    let column_feedback = feedback.contains("no such column");

    if question.contains("how many") || question.contains("number of") || question.contains("count")
    {
        return format!("SELECT COUNT(*) FROM {}", target);
    }

    if !column_feedback {
        let aggregate = if question.contains("total") || question.contains("sum of") {
            Some("SUM")
        } else if question.contains("average") || question.contains("avg") {
            Some("AVG")
        } else {
            None
        };
        if let Some(func) = aggregate {
            if let Some(column) = pick_numeric_column(schema, table, question) {
                return format!("SELECT {}({}) FROM {}", func, quote_ident(&column), target);
            }
        }
    }

    format!("SELECT * FROM {} LIMIT 25", target)
}

/// Prefer a table mentioned in the question; skip tables the feedback says
/// do not exist.
fn pick_table(tables: &[String], question: &str, feedback: &str) -> Option<String> {
    let usable: Vec<&String> = tables
        .iter()
        .filter(|t| !feedback.contains(&format!("no such table: {}", t)))
        .collect();

    // Longest match wins so "Order Details" beats "Orders".
    usable
        .iter()
        .filter(|t| {
            let name = t.to_lowercase();
            question.contains(&name) || question.contains(name.trim_end_matches('s'))
        })
        .max_by_key(|t| t.len())
        .copied()
        .or_else(|| usable.first().copied())
        .cloned()
}

/// Table/view names from the CREATE statements of a schema descriptor.
fn table_names(schema: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in schema.lines() {
        let trimmed = line.trim();
        let rest = trimmed
            .strip_prefix("CREATE TABLE ")
            .or_else(|| trimmed.strip_prefix("CREATE VIEW "))
            .or_else(|| trimmed.strip_prefix("create table "))
            .or_else(|| trimmed.strip_prefix("create view "));
        if let Some(rest) = rest {
            if let Some(name) = parse_ident(rest) {
                names.push(name);
            }
        }
    }
    names
}

/// First numeric column of the table, preferring one named in the question.
fn pick_numeric_column(schema: &str, table: &str, question: &str) -> Option<String> {
    let columns = numeric_columns(schema, table);
    columns
        .iter()
        .find(|c| question.contains(&c.to_lowercase()))
        .or_else(|| columns.first())
        .cloned()
}

fn numeric_columns(schema: &str, table: &str) -> Vec<String> {
    const NUMERIC_TYPES: &[&str] = &["INT", "REAL", "NUM", "DEC", "FLOAT", "DOUBLE", "MONEY"];
    const CONSTRAINT_KEYWORDS: &[&str] =
        &["PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "CONSTRAINT", "CREATE"];

    let mut columns = Vec::new();
    let mut in_table = false;
    for line in schema.lines() {
        let trimmed = line.trim().trim_end_matches(',');
        if trimmed.to_uppercase().starts_with("CREATE TABLE") {
            in_table = parse_ident(
                trimmed["CREATE TABLE".len()..].trim_start(),
            )
            .as_deref()
                == Some(table);
            continue;
        }
        if !in_table {
            continue;
        }
        if trimmed.starts_with(')') {
            in_table = false;
            continue;
        }

        let Some(name) = parse_ident(trimmed) else {
            continue;
        };
        if CONSTRAINT_KEYWORDS.contains(&name.to_uppercase().as_str()) {
            continue;
        }
        let type_part = trimmed
            .split_once(|c: char| c.is_whitespace())
            .map(|(_, rest)| rest.to_uppercase())
            .unwrap_or_default();
        if NUMERIC_TYPES.iter().any(|t| type_part.contains(t)) {
            columns.push(name);
        }
    }
    columns
}

/// Leading identifier of a definition line: bare, [bracketed] or "quoted".
fn parse_ident(text: &str) -> Option<String> {
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

/// Bracket-quote identifiers that need it (names with spaces).
fn quote_ident(name: &str) -> String {
    if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("[{}]", name)
    }
}

/// Strip markdown code fences and surrounding whitespace from generated
/// query text.
pub fn sanitize_query(raw: &str) -> String {
    let mut query = raw.trim();
    if let Some(rest) = query.strip_prefix("```sql") {
        query = rest;
    } else if let Some(rest) = query.strip_prefix("```") {
        query = rest;
    }
    if let Some(rest) = query.strip_suffix("```") {
        query = rest;
    }
    query.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytica_workflow::{Question, SchemaDescriptor};

    const SCHEMA: &str = "CREATE TABLE Orders (\n    OrderID INTEGER PRIMARY KEY,\n    CustomerID TEXT NOT NULL,\n    Freight REAL NOT NULL\n)\n\nCREATE TABLE [Order Details] (\n    OrderID INTEGER NOT NULL,\n    UnitPrice REAL NOT NULL,\n    Quantity INTEGER NOT NULL\n)\n\nCREATE TABLE Products (\n    ProductID INTEGER PRIMARY KEY,\n    ProductName TEXT NOT NULL,\n    UnitPrice REAL NOT NULL\n)";

    async fn generate(question: &str, feedback: Option<&str>) -> QueryAttempt {
        let q = Question::new("t", question);
        let schema = SchemaDescriptor(SCHEMA.to_string());
        RuleBasedGenerator::new()
            .generate(GenerationRequest {
                question: &q,
                schema: &schema,
                constraints: None,
                prior_attempt: None,
                error_feedback: feedback,
                attempt_number: 1,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_table_names_handles_brackets() {
        let names = table_names(SCHEMA);
        assert_eq!(names, vec!["Orders", "Order Details", "Products"]);
    }

    #[test]
    fn test_numeric_columns_skip_text_and_constraints() {
        let columns = numeric_columns(SCHEMA, "Orders");
        assert_eq!(columns, vec!["OrderID", "Freight"]);
    }

    #[tokio::test]
    async fn test_count_intent() {
        let attempt = generate("How many orders were placed?", None).await;
        assert_eq!(attempt.query, "SELECT COUNT(*) FROM Orders");
    }

    #[tokio::test]
    async fn test_sum_intent_picks_question_column() {
        let attempt = generate("What is the total freight for orders?", None).await;
        assert_eq!(attempt.query, "SELECT SUM(Freight) FROM Orders");
    }

    #[tokio::test]
    async fn test_bracketed_table_is_quoted() {
        let attempt = generate("average unitprice in order details", None).await;
        assert_eq!(attempt.query, "SELECT AVG(UnitPrice) FROM [Order Details]");
    }

    #[tokio::test]
    async fn test_schema_mismatch_feedback_repicks_table() {
        let attempt = generate(
            "How many orders were placed?",
            Some("Previous query failed.\nQuery: SELECT COUNT(*) FROM Orders\nError (schema-mismatch): no such table: Orders"),
        )
        .await;
        assert!(!attempt.query.contains("FROM Orders"));
        assert!(attempt.query.starts_with("SELECT COUNT(*) FROM"));
    }

    #[tokio::test]
    async fn test_column_feedback_drops_aggregate() {
        let attempt = generate(
            "What is the total freight for orders?",
            Some("Error (schema-mismatch): no such column: Freight"),
        )
        .await;
        assert_eq!(attempt.query, "SELECT * FROM Orders LIMIT 25");
    }

    #[test]
    fn test_sanitize_query_strips_fences() {
        assert_eq!(
            sanitize_query("```sql\nSELECT 1\n```"),
            "SELECT 1"
        );
        assert_eq!(sanitize_query("```\nSELECT 2\n```"), "SELECT 2");
        assert_eq!(sanitize_query("  SELECT 3  "), "SELECT 3");
    }
}
