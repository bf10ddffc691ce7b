/*
 * Analytica Providers - Concrete Capability Implementations
 *
 * Local, dependency-light implementations of the workflow's capability
 * traits: BM25 retrieval over a markdown corpus (tantivy), read-only
 * SQLite execution with error classification (rusqlite), a keyword
 * route classifier, a heuristic plan extractor, a rule-based query
 * generator, and a deterministic template synthesizer.
 */

pub mod classifier;
pub mod executor;
pub mod generator;
pub mod planner;
pub mod retriever;
pub mod synthesizer;

pub use classifier::KeywordRouteClassifier;
pub use executor::{classify_sqlite_error, SqliteExecutor};
pub use generator::{sanitize_query, RuleBasedGenerator};
pub use planner::HeuristicPlanner;
pub use retriever::{chunk_markdown, DocRetriever};
pub use synthesizer::{normalize_answer, tables_in_query, TemplateSynthesizer};
