//! Tantivy-backed document retriever.
//!
//! Markdown files are chunked on `## ` headings (falling back to blank-line
//! paragraphs), indexed once into an in-RAM BM25 index at startup, then
//! shared read-only across all workers.

use analytica_workflow::{Result, RetrievedPassage, Retriever, WorkflowError};
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, TantivyDocument};
use tracing::{info, warn};

#[derive(Clone)]
pub struct DocRetriever {
    index: Index,
    doc_id_field: Field,
    content_field: Field,
}

impl DocRetriever {
    /// Build an index over every `.md` file in `docs_path`. A missing
    /// directory yields an empty index, not an error.
    pub fn from_dir(docs_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let docs_path = docs_path.as_ref();
        let mut chunks = Vec::new();

        if docs_path.is_dir() {
            let mut entries: Vec<_> = std::fs::read_dir(docs_path)
                .with_context(|| format!("reading docs dir {}", docs_path.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
                .collect();
            entries.sort();

            for path in entries {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match std::fs::read_to_string(&path) {
                    Ok(content) => chunks.extend(chunk_markdown(&content, &filename)),
                    Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable doc"),
                }
            }
        } else {
            warn!(path = %docs_path.display(), "docs path does not exist, index will be empty");
        }

        Self::from_chunks(chunks)
    }

    /// Build an index from pre-chunked `(doc_id, content)` pairs.
    pub fn from_chunks(chunks: Vec<(String, String)>) -> anyhow::Result<Self> {
        let mut builder = Schema::builder();
        let doc_id_field = builder.add_text_field("doc_id", STRING | STORED);
        let content_field = builder.add_text_field("content", TEXT | STORED);
        let schema = builder.build();

        let index = Index::create_in_ram(schema);
        let mut writer = index.writer(15_000_000).context("creating index writer")?;
        let chunk_count = chunks.len();
        for (doc_id, content) in chunks {
            writer
                .add_document(doc!(
                    doc_id_field => doc_id,
                    content_field => content,
                ))
                .context("adding document")?;
        }
        writer.commit().context("committing index")?;

        info!(chunks = chunk_count, "document index built");
        Ok(Self {
            index,
            doc_id_field,
            content_field,
        })
    }
}

impl DocRetriever {
    fn search_sync(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let reader = self
            .index
            .reader()
            .map_err(|e| WorkflowError::collaborator("retrieving", e))?;
        let searcher = reader.searcher();

        // Lenient parsing: question punctuation must not fail retrieval.
        let parser = QueryParser::for_index(&self.index, vec![self.content_field]);
        let (query, parse_errors) = parser.parse_query_lenient(text);
        if !parse_errors.is_empty() {
            warn!(errors = parse_errors.len(), "ignored query parse errors");
        }

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(k.max(1)))
            .map_err(|e| WorkflowError::collaborator("retrieving", e))?;

        let mut passages = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| WorkflowError::collaborator("retrieving", e))?;
            let doc_id = doc
                .get_first(self.doc_id_field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let content = doc
                .get_first(self.content_field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            passages.push(RetrievedPassage {
                doc_id,
                content,
                score,
            });
        }
        Ok(passages)
    }
}

#[async_trait]
impl Retriever for DocRetriever {
    async fn search(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        // Tantivy search runs on the blocking pool so the caller's stage
        // deadline stays enforceable and runtime workers stay free.
        let retriever = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || retriever.search_sync(&text, k))
            .await
            .map_err(|e| WorkflowError::collaborator("retrieving", e))?
    }
}

/// Chunk markdown on `## ` headings; fall back to blank-line paragraphs.
/// Chunk ids follow the `<file>::chunk_<idx>` convention.
pub fn chunk_markdown(content: &str, filename: &str) -> Vec<(String, String)> {
    let sections: Vec<&str> = if content.contains("\n## ") {
        content.split("\n## ").collect()
    } else {
        content.split("\n\n").collect()
    };

    sections
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(idx, section)| (format!("{}::chunk_{}", filename, idx), section.to_string()))
        .collect()
}
