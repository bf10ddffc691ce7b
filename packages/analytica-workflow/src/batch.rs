use crate::context::{ReportStatus, RequestReport};
use crate::error::{Result, WorkflowError};
use crate::model::Question;
use crate::orchestrator::Orchestrator;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// One input line of a batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_hint: Option<String>,
}

/// Parse a JSONL batch. Malformed lines are logged and skipped; only an
/// unreadable source is fatal.
pub fn read_batch(reader: impl BufRead) -> Result<Vec<BatchRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            WorkflowError::BatchInput(format!("line {}: {}", line_no + 1, e))
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<BatchRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping malformed batch line");
            }
        }
    }
    Ok(records)
}

/// Write one JSON report per line.
pub fn write_reports(mut writer: impl Write, reports: &[RequestReport]) -> Result<()> {
    for report in reports {
        let line = serde_json::to_string(report)
            .map_err(|e| WorkflowError::BatchOutput(e.to_string()))?;
        writeln!(writer, "{}", line).map_err(|e| WorkflowError::BatchOutput(e.to_string()))?;
    }
    Ok(())
}

/// Runs a batch of questions through the orchestrator with a bounded
/// worker pool. Requests are fully independent; one request's fault never
/// touches another's output record.
pub struct BatchDriver {
    orchestrator: Arc<Orchestrator>,
    concurrency: usize,
}

impl BatchDriver {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let concurrency = orchestrator.config().worker_concurrency.max(1);
        Self {
            orchestrator,
            concurrency,
        }
    }

    /// Process all records, returning one report per record in input order.
    pub async fn run(&self, records: Vec<BatchRecord>) -> Vec<RequestReport> {
        info!(
            records = records.len(),
            workers = self.concurrency,
            "starting batch"
        );
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            let orchestrator = self.orchestrator.clone();
            let semaphore = semaphore.clone();
            let id = record.id.clone();
            let task = tokio::spawn(async move {
                // Semaphore close never happens while tasks run.
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let question = Question::new(record.id, record.question);
                let ctx = orchestrator.process(question, record.format_hint).await;
                ctx.report()
            });
            tasks.push((id, task));
        }

        let joined = futures::future::join_all(
            tasks.into_iter().map(|(id, task)| async move { (id, task.await) }),
        )
        .await;

        let mut reports = Vec::with_capacity(joined.len());
        for (id, outcome) in joined {
            match outcome {
                Ok(report) => reports.push(report),
                Err(join_err) => {
                    // A panicking worker is contained to its own record.
                    error!(request_id = %id, error = %join_err, "request worker panicked");
                    reports.push(panic_report(id, join_err));
                }
            }
        }

        let done = reports
            .iter()
            .filter(|r| r.status == ReportStatus::Done)
            .count();
        info!(done, failed = reports.len() - done, "batch finished");
        reports
    }
}

fn panic_report(id: String, join_err: tokio::task::JoinError) -> RequestReport {
    RequestReport {
        id,
        pathway: None,
        status: ReportStatus::Failed,
        degraded: false,
        answer: String::new(),
        explanation: String::new(),
        confidence: 0.0,
        citations: Vec::new(),
        attempts: 0,
        sql: None,
        error: Some(format!("worker panicked: {}", join_err)),
        duration_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_batch_skips_blank_and_malformed_lines() {
        let input = concat!(
            r#"{"id": "q1", "question": "how many orders shipped in 1997?"}"#,
            "\n\n",
            "{not json}\n",
            r#"{"id": "q2", "question": "what is AOV?", "format_hint": "float"}"#,
            "\n",
        );
        let records = read_batch(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "q1");
        assert_eq!(records[1].format_hint.as_deref(), Some("float"));
    }

    #[test]
    fn test_read_batch_empty_input() {
        let records = read_batch(Cursor::new("")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_write_reports_one_line_per_report() {
        let report = panic_report("q1".to_string(), make_join_error());
        let mut out = Vec::new();
        write_reports(&mut out, &[report.clone(), report]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        let parsed: RequestReport = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.status, ReportStatus::Failed);
    }

    fn make_join_error() -> tokio::task::JoinError {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let handle = tokio::spawn(async { panic!("boom") });
            handle.await.unwrap_err()
        })
    }
}
