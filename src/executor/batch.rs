//! BatchExecutor (spec §4.8): fan-out per URL with bounded concurrency.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::executor::context::ExecutorContext;
use crate::executor::scrape::{scrape_one, to_stored_document, ScrapeOptions};
use crate::executor::ExecutionOutcome;
use crate::format::parse_formats;
use crate::store::Job;

#[derive(Debug, Deserialize)]
pub struct BatchInput {
    pub urls: Vec<String>,
    pub formats: Option<Value>,
    #[serde(rename = "maxConcurrency")]
    pub max_concurrency: Option<usize>,
}

/// Terminal state is `completed` once all URL attempts return, even if some
/// failed (spec §4.8); `failed` is reserved for a catastrophic executor
/// error, which in this implementation is invalid input shape only.
pub async fn execute(ctx: &ExecutorContext, job: &Job, cancel: CancellationToken) -> ExecutionOutcome {
    let input: BatchInput = match serde_json::from_value(job.input.clone()) {
        Ok(i) => i,
        Err(e) => return ExecutionOutcome::Failed(format!("invalid batch input: {e}")),
    };

    if input.urls.is_empty() || input.urls.len() > 1000 {
        return ExecutionOutcome::Failed("urls must contain between 1 and 1000 entries".to_string());
    }

    let formats = parse_formats(input.formats.as_ref());
    let concurrency = ctx.effective_concurrency(input.max_concurrency);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let mut handles = Vec::new();
    for url in input.urls.clone() {
        let ctx = ctx.clone();
        let formats = formats.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            if cancel.is_cancelled() {
                return None;
            }
            scrape_one(&ctx, &url, &formats, &ScrapeOptions::default(), false)
                .await
                .ok()
                .map(|result| (url, result))
        }));
    }

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let now_ms = crate::observability::now_ms();
    for handle in handles {
        match handle.await {
            Ok(Some((url, result))) => {
                let document = to_stored_document(job.id, &url, &result, now_ms);
                if ctx.store.add_document(&document).is_ok() {
                    succeeded += 1;
                } else {
                    failed += 1;
                }
            }
            _ => failed += 1,
        }
    }

    if cancel.is_cancelled() {
        return ExecutionOutcome::Failed("cancelled".to_string());
    }

    ExecutionOutcome::Completed(serde_json::json!({
        "total": input.urls.len(),
        "succeeded": succeeded,
        "failed": failed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_input_requires_urls_field() {
        let value = serde_json::json!({"urls": ["https://a", "https://b"]});
        let input: BatchInput = serde_json::from_value(value).unwrap();
        assert_eq!(input.urls.len(), 2);
    }
}
