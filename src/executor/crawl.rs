//! CrawlExecutor (spec §4.7): discover → bounded-parallel scrape → persist.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::executor::context::ExecutorContext;
use crate::executor::discover::{discover, DiscoverOptions};
use crate::executor::scrape::{scrape_one, to_stored_document, ScrapeOptions};
use crate::executor::ExecutionOutcome;
use crate::format::parse_formats;
use crate::store::Job;

#[derive(Debug, Deserialize)]
pub struct CrawlInput {
    pub url: String,
    pub formats: Option<Value>,
    pub limit: Option<usize>,
    #[serde(rename = "includePaths", default)]
    pub include_paths: Vec<String>,
    #[serde(rename = "excludePaths", default)]
    pub exclude_paths: Vec<String>,
    #[serde(rename = "allowSubdomains", default)]
    pub allow_subdomains: bool,
    #[serde(rename = "allowExternalLinks", default)]
    pub allow_external_links: bool,
    #[serde(rename = "ignoreRobotsTxt", default)]
    pub ignore_robots_txt: bool,
    #[serde(rename = "maxConcurrency")]
    pub max_concurrency: Option<usize>,
}

pub async fn execute(ctx: &ExecutorContext, job: &Job, cancel: CancellationToken) -> ExecutionOutcome {
    let input: CrawlInput = match serde_json::from_value(job.input.clone()) {
        Ok(i) => i,
        Err(e) => return ExecutionOutcome::Failed(format!("invalid crawl input: {e}")),
    };

    let discover_options = DiscoverOptions {
        limit: input.limit,
        search: None,
        include_paths: input.include_paths,
        exclude_paths: input.exclude_paths,
        allow_subdomains: input.allow_subdomains,
        allow_external_links: input.allow_external_links,
        ignore_robots_txt: input.ignore_robots_txt,
        ignore_query_parameters: false,
    };

    let discovered = discover(ctx, &input.url, &discover_options).await;

    let mut targets: Vec<String> = vec![input.url.clone()];
    targets.extend(discovered.urls.into_iter().map(|d| d.url));
    targets.dedup();
    if let Some(limit) = input.limit {
        targets.truncate(limit.max(1));
    }

    let formats = parse_formats(input.formats.as_ref());
    let concurrency = ctx.effective_concurrency(input.max_concurrency);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let mut handles = Vec::new();
    for target in targets {
        if cancel.is_cancelled() {
            break;
        }
        let ctx = ctx.clone();
        let formats = formats.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            if cancel.is_cancelled() {
                return None;
            }
            scrape_one(&ctx, &target, &formats, &ScrapeOptions::default(), false)
                .await
                .ok()
                .map(|result| (target, result))
        }));
    }

    let mut succeeded = 0usize;
    let now_ms = crate::observability::now_ms();
    for handle in handles {
        if let Ok(Some((url, result))) = handle.await {
            let document = to_stored_document(job.id, &url, &result, now_ms);
            if ctx.store.add_document(&document).is_ok() {
                succeeded += 1;
            }
        }
    }

    if cancel.is_cancelled() {
        return ExecutionOutcome::Failed("cancelled".to_string());
    }

    if succeeded == 0 {
        return ExecutionOutcome::Failed("no pages successfully scraped".to_string());
    }

    ExecutionOutcome::Completed(serde_json::json!({ "documentsWritten": succeeded }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_input_parses_camel_case_fields() {
        let value = serde_json::json!({
            "url": "https://example.com",
            "maxConcurrency": 2,
            "includePaths": ["^/blog"],
        });
        let input: CrawlInput = serde_json::from_value(value).unwrap();
        assert_eq!(input.max_concurrency, Some(2));
        assert_eq!(input.include_paths, vec!["^/blog".to_string()]);
    }
}
