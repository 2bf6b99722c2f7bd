//! ExtractExecutor (spec §4.9): per-URL scrape → LLM extraction →
//! aggregate `results/sources/summary`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::executor::context::ExecutorContext;
use crate::executor::error::ErrorCode;
use crate::executor::scrape::{scrape_one, to_stored_document, ScrapeOptions};
use crate::executor::ExecutionOutcome;
use crate::format::{FormatKind, FormatSpec};
use crate::store::Job;

#[derive(Debug, Deserialize)]
pub struct ExtractInput {
    pub urls: Vec<String>,
    pub schema: Value,
    pub prompt: Option<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(rename = "ignoreInvalidURLs", default)]
    pub ignore_invalid_urls: bool,
    #[serde(rename = "showSources", default)]
    pub show_sources: bool,
    pub model: Option<String>,
}

/// Schema nesting-depth bound rejected synchronously at validation time
/// (spec §4.9: `SCHEMA_TOO_COMPLEX`).
pub const MAX_SCHEMA_DEPTH: usize = 6;

#[derive(Debug)]
pub struct ValidationFailure {
    pub code: ErrorCode,
    pub message: String,
}

/// Synchronous pre-enqueue validation (spec §4.9): every URL must parse
/// with an http(s) scheme, the schema must be a JSON object, and its
/// nesting depth must stay within `MAX_SCHEMA_DEPTH`.
pub fn validate(input: &ExtractInput) -> Result<(), ValidationFailure> {
    if !input.ignore_invalid_urls {
        for url in &input.urls {
            if !is_valid_http_url(url) {
                return Err(ValidationFailure {
                    code: ErrorCode::BadRequestInvalidUrl,
                    message: format!("invalid URL: {url}"),
                });
            }
        }
    }

    if !input.schema.is_object() {
        return Err(ValidationFailure {
            code: ErrorCode::InvalidSchema,
            message: "schema must be a JSON object".to_string(),
        });
    }

    if schema_depth(&input.schema) > MAX_SCHEMA_DEPTH {
        return Err(ValidationFailure {
            code: ErrorCode::SchemaTooComplex,
            message: format!("schema nesting exceeds {MAX_SCHEMA_DEPTH} levels"),
        });
    }

    Ok(())
}

fn is_valid_http_url(raw: &str) -> bool {
    Url::parse(raw).map(|u| u.scheme() == "http" || u.scheme() == "https").unwrap_or(false)
}

fn schema_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(schema_depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(schema_depth).max().unwrap_or(0),
        _ => 0,
    }
}

pub async fn execute(ctx: &ExecutorContext, job: &Job, cancel: CancellationToken) -> ExecutionOutcome {
    let mut input: ExtractInput = match serde_json::from_value(job.input.clone()) {
        Ok(i) => i,
        Err(e) => return ExecutionOutcome::Failed(format!("invalid extract input: {e}")),
    };

    // `ignoreInvalidURLs` drops malformed URLs before scraping rather than
    // scraping them and recording a spurious failure (spec §8 scenario 4:
    // a 3-URL request with one malformed URL and `ignoreInvalidURLs: true`
    // yields `summary.total == 2`, not 3).
    if input.ignore_invalid_urls {
        input.urls.retain(|url| is_valid_http_url(url));
    }

    let concurrency = ctx.effective_concurrency(None);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let mut handles = Vec::with_capacity(input.urls.len());
    for (index, url) in input.urls.iter().cloned().enumerate() {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let schema = input.schema.clone();
        let prompt = input.prompt.clone();
        let model = input.model.clone();
        let strict = input.strict;
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            if cancel.is_cancelled() {
                return (index, url, None, None);
            }

            let markdown_formats = vec![FormatSpec { kind: FormatKind::Markdown, prompt: None, schema: None, full_page: false }];
            let scraped = match scrape_one(&ctx, &url, &markdown_formats, &ScrapeOptions::default(), false).await {
                Ok(r) => r,
                Err(_) => {
                    return (
                        index,
                        url,
                        None,
                        Some((ErrorCode::UpstreamError, "SCRAPE_FAILED".to_string())),
                    );
                }
            };

            match ctx.llm.extract(&scraped.built.markdown, &schema, prompt.as_deref(), model.as_deref()).await {
                Ok(data) if !data.is_null() => {
                    if strict {
                        if let Some(missing) = missing_required_fields(&schema, &data) {
                            return (
                                index,
                                url,
                                Some(scraped),
                                Some((ErrorCode::ExtractIncompleteFields, format!("missing fields: {missing:?}"))),
                            );
                        }
                    }
                    (index, url, Some(scraped), None)
                }
                Ok(_) => (index, url, Some(scraped), Some((ErrorCode::ExtractEmptyResult, "empty result".to_string()))),
                Err(e) => (index, url, Some(scraped), Some((ErrorCode::ExtractFailed, e.to_string()))),
            }
        }));
    }

    let mut slots: Vec<Option<Value>> = vec![None; input.urls.len()];
    let mut sources = Vec::new();
    let mut failed_by_code: HashMap<&'static str, u64> = HashMap::new();
    let mut success = 0usize;
    let now_ms = crate::observability::now_ms();

    for handle in handles {
        let Ok((index, url, scraped, error)) = handle.await else { continue };

        let mut entry = Map::new();
        entry.insert("url".to_string(), Value::String(url.clone()));

        match error {
            None => {
                success += 1;
                if let Some(scraped) = &scraped {
                    if let Some(obj) = scraped.document_json.get("metadata").and_then(|m| m.get("json")) {
                        entry.insert("data".to_string(), obj.clone());
                    }
                }
                if input.show_sources {
                    if let Some(scraped) = &scraped {
                        let doc = to_stored_document(job.id, &url, scraped, now_ms);
                        let source = serde_json::json!({"url": doc.url, "markdown": doc.markdown});
                        let _ = ctx.store.add_document(&doc);
                        sources.push(source);
                    }
                }
            }
            Some((code, message)) => {
                *failed_by_code.entry(code.as_str()).or_insert(0) += 1;
                entry.insert("error".to_string(), Value::String(code.as_str().to_string()));
                entry.insert("message".to_string(), Value::String(message));
            }
        }

        slots[index] = Some(Value::Object(entry));
    }

    let results: Vec<Value> = slots.into_iter().map(|s| s.unwrap_or(Value::Null)).collect();
    let total = input.urls.len();
    let failed = total - success;

    let mut summary = Map::new();
    summary.insert("total".to_string(), Value::from(total));
    summary.insert("success".to_string(), Value::from(success));
    summary.insert("failed".to_string(), Value::from(failed));
    summary.insert(
        "failedByCode".to_string(),
        Value::Object(failed_by_code.into_iter().map(|(k, v)| (k.to_string(), Value::from(v))).collect()),
    );

    let mut output = Map::new();
    output.insert("results".to_string(), Value::Array(results));
    if input.show_sources {
        output.insert("sources".to_string(), Value::Array(sources));
    }
    output.insert("summary".to_string(), Value::Object(summary));

    if job.sync && input.strict && success == 0 {
        return ExecutionOutcome::Failed("all URLs failed extraction under strict mode".to_string());
    }

    ExecutionOutcome::Completed(Value::Object(output))
}

fn missing_required_fields(schema: &Value, data: &Value) -> Option<Vec<String>> {
    let required = schema.get("required")?.as_array()?;
    let missing: Vec<String> = required
        .iter()
        .filter_map(|r| r.as_str())
        .filter(|key| data.get(key).is_none())
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing)
    }
}
