//! `map` job (spec §6): discovery-only request. Thin wrapper over
//! `discover` since spec §2's component list has no separate MapExecutor
//! box; routed through `JobQueue`/`WorkerPool` like every other job type
//! (spec §2), with the HTTP layer usually waiting for it synchronously.

use serde::{Deserialize, Serialize};

use crate::executor::context::ExecutorContext;
use crate::executor::discover::{discover, DiscoverOptions};
use crate::executor::error::ErrorCode;
use crate::executor::ExecutionOutcome;
use crate::store::Job;

#[derive(Debug, Serialize)]
pub struct MapLink {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MapOutput {
    pub links: Vec<MapLink>,
    pub warning: Option<String>,
}

pub async fn run(ctx: &ExecutorContext, url: &str, options: &DiscoverOptions) -> MapOutput {
    let result = discover(ctx, url, options).await;
    MapOutput {
        links: result
            .urls
            .into_iter()
            .map(|d| MapLink { url: d.url, title: d.title, description: d.description })
            .collect(),
        warning: result.warning,
    }
}

/// Wire shape of a `map` job's `input` column — same fields `MapRequest`
/// accepts (spec §6).
#[derive(Debug, Deserialize)]
pub struct MapJobInput {
    pub url: String,
    pub limit: Option<usize>,
    pub search: Option<String>,
    #[serde(rename = "includeSubdomains", default)]
    pub include_subdomains: bool,
    #[serde(rename = "ignoreQueryParameters", default)]
    pub ignore_query_parameters: bool,
    #[serde(rename = "allowExternalLinks", default)]
    pub allow_external_links: bool,
}

/// `map` job executor, reached through the worker pool instead of being
/// called inline (spec §2).
pub async fn execute(ctx: &ExecutorContext, job: &Job, _cancel: tokio_util::sync::CancellationToken) -> ExecutionOutcome {
    let input: MapJobInput = match serde_json::from_value(job.input.clone()) {
        Ok(i) => i,
        Err(e) => return ExecutionOutcome::Failed(format!("{}: invalid map input: {e}", ErrorCode::Internal.as_str())),
    };

    let options = DiscoverOptions {
        limit: input.limit,
        search: input.search,
        include_paths: Vec::new(),
        exclude_paths: Vec::new(),
        allow_subdomains: input.include_subdomains,
        allow_external_links: input.allow_external_links,
        ignore_robots_txt: false,
        ignore_query_parameters: input.ignore_query_parameters,
    };

    let output = run(ctx, &input.url, &options).await;
    ExecutionOutcome::Completed(serde_json::json!({
        "links": output.links,
        "warning": output.warning,
    }))
}
