use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info};

use super::{services, state::AppState};
use crate::authz::AuthZ;
use crate::config::Config;
use crate::executor::context::ExecutorContext;
use crate::format::LinkFilterConfig;
use crate::llm::{HttpLlmClient, HttpLlmConfig, NullLlmClient};
use crate::observability::now_ms;
use crate::queue::JobQueue;
use crate::search::{HttpSearchConfig, HttpSearchProvider, NullSearchProvider};
use crate::storage::StorageClient;
use crate::store::FjallStore;
use crate::worker::fetcher::{DisabledBrowserEngine, HttpFetcher, HttpFetcherConfig};
use crate::worker::pool::{WorkerPool, WorkerPoolConfig};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything `run` needs to serve requests and shut down cleanly. Split
/// out from `run` so tests can build a router against an isolated store
/// without binding a socket (mirrors the donor's own `build_test_app`
/// pattern in `tests/api_test.rs`, generalized past a single handler).
pub struct ServerHandle {
    pub state: AppState,
    pub shutdown: CancellationToken,
    worker_handles: Vec<tokio::task::JoinHandle<()>>,
    retention_handle: tokio::task::JoinHandle<()>,
    store: Arc<FjallStore>,
}

impl ServerHandle {
    /// Cancels the worker pool and retention loop and waits for both to
    /// exit, then flushes the store. Called on graceful shutdown.
    pub async fn shutdown(self) -> Result<(), AnyError> {
        self.shutdown.cancel();
        for handle in self.worker_handles {
            let _ = handle.await;
        }
        let _ = self.retention_handle.await;
        self.store.persist()?;
        Ok(())
    }
}

/// Builds the shared capabilities (store, queue, executor context, AuthZ)
/// and spawns the worker pool and retention loop. Does not bind a socket —
/// callers pair this with [`router`] to get a servable `Router`.
pub async fn build_state(config: Arc<Config>) -> Result<ServerHandle, AnyError> {
    info!(path = %config.server.fjall_path.display(), "opening store");
    let store = Arc::new(FjallStore::open(&config.server.fjall_path)?);

    if let Some(raw) = config.auth.admin_api_key.clone() {
        let hash = crate::authz::apikey::hash_key(&raw);
        store.ensure_admin_api_key(hash, "bootstrap-admin".to_string(), now_ms())?;
        info!("admin API key ensured from RAITO_ADMIN_API_KEY");
    }

    let storage = Arc::new(match config.storage.provider {
        crate::config::StorageProvider::Local => StorageClient::in_memory(),
        crate::config::StorageProvider::S3 => StorageClient::in_memory(),
    });

    let proxy_url = resolve_fetcher_proxy(&config);
    let fetcher = Arc::new(HttpFetcher::new(HttpFetcherConfig::default(), proxy_url.as_deref())?);
    let browser = Arc::new(DisabledBrowserEngine);

    let llm: Arc<dyn crate::llm::LlmClient> = match (&config.llm.base_url, &config.llm.api_key) {
        (Some(base_url), Some(api_key)) => Arc::new(HttpLlmClient::new(HttpLlmConfig {
            base_url: base_url.clone(),
            api_key: api_key.clone(),
            default_model: config.llm.default_model.clone(),
        })),
        _ => Arc::new(NullLlmClient),
    };

    let search: Arc<dyn crate::search::SearchProvider> = match &config.search.base_url {
        Some(base_url) => Arc::new(HttpSearchProvider::new(HttpSearchConfig {
            base_url: base_url.clone(),
            api_key: config.search.api_key.clone(),
        })),
        None => Arc::new(NullSearchProvider),
    };

    let ctx = ExecutorContext {
        fetcher,
        browser,
        llm,
        search,
        store: store.clone(),
        link_filters: LinkFilterConfig {
            max_per_document: config.format.links_max_per_document,
            same_domain_only: config.format.links_same_domain_only,
        },
        max_concurrent_urls_per_job: config.queue.max_concurrent_urls_per_job,
        default_fetch_timeout: std::time::Duration::from_secs(30),
        user_agent: format!("Raito/{}", env!("CARGO_PKG_VERSION")),
    };

    let queue = Arc::new(JobQueue::new(store.clone()));

    let session_secret = config
        .auth
        .session_secret
        .clone()
        .unwrap_or_else(|| "insecure-dev-session-secret".to_string())
        .into_bytes();
    let authz = Arc::new(AuthZ::new(store.clone(), session_secret, config.ratelimit.default_per_minute));

    let shutdown = CancellationToken::new();
    let pool = Arc::new(WorkerPool::new(
        queue.clone(),
        ctx.clone(),
        WorkerPoolConfig {
            max_concurrent_jobs: config.queue.max_concurrent_jobs,
            poll_interval_ms: config.queue.poll_interval_ms,
        },
        shutdown.clone(),
    ));
    let worker_handles = pool.spawn();

    let retention_handle = spawn_retention_loop(store.clone(), config.clone(), shutdown.clone());

    let state = AppState::new(config.clone(), queue, ctx, authz, storage);

    Ok(ServerHandle { state, shutdown, worker_handles, retention_handle, store })
}

/// Assembles the `/v1/*` + `/healthz` + `/metrics` router over `state`
/// (spec §6).
pub fn router(state: AppState, max_payload_bytes: usize) -> Router {
    Router::new()
        .route("/v1/scrape", post(services::scrape))
        .route("/v1/map", post(services::map_urls))
        .route("/v1/crawl", post(services::create_crawl))
        .route("/v1/crawl/{id}", get(services::get_crawl))
        .route("/v1/batch/scrape", post(services::create_batch))
        .route("/v1/batch/scrape/{id}", get(services::get_batch))
        .route("/v1/extract", post(services::create_extract))
        .route("/v1/extract/{id}", get(services::get_extract))
        .route("/v1/search", post(services::search))
        .route("/v1/jobs", get(services::list_jobs))
        .route("/v1/jobs/{id}", get(services::get_job).delete(services::delete_job))
        .route("/v1/jobs/{id}/download", get(services::download_job))
        .route("/healthz", get(services::healthz))
        .route("/metrics", get(services::metrics))
        .layer(DefaultBodyLimit::max(max_payload_bytes))
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
}

/// Builds the full server, binds `config.server.bind_addr`, and serves
/// until a shutdown signal. Exit-code wiring (§6: 0/1/2) lives in
/// `main.rs` — this function only returns `Err` on startup failure.
pub async fn run(config: Config) -> Result<(), AnyError> {
    let config = Arc::new(config);
    let handle = build_state(config.clone()).await?;
    let max_payload_bytes = config.server.api.max_payload_bytes.as_u64() as usize;
    let app = router(handle.state.clone(), max_payload_bytes);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr).await?;
    info!(address = %config.server.bind_addr, "raito API listening");

    axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal()).await?;

    info!("shutting down: cancelling worker pool and retention loop");
    handle.shutdown().await
}

/// Resolves `config.proxy.default_pool` (if set) through `ProxyGraph` into
/// the single URL `HttpFetcher` dials through — the first endpoint of the
/// pool's primary tier. Falls back to no proxy (direct requests) if no
/// pool is configured or the configured pool fails to resolve.
fn resolve_fetcher_proxy(config: &Config) -> Option<String> {
    let pool_name = config.proxy.default_pool.as_deref()?;
    match config.proxy_resolver().resolve(pool_name) {
        Ok(resolved) => resolved.tiers.first().and_then(|tier| tier.first()).map(|endpoint| endpoint.uri.clone()),
        Err(e) => {
            error!(pool = pool_name, error = %e, "failed to resolve configured proxy pool; continuing without a proxy");
            None
        }
    }
}

fn spawn_retention_loop(
    store: Arc<FjallStore>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let store_retention = config.retention.to_store_retention();
    let interval = std::time::Duration::from_secs(config.retention.cleanup_interval_minutes as u64 * 60);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            match crate::store::run_retention_once(&store, &store_retention, now_ms()) {
                Ok(report) if report.jobs_deleted > 0 || report.documents_deleted > 0 => {
                    info!(
                        jobs_deleted = report.jobs_deleted,
                        documents_deleted = report.documents_deleted,
                        "retention sweep completed"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "retention sweep failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
