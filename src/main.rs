use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use edge_router::config::{AppState, Config};
use edge_router::handler::{EdgeHandler, EdgeServices};
use edge_router::platform::{
    AppRenderer, AssetStore, BackgroundTasks, FsAssetStore, HttpFetcher, MemoryCache,
    NotFoundRenderer, UpstreamRenderer,
};
use edge_router::routing::AllowedDomains;
use edge_router::{logger, server};

const DEFAULT_CONFIG: &str = "config";

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let cfg = Config::load_from(&config_path)
        .with_context(|| format!("failed to load configuration from '{config_path}'"))?;

    logger::init(&cfg.logging);

    // Worker thread count follows `server.workers`, CPU cores otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        tracing::info!(workers, "Using configured worker threads");
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> anyhow::Result<()> {
    let services = build_services(&cfg)?;
    let handler = EdgeHandler::from_config(&cfg, services, BackgroundTasks::new());
    tracing::debug!(stages = ?handler.stage_names(), "Pipeline assembled");

    let state = Arc::new(AppState::new(&cfg, handler));
    server::run(state).await
}

fn build_services(cfg: &Config) -> anyhow::Result<EdgeServices> {
    let assets: Option<Arc<dyn AssetStore>> = if cfg.assets.enabled {
        Some(Arc::new(FsAssetStore::new(
            &cfg.assets.root,
            cfg.assets.index_files.clone(),
        )))
    } else {
        None
    };

    let fetcher = HttpFetcher::new(
        AllowedDomains::new(&cfg.image_proxy.allowed_domains),
        cfg.image_proxy.max_redirects,
        cfg.image_proxy.max_body_size,
    )
    .context("failed to build image proxy client")?;

    let renderer: Arc<dyn AppRenderer> = match cfg.renderer.upstream.as_deref() {
        Some(upstream) => {
            let base = Url::parse(upstream).context("invalid renderer.upstream")?;
            Arc::new(
                UpstreamRenderer::new(base, Duration::from_secs(cfg.renderer.timeout_secs))
                    .context("failed to build renderer client")?,
            )
        }
        None => Arc::new(NotFoundRenderer),
    };

    Ok(EdgeServices {
        assets,
        cache: Arc::new(MemoryCache::with_max_bytes(
            cfg.cache.max_entries,
            cfg.cache.max_bytes,
        )),
        fetcher: Arc::new(fetcher),
        renderer,
    })
}
