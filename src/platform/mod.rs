//! Platform collaborators
//!
//! The edge pipeline talks to its surroundings only through the traits in
//! this module: asset store, edge cache, outbound fetcher, application
//! renderer, and the background-task tracker.

pub mod assets;
pub mod background;
pub mod cache;
pub mod fetch;
pub mod renderer;

pub use assets::{AssetError, AssetStore, FsAssetStore};
pub use background::BackgroundTasks;
pub use cache::{CacheError, CacheKey, CachedResponse, EdgeCache, MemoryCache};
pub use fetch::{
    redirect_decision, FetchError, HttpFetcher, RedirectDecision, UpstreamFetcher, UpstreamResponse,
};
pub use renderer::{
    AppRenderer, NotFoundRenderer, PassThrough, RenderContext, RenderError, RequestMeta,
    UpstreamRenderer,
};
