use crate::core::config::ServiceConfig;
use crate::core::error::FetchError;
use crate::features::freshness::FreshnessCache;
use crate::features::refresh_queue::{ChannelTaskQueue, QueuedTask, TaskQueue};
use crate::features::store::{InMemoryStore, MetadataStore};
use crate::scraping::fetcher::Fetcher;
use crate::scraping::http::{HttpFetch, ReqwestFetch, ReqwestFetchOptions};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Shared handles for request handlers and the refresh worker.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<Fetcher>,
    pub freshness: Arc<FreshnessCache>,
}

impl AppState {
    /// Production wiring: reqwest transport and an in-memory store sized from config.
    ///
    /// The returned receiver belongs to the refresh worker.
    pub fn from_config(
        config: &ServiceConfig,
    ) -> Result<(Self, UnboundedReceiver<QueuedTask>), FetchError> {
        let http = ReqwestFetch::new(&ReqwestFetchOptions {
            timeout: config.resolve_http_timeout(),
            connect_timeout: config.resolve_connect_timeout(),
            user_agent: config.resolve_user_agent(),
        })?;
        let store = InMemoryStore::new(config.resolve_store_capacity());
        let (queue, rx) = ChannelTaskQueue::channel();
        let state = Self::with_parts(config, Arc::new(http), Arc::new(store), Arc::new(queue));
        Ok((state, rx))
    }

    pub fn with_parts(
        config: &ServiceConfig,
        http: Arc<dyn HttpFetch>,
        store: Arc<dyn MetadataStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        let fetcher = Arc::new(Fetcher::new(http, store.clone()));
        let freshness = Arc::new(FreshnessCache::new(
            store,
            fetcher.clone(),
            queue,
            config.resolve_staleness(),
        ));
        Self { fetcher, freshness }
    }
}
