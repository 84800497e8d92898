use crate::features::refresh_queue::{QueuedTask, TaskQueue};
use crate::features::store::MetadataStore;
use crate::scraping::fetcher::Fetcher;
use crate::types::SiteMetadataRecord;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Serves cached metadata and schedules background refreshes for stale entries.
pub struct FreshnessCache {
    store: Arc<dyn MetadataStore>,
    fetcher: Arc<Fetcher>,
    queue: Arc<dyn TaskQueue>,
    staleness: chrono::Duration,
}

impl FreshnessCache {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        fetcher: Arc<Fetcher>,
        queue: Arc<dyn TaskQueue>,
        staleness: chrono::Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            queue,
            staleness,
        }
    }

    pub async fn resolve(&self, url: &Url, force: bool) -> Option<SiteMetadataRecord> {
        let key = url.as_str();
        let cached = match self.store.get(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("store read for {} failed, treating as miss: {}", key, e);
                None
            }
        };

        let record = match cached {
            Some(record) if !force => record,
            existing => {
                debug!("fetching {} (forced: {})", key, force);
                self.fetcher.fetch_and_store(existing, key).await
            }
        };

        if record.is_stale(Utc::now(), self.staleness) {
            self.schedule_refresh(&record).await;
        }
        Some(record)
    }

    async fn schedule_refresh(&self, record: &SiteMetadataRecord) {
        // Best-effort marker. `updated_at` is left as is, so later reads still see the record as stale.
        if let Err(e) = self.store.put(record.clone()).await {
            warn!("failed to mark {} for refresh: {}", record.url, e);
        }
        if let Err(e) = self.queue.enqueue(QueuedTask::refresh_url(&record.url)).await {
            warn!("failed to enqueue refresh for {}: {}", record.url, e);
        }
    }
}
