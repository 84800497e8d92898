use crate::core::error::QueueError;
use crate::scraping::fetcher::Fetcher;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

pub const REFRESH_URL_TASK: &str = "refresh-url";

/// A named unit of background work with string parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl QueuedTask {
    pub fn refresh_url(url: &str) -> Self {
        let mut params = BTreeMap::new();
        params.insert("url".to_string(), url.to_string());
        Self {
            name: REFRESH_URL_TASK.to_string(),
            params,
        }
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: QueuedTask) -> Result<(), QueueError>;
}

/// In-process queue feeding a [`RefreshWorker`].
#[derive(Clone)]
pub struct ChannelTaskQueue {
    tx: UnboundedSender<QueuedTask>,
}

impl ChannelTaskQueue {
    pub fn channel() -> (Self, UnboundedReceiver<QueuedTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskQueue for ChannelTaskQueue {
    async fn enqueue(&self, task: QueuedTask) -> Result<(), QueueError> {
        self.tx.send(task).map_err(|_| QueueError::Closed)
    }
}

/// Drains the refresh queue, one task at a time.
pub struct RefreshWorker {
    fetcher: Arc<Fetcher>,
}

impl RefreshWorker {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Runs until every sender is dropped.
    pub async fn run(self, mut rx: UnboundedReceiver<QueuedTask>) {
        info!("refresh worker started");
        while let Some(task) = rx.recv().await {
            self.handle(task).await;
        }
        info!("refresh worker stopped");
    }

    pub async fn handle(&self, task: QueuedTask) {
        if task.name != REFRESH_URL_TASK {
            warn!("ignoring unknown task {:?}", task.name);
            return;
        }
        match task.params.get("url") {
            Some(url) => {
                debug!("refreshing {}", url);
                self.fetcher.refresh(url).await;
            }
            None => warn!("refresh-url task without a url param"),
        }
    }
}
