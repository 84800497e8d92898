use crate::core::error::FetchError;
use crate::features::store::MetadataStore;
use crate::scraping::encoding::detect_encoding;
use crate::scraping::extract::ContentExtractor;
use crate::scraping::http::{FetchRequest, FetchedResponse, HttpFetch};
use crate::scraping::redirect::expand_url;
use crate::types::{PageUrls, SiteMetadataRecord};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Fetches pages, extracts their metadata and writes the result to the store.
pub struct Fetcher {
    http: Arc<dyn HttpFetch>,
    store: Arc<dyn MetadataStore>,
    extractor: ContentExtractor,
}

/// A page that answered 200, with the URL it was expanded to.
struct FetchedPage {
    response: FetchedResponse,
    expanded_url: String,
}

impl Fetcher {
    pub fn new(http: Arc<dyn HttpFetch>, store: Arc<dyn MetadataStore>) -> Self {
        Self {
            extractor: ContentExtractor::new(http.clone()),
            http,
            store,
        }
    }

    /// Fetch `url`, extract its metadata and persist it.
    ///
    /// Never fails: an unreachable page becomes an invalid record with a fresh
    /// timestamp, and store errors are logged while the in-memory record is returned.
    pub async fn fetch_and_store(
        &self,
        existing: Option<SiteMetadataRecord>,
        url: &str,
    ) -> SiteMetadataRecord {
        let page = match self.fetch_page(url).await {
            Ok(page) => page,
            Err(e) => {
                info!("fetch of {} failed: {}", url, e);
                return self.store_invalid(existing, url).await;
            }
        };

        let encoding = detect_encoding(&page.response.body);
        let final_url = page
            .response
            .final_url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .or_else(|| Url::parse(&page.expanded_url).ok());
        let Some(final_url) = final_url else {
            warn!("no usable final url for {}", url);
            return self.store_invalid(existing, url).await;
        };

        let urls = PageUrls {
            request_url: Some(url.to_string()),
            expanded_url: Some(page.expanded_url.clone()),
            final_url,
        };
        let content = self
            .extractor
            .extract(&page.response.body, &encoding, &urls)
            .await;

        match existing {
            Some(mut record) => {
                record.apply(page.expanded_url, content);
                self.persist(record).await
            }
            None => {
                let mut record = SiteMetadataRecord::invalid(url);
                record.apply(page.expanded_url, content);
                self.create(url, record).await
            }
        }
    }

    /// Re-fetch whatever is stored for `url`. Safe to run more than once.
    pub async fn refresh(&self, url: &str) -> SiteMetadataRecord {
        let existing = match self.store.get(url).await {
            Ok(record) => record,
            Err(e) => {
                warn!("store read for {} failed before refresh: {}", url, e);
                None
            }
        };
        self.fetch_and_store(existing, url).await
    }

    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.http.fetch(&FetchRequest::get(url)).await?;
        if response.status != 200 {
            return Err(FetchError::Status(response.status));
        }
        let expanded_url = expand_url(self.http.as_ref(), url).await?;
        Ok(FetchedPage {
            response,
            expanded_url,
        })
    }

    async fn store_invalid(
        &self,
        existing: Option<SiteMetadataRecord>,
        url: &str,
    ) -> SiteMetadataRecord {
        match existing {
            Some(mut record) => {
                record.clear_content();
                self.persist(record).await
            }
            None => self.create(url, SiteMetadataRecord::invalid(url)).await,
        }
    }

    async fn create(&self, url: &str, record: SiteMetadataRecord) -> SiteMetadataRecord {
        match self.store.get_or_create(url, record.clone()).await {
            // A concurrent writer may have created it first; ours is newer, so overwrite.
            Ok(stored) if stored != record => self.persist(record).await,
            Ok(stored) => stored,
            Err(e) => {
                warn!("failed to create record for {}: {}", url, e);
                record
            }
        }
    }

    async fn persist(&self, record: SiteMetadataRecord) -> SiteMetadataRecord {
        if let Err(e) = self.store.put(record.clone()).await {
            warn!("failed to store record for {}: {}", record.url, e);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::features::store::InMemoryStore;
    use crate::scraping::http::fakes::ScriptedFetch;
    use crate::scraping::http::FetchMethod;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    const PAGE: &str = r#"<html><head>
        <title>Cafe</title>
        <link rel="icon" href="/icon.png">
        <script type="application/ld+json">{"@type": "CafeOrCoffeeShop"}</script>
    </head><body><p>Coffee and cake.</p></body></html>"#;

    fn fetcher_with(http: Arc<ScriptedFetch>) -> (Fetcher, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new(64));
        (Fetcher::new(http, store.clone()), store)
    }

    #[tokio::test]
    async fn test_success_stores_extracted_record() {
        let http = Arc::new(ScriptedFetch::new());
        http.respond(FetchMethod::Get, "http://cafe.test/", Ok(FetchedResponse::html(PAGE)));
        http.respond(
            FetchMethod::Head,
            "http://cafe.test/icon.png",
            Ok(FetchedResponse::with_content_type(200, "image/png")),
        );
        let (fetcher, store) = fetcher_with(http);

        let record = fetcher.fetch_and_store(None, "http://cafe.test/").await;
        assert_eq!(record.title.as_deref(), Some("Cafe"));
        assert_eq!(record.description.as_deref(), Some("Coffee and cake."));
        assert_eq!(record.icon_url.as_deref(), Some("http://cafe.test/icon.png"));
        assert_eq!(record.canonical_url, "http://cafe.test/");
        assert!(record.json_ld().is_some());

        let stored = store.get("http://cafe.test/").await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_shortener_sets_canonical_url() {
        let http = Arc::new(ScriptedFetch::new());
        let mut page = FetchedResponse::html("<title>Long</title>");
        page.final_url = Some("http://long.test/article".into());
        http.respond(FetchMethod::Get, "https://bit.ly/x", Ok(page));
        http.respond(
            FetchMethod::Head,
            "https://bit.ly/x",
            Ok(FetchedResponse::redirect(301, "http://long.test/article")),
        );
        let (fetcher, _) = fetcher_with(http);

        let record = fetcher.fetch_and_store(None, "https://bit.ly/x").await;
        assert_eq!(record.url, "https://bit.ly/x");
        assert_eq!(record.canonical_url, "http://long.test/article");
        assert_eq!(record.title.as_deref(), Some("Long"));
    }

    #[tokio::test]
    async fn test_non_200_clears_existing_content() {
        let http = Arc::new(ScriptedFetch::new());
        http.respond(
            FetchMethod::Get,
            "http://gone.test/",
            Ok(FetchedResponse::with_content_type(404, "text/html")),
        );
        let (fetcher, store) = fetcher_with(http);

        let mut old = SiteMetadataRecord::invalid("http://gone.test/");
        old.title = Some("Old".into());
        old.icon_url = Some("http://gone.test/i.png".into());
        old.updated_at = Utc::now() - Duration::hours(1);
        store.put(old.clone()).await.unwrap();

        let record = fetcher.fetch_and_store(Some(old.clone()), "http://gone.test/").await;
        assert_eq!(record.title, None);
        assert_eq!(record.icon_url, None);
        assert!(record.updated_at > old.updated_at);
        assert_eq!(store.get("http://gone.test/").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_failed_shortener_expansion_clears_existing_content() {
        let http = Arc::new(ScriptedFetch::new());
        http.respond(
            FetchMethod::Get,
            "https://bit.ly/y",
            Ok(FetchedResponse::html("<title>Fresh</title>")),
        );
        http.respond(
            FetchMethod::Head,
            "https://bit.ly/y",
            Err(FetchError::Timeout("head timed out".into())),
        );
        let (fetcher, store) = fetcher_with(http);

        let mut old = SiteMetadataRecord::invalid("https://bit.ly/y");
        old.title = Some("Old".into());
        old.description = Some("Old description".into());
        old.icon_url = Some("https://bit.ly/i.png".into());
        old.updated_at = Utc::now() - Duration::hours(1);
        store.put(old.clone()).await.unwrap();

        let record = fetcher.fetch_and_store(Some(old.clone()), "https://bit.ly/y").await;
        assert_eq!(record.title, None);
        assert_eq!(record.description, None);
        assert_eq!(record.icon_url, None);
        assert!(record.json_ld().is_none());
        assert_eq!(record.canonical_url, "https://bit.ly/y");
        assert!(record.updated_at > old.updated_at);
        assert_eq!(store.get("https://bit.ly/y").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_transport_error_creates_invalid_record() {
        let (fetcher, store) = fetcher_with(Arc::new(ScriptedFetch::new()));
        let record = fetcher.fetch_and_store(None, "http://down.test/").await;
        assert_eq!(record.url, "http://down.test/");
        assert_eq!(record.canonical_url, "http://down.test/");
        assert_eq!(record.title, None);
        assert!(store.get("http://down.test/").await.unwrap().is_some());
    }

    struct BrokenStore;

    #[async_trait]
    impl MetadataStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<SiteMetadataRecord>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn get_or_create(
            &self,
            _key: &str,
            _defaults: SiteMetadataRecord,
        ) -> Result<SiteMetadataRecord, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn put(&self, _record: SiteMetadataRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_still_returns_record() {
        let http = Arc::new(ScriptedFetch::new());
        http.respond(
            FetchMethod::Get,
            "http://ok.test/",
            Ok(FetchedResponse::html("<title>Still here</title>")),
        );
        let fetcher = Fetcher::new(http, Arc::new(BrokenStore));

        let record = fetcher.refresh("http://ok.test/").await;
        assert_eq!(record.title.as_deref(), Some("Still here"));
    }
}
