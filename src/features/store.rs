use crate::core::error::StoreError;
use crate::types::SiteMetadataRecord;
use async_trait::async_trait;
use moka::future::Cache;

/// Persistence for site metadata, keyed by the sighting URL.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<SiteMetadataRecord>, StoreError>;

    /// Return the stored record, or insert `defaults` under `key` and return it.
    async fn get_or_create(
        &self,
        key: &str,
        defaults: SiteMetadataRecord,
    ) -> Result<SiteMetadataRecord, StoreError>;

    /// Overwrite the record stored under its `url`. Last write wins.
    async fn put(&self, record: SiteMetadataRecord) -> Result<(), StoreError>;
}

/// In-process store on a bounded moka cache.
#[derive(Clone)]
pub struct InMemoryStore {
    records: Cache<String, SiteMetadataRecord>,
}

impl InMemoryStore {
    pub fn new(capacity: u64) -> Self {
        Self {
            records: Cache::builder().max_capacity(capacity).build(),
        }
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<SiteMetadataRecord>, StoreError> {
        Ok(self.records.get(key).await)
    }

    async fn get_or_create(
        &self,
        key: &str,
        defaults: SiteMetadataRecord,
    ) -> Result<SiteMetadataRecord, StoreError> {
        let entry = self
            .records
            .entry_by_ref(key)
            .or_insert_with(async move { defaults })
            .await;
        Ok(entry.into_value())
    }

    async fn put(&self, record: SiteMetadataRecord) -> Result<(), StoreError> {
        self.records.insert(record.url.clone(), record).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_keeps_existing_record() {
        let store = InMemoryStore::new(16);
        let mut first = SiteMetadataRecord::invalid("http://example.com/");
        first.title = Some("First".into());

        let created = store
            .get_or_create("http://example.com/", first.clone())
            .await
            .unwrap();
        assert_eq!(created, first);

        let again = store
            .get_or_create(
                "http://example.com/",
                SiteMetadataRecord::invalid("http://example.com/"),
            )
            .await
            .unwrap();
        assert_eq!(again.title.as_deref(), Some("First"));
    }

    #[tokio::test]
    async fn test_put_overwrites_and_get_misses_unknown_keys() {
        let store = InMemoryStore::new(16);
        assert_eq!(store.get("http://nope.test/").await.unwrap(), None);

        let mut record = SiteMetadataRecord::invalid("http://example.com/");
        store.put(record.clone()).await.unwrap();
        record.title = Some("Updated".into());
        store.put(record.clone()).await.unwrap();

        let stored = store.get("http://example.com/").await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Updated"));
    }
}
