use crate::features::freshness::FreshnessCache;
use crate::tools::rank::{project_rank, rank_entries};
use crate::types::{EntryMetadata, PendingEntry, ResponseEntry, Sighting};
use tracing::{debug, info};
use url::Url;

/// Parse a sighting URL, accepting only absolute `http`/`https` URLs with a host.
pub fn validate_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    let web = matches!(url.scheme(), "http" | "https");
    (web && url.host_str().is_some_and(|h| !h.is_empty())).then_some(url)
}

/// Resolve a batch of sightings into ranked entries. One entry per sighting, always.
pub async fn build_response(cache: &FreshnessCache, sightings: Vec<Sighting>) -> Vec<ResponseEntry> {
    let total = sightings.len();
    let mut pending = Vec::with_capacity(total);

    for sighting in sightings {
        let id = sighting.display_id().map(str::to_string);
        let key_url = sighting.key_url().map(str::to_string);

        let record = match key_url.as_deref().map(|raw| (raw, validate_url(raw))) {
            Some((_, Some(url))) => cache.resolve(&url, sighting.force).await,
            Some((raw, None)) => {
                debug!("skipping fetch for invalid url {:?}", raw);
                None
            }
            None => None,
        };

        let metadata = match &record {
            Some(record) => EntryMetadata::from_record(id, record),
            None => EntryMetadata::bare(id, key_url),
        };
        pending.push(PendingEntry {
            metadata,
            signal: sighting.signal(),
        });
    }

    let ranked: Vec<ResponseEntry> = rank_entries(pending).into_iter().map(project_rank).collect();
    info!("resolved {} sightings", total);
    ranked
}
