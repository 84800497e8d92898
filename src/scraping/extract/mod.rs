mod clean;
mod jsonld;
mod metadata;

pub use clean::{flatten_text, truncate_chars};
pub use metadata::MAX_DESCRIPTION_CHARS;

use crate::core::error::FetchError;
use crate::scraping::encoding;
use crate::scraping::http::{FetchRequest, HttpFetch};
use crate::types::{ExtractedContent, PageUrls};
use scraper::Html;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use url::Url;

const UNKNOWN_URL: &str = "[none]";

/// Pulls display metadata out of a fetched page.
pub struct ContentExtractor {
    http: Arc<dyn HttpFetch>,
}

/// Everything that can be read from the document without touching the network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon_candidate: Option<String>,
    pub structured_data: Option<String>,
}

#[derive(Debug, Error)]
pub enum IconRejection {
    #[error("no usable icon url")]
    Missing,
    #[error("status {0}")]
    Status(u16),
    #[error("content-type {0:?} is not an image")]
    NotImage(Option<String>),
    #[error("{0}")]
    Fetch(#[from] FetchError),
}

impl ContentExtractor {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }

    pub async fn extract(&self, raw: &[u8], encoding: &str, urls: &PageUrls) -> ExtractedContent {
        let parsed = self.parse_page(raw, encoding, &urls.final_url);
        let icon_url = self.validate_icon(parsed.icon_candidate, urls).await;
        ExtractedContent {
            title: parsed.title,
            description: parsed.description,
            icon_url,
            structured_data: parsed.structured_data,
        }
    }

    /// Synchronous half of extraction. `Html` is not `Send`, so it never lives across an await.
    pub fn parse_page(&self, raw: &[u8], encoding: &str, final_url: &Url) -> ParsedPage {
        let html = encoding::decode(raw, encoding);
        let document = Html::parse_document(&html);

        let title = self.extract_title(&document);
        let description = self.extract_description(&document, title.as_deref());
        ParsedPage {
            icon_candidate: self.icon_candidate(&document, final_url),
            structured_data: self.extract_json_ld(&document),
            title,
            description,
        }
    }

    /// Keep the icon only if a HEAD request answers 200 with an `image/*` content type.
    async fn validate_icon(&self, candidate: Option<String>, urls: &PageUrls) -> Option<String> {
        let verdict = match candidate.as_deref() {
            Some(icon) => self.check_icon(icon).await,
            None => Err(IconRejection::Missing),
        };
        match verdict {
            Ok(()) => candidate,
            Err(reason) => {
                warn!("{}", icon_warning(urls, candidate.as_deref(), &reason));
                None
            }
        }
    }

    async fn check_icon(&self, icon: &str) -> Result<(), IconRejection> {
        let response = self.http.fetch(&FetchRequest::head(icon)).await?;
        if response.status != 200 {
            return Err(IconRejection::Status(response.status));
        }
        match response.header("content-type") {
            Some(ct) if ct.trim_start().starts_with("image/") => Ok(()),
            other => Err(IconRejection::NotImage(other.map(|s| s.to_string()))),
        }
    }
}

/// `icon error with <url> <expanded> <final> -> <icon> (<reason>)`, unknown parts as `[none]`.
pub fn icon_warning(urls: &PageUrls, icon: Option<&str>, reason: &IconRejection) -> String {
    format!(
        "icon error with {} {} {} -> {} ({})",
        urls.request_url.as_deref().unwrap_or(UNKNOWN_URL),
        urls.expanded_url.as_deref().unwrap_or(UNKNOWN_URL),
        urls.final_url.as_str(),
        icon.unwrap_or(UNKNOWN_URL),
        reason
    )
}
