use super::ContentExtractor;
use scraper::{Html, Selector};
use tracing::debug;

impl ContentExtractor {
    /// Collect every `<script type="application/ld+json">` block that parses as JSON and
    /// serialize the list once for storage. Blocks that fail to parse are skipped.
    pub(super) fn extract_json_ld(&self, document: &Html) -> Option<String> {
        let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

        let blocks: Vec<serde_json::Value> = document
            .select(&selector)
            .filter_map(|script| {
                let json_text = script.text().collect::<String>();
                let trimmed = json_text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match serde_json::from_str::<serde_json::Value>(trimmed) {
                    Ok(serde_json::Value::Null) => None,
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!("skipping malformed JSON-LD block: {}", e);
                        None
                    }
                }
            })
            .collect();

        if blocks.is_empty() {
            return None;
        }
        serde_json::to_string(&blocks).ok()
    }
}
