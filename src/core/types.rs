use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RSSI values reserved by the beacon signal convention: 127 is "max / not measured",
/// 128 is "invalid".
pub const RSSI_SENTINELS: [f64; 2] = [127.0, 128.0];

/// Rank reported for entries whose path loss cannot be computed.
pub const UNKNOWN_RANK: f64 = 1000.0;

/// One beacon observation reported by a scanning client.
///
/// Deserialization never fails: a wrong-typed `id`/`url` is absent, a non-bool `force`
/// is false, and a non-object sighting is empty.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(from = "serde_json::Value")]
pub struct Sighting {
    pub id: Option<String>,
    pub url: Option<String>,
    pub force: bool,
    /// Raw JSON: clients send either numbers or numeric strings.
    pub rssi: Option<serde_json::Value>,
    pub txpower: Option<serde_json::Value>,
}

impl From<serde_json::Value> for Sighting {
    fn from(value: serde_json::Value) -> Self {
        let serde_json::Value::Object(mut fields) = value else {
            return Self::default();
        };
        let mut take_string = |key: &str| match fields.remove(key) {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        };
        let id = take_string("id");
        let url = take_string("url");
        Self {
            id,
            url,
            force: matches!(fields.get("force"), Some(serde_json::Value::Bool(true))),
            rssi: fields.remove("rssi"),
            txpower: fields.remove("txpower"),
        }
    }
}

impl Sighting {
    /// URL used as the cache key: the explicit `url`, else the beacon `id`.
    pub fn key_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.id.as_deref())
    }

    /// Identifier echoed back to the client.
    pub fn display_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.url.as_deref())
    }

    pub fn signal(&self) -> SignalReading {
        SignalReading {
            rssi: parse_signal(self.rssi.as_ref()),
            txpower: parse_signal(self.txpower.as_ref()),
        }
    }
}

/// Lenient float parsing for signal fields; anything unusable is `None`.
pub fn parse_signal(value: Option<&serde_json::Value>) -> Option<f64> {
    let parsed = match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalReading {
    pub rssi: Option<f64>,
    pub txpower: Option<f64>,
}

/// Cached page metadata, keyed by the URL the beacon advertised.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SiteMetadataRecord {
    pub url: String,
    /// Shortener-expanded URL; equals `url` for direct links and failed fetches.
    pub canonical_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    /// JSON array of the page's JSON-LD blocks, serialized once at extraction time.
    #[serde(default)]
    pub structured_data: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SiteMetadataRecord {
    /// Record for a URL that could not be fetched: no content, fresh timestamp.
    pub fn invalid(url: &str) -> Self {
        Self {
            url: url.to_string(),
            canonical_url: url.to_string(),
            title: None,
            description: None,
            icon_url: None,
            structured_data: None,
            updated_at: Utc::now(),
        }
    }

    pub fn clear_content(&mut self) {
        self.canonical_url = self.url.clone();
        self.title = None;
        self.description = None;
        self.icon_url = None;
        self.structured_data = None;
        self.updated_at = Utc::now();
    }

    pub fn apply(&mut self, canonical_url: String, content: ExtractedContent) {
        self.canonical_url = canonical_url;
        self.title = content.title;
        self.description = content.description;
        self.icon_url = content.icon_url;
        self.structured_data = content.structured_data;
        self.updated_at = Utc::now();
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        self.updated_at < now - threshold
    }

    /// Decoded JSON-LD blocks. A stored value that no longer parses is treated as absent.
    pub fn json_ld(&self) -> Option<Vec<serde_json::Value>> {
        let raw = self.structured_data.as_deref()?;
        serde_json::from_str::<Vec<serde_json::Value>>(raw).ok()
    }
}

/// Output of the content extractor for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub structured_data: Option<String>,
}

/// The three URLs known for a fetched page, logged together on icon failures.
#[derive(Debug, Clone)]
pub struct PageUrls {
    pub request_url: Option<String>,
    pub expanded_url: Option<String>,
    pub final_url: url::Url,
}

/// Display fields shared by pending and ranked entries.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct EntryMetadata {
    pub id: Option<String>,
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "json-ld", default, skip_serializing_if = "Option::is_none")]
    pub json_ld: Option<Vec<serde_json::Value>>,
}

impl EntryMetadata {
    pub fn from_record(id: Option<String>, record: &SiteMetadataRecord) -> Self {
        Self {
            id,
            url: Some(record.canonical_url.clone()),
            title: record.title.clone(),
            description: record.description.clone(),
            icon: record.icon_url.clone(),
            json_ld: record.json_ld(),
        }
    }

    pub fn bare(id: Option<String>, url: Option<String>) -> Self {
        Self {
            id,
            url,
            ..Default::default()
        }
    }
}

/// Entry assembled from a sighting, still carrying its raw signal values.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub metadata: EntryMetadata,
    pub signal: SignalReading,
}

/// Entry as returned to clients: signal values replaced by a single rank.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResponseEntry {
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub rank: f64,
}

/// `/resolve-scan` accepts a bare array or the `{"objects": [...]}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResolveScanRequest {
    Batch(Vec<Sighting>),
    Envelope { objects: Vec<Sighting> },
}

/// Mirrors the request shape: bare array in, bare array out.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResolveScanResponse {
    Batch(Vec<ResponseEntry>),
    Envelope { metadata: Vec<ResponseEntry> },
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct RefreshRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_signal_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_signal(Some(&json!(-65))), Some(-65.0));
        assert_eq!(parse_signal(Some(&json!("-20.5"))), Some(-20.5));
        assert_eq!(parse_signal(Some(&json!(" 12 "))), Some(12.0));
    }

    #[test]
    fn test_parse_signal_rejects_garbage() {
        assert_eq!(parse_signal(None), None);
        assert_eq!(parse_signal(Some(&json!(null))), None);
        assert_eq!(parse_signal(Some(&json!("loud"))), None);
        assert_eq!(parse_signal(Some(&json!("NaN"))), None);
        assert_eq!(parse_signal(Some(&json!([1]))), None);
    }

    #[test]
    fn test_wrong_typed_fields_are_dropped_not_rejected() {
        let s: Sighting = serde_json::from_value(json!({
            "id": 42, "url": 123, "force": "yes", "rssi": "-60", "txpower": -20
        }))
        .unwrap();
        assert_eq!(s.id, None);
        assert_eq!(s.url, None);
        assert!(!s.force);
        assert_eq!(s.signal(), SignalReading { rssi: Some(-60.0), txpower: Some(-20.0) });

        let not_an_object: Sighting = serde_json::from_value(json!("beacon")).unwrap();
        assert_eq!(not_an_object.key_url(), None);

        let batch: ResolveScanRequest = serde_json::from_value(json!([
            {"url": "ftp://a/", "rssi": -60, "txpower": -20},
            {"url": "ftp://b/", "force": "yes"},
            7
        ]))
        .unwrap();
        assert!(matches!(batch, ResolveScanRequest::Batch(ref v) if v.len() == 3));
    }

    #[test]
    fn test_key_url_prefers_url_over_id() {
        let s = Sighting {
            id: Some("beacon-1".into()),
            url: Some("https://example.com".into()),
            ..Default::default()
        };
        assert_eq!(s.key_url(), Some("https://example.com"));
        assert_eq!(s.display_id(), Some("beacon-1"));

        let id_only = Sighting {
            id: Some("https://example.org".into()),
            ..Default::default()
        };
        assert_eq!(id_only.key_url(), Some("https://example.org"));
    }

    #[test]
    fn test_response_entry_omits_absent_fields() {
        let entry = ResponseEntry {
            metadata: EntryMetadata::bare(Some("a".into()), Some("http://a".into())),
            rank: 1000.0,
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v, json!({"id": "a", "url": "http://a", "rank": 1000.0}));
    }

    #[test]
    fn test_request_accepts_both_shapes() {
        let bare: ResolveScanRequest =
            serde_json::from_value(json!([{"url": "http://a", "rssi": -60}])).unwrap();
        assert!(matches!(bare, ResolveScanRequest::Batch(ref v) if v.len() == 1));

        let wrapped: ResolveScanRequest =
            serde_json::from_value(json!({"objects": [{"id": "x", "force": true}]})).unwrap();
        match wrapped {
            ResolveScanRequest::Envelope { objects } => assert!(objects[0].force),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_stale_after_threshold() {
        let mut record = SiteMetadataRecord::invalid("http://a");
        let now = Utc::now();
        assert!(!record.is_stale(now, chrono::Duration::minutes(5)));
        record.updated_at = now - chrono::Duration::minutes(6);
        assert!(record.is_stale(now, chrono::Duration::minutes(5)));
    }
}
