use crate::core::error::FetchError;
use crate::scraping::http::{FetchRequest, HttpFetch};
use tracing::debug;
use url::Url;

/// Hosts whose links are expanded before they are stored as the canonical URL.
pub const URL_SHORTENERS: [&str; 14] = [
    "t.co",
    "goo.gl",
    "bit.ly",
    "j.mp",
    "bitly.com",
    "amzn.to",
    "fb.com",
    "bit.do",
    "adf.ly",
    "u.to",
    "tinyurl.com",
    "buzurl.com",
    "yourls.org",
    "qr.net",
];

pub fn is_shortener(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| URL_SHORTENERS.iter().any(|s| host.eq_ignore_ascii_case(s)))
}

/// Follow one permanent redirect of a known shortener.
///
/// Anything that is not a shortener, or a shortener that does not answer `301` with a
/// `Location`, comes back unchanged. Transport errors are returned to the caller.
pub async fn expand_url(http: &dyn HttpFetch, url: &str) -> Result<String, FetchError> {
    let Ok(parsed) = Url::parse(url) else {
        return Ok(url.to_string());
    };
    if !is_shortener(&parsed) {
        return Ok(url.to_string());
    }

    let response = http.fetch(&FetchRequest::head(url).without_redirects()).await?;
    match (response.status, response.header("location")) {
        (301, Some(location)) if !location.trim().is_empty() => {
            debug!("expanded {} -> {}", url, location);
            Ok(location.trim().to_string())
        }
        _ => Ok(url.to_string()),
    }
}
