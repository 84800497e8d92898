use super::clean::{flatten_text, leaf_text, truncate_chars, TextScope};
use super::ContentExtractor;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// `<link rel>` values tried for the icon, most specific first.
const ICON_RELS: [&str; 4] = [
    "shortcut icon",
    "icon",
    "apple-touch-icon-precomposed",
    "apple-touch-icon",
];

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .find_map(|el| el.value().attr(attr))
        .map(|v| v.to_string())
}

fn all_attrs(document: &Html, selector: &str, attr: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

impl ContentExtractor {
    /// `<title>`, falling back to `og:title`, flattened to one line.
    pub(super) fn extract_title(&self, document: &Html) -> Option<String> {
        let from_title = Selector::parse("head title").ok().and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| el.text().collect::<String>())
                .filter(|t| !t.trim().is_empty())
        });

        from_title
            .or_else(|| first_attr(document, r#"head meta[property="og:title"]"#, "content"))
            .map(|t| flatten_text(&t))
            .and_then(non_empty)
    }

    /// Meta description → og:description → `.content` → `#content` → body text.
    pub(super) fn extract_description(
        &self,
        document: &Html,
        title: Option<&str>,
    ) -> Option<String> {
        let meta = first_attr(document, r#"head meta[name="description"]"#, "content")
            .map(|d| flatten_text(&d))
            .and_then(non_empty)
            .filter(|d| Some(d.as_str()) != title);

        let description = meta
            .or_else(|| {
                let og = all_attrs(document, r#"head meta[property="og:description"]"#, "content");
                non_empty(flatten_text(&og.join(" ")))
            })
            .or_else(|| non_empty(flatten_text(&leaf_text(document, TextScope::Class("content")))))
            .or_else(|| non_empty(flatten_text(&leaf_text(document, TextScope::Id("content")))))
            .or_else(|| non_empty(flatten_text(&leaf_text(document, TextScope::WholeBody))))?;

        Some(truncate_chars(&description, MAX_DESCRIPTION_CHARS))
    }

    /// Icon link or og:image resolved against the final URL, else `/favicon.ico`.
    ///
    /// `None` only when a declared href cannot be joined into a URL at all.
    pub(super) fn icon_candidate(&self, document: &Html, final_url: &Url) -> Option<String> {
        let declared = ICON_RELS
            .iter()
            .find_map(|rel| {
                first_attr(document, &format!(r#"head link[rel="{rel}"]"#), "href")
                    .filter(|href| !href.trim().is_empty())
            })
            .or_else(|| {
                first_attr(document, r#"head meta[property="og:image"]"#, "content")
                    .filter(|href| !href.trim().is_empty())
            });

        let Some(href) = declared else {
            return final_url.join("/favicon.ico").ok().map(|u| u.to_string());
        };

        let href = href.trim();
        let href = href.strip_prefix("./").unwrap_or(href);
        match final_url.join(href) {
            Ok(u) => Some(u.to_string()),
            Err(e) => {
                debug!("icon href {:?} does not resolve against {}: {}", href, final_url, e);
                None
            }
        }
    }
}
