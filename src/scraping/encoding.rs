use scraper::{Html, Selector};

const UTF_8: &str = "utf-8";
const ISO_8859_1: &str = "iso-8859-1";

/// Work out the character encoding of a raw page body.
///
/// Declarations win over sniffing: `http-equiv` Content-Type charset first, then
/// `<meta charset>`, then UTF-8 if the bytes decode cleanly, else ISO-8859-1.
pub fn detect_encoding(raw: &[u8]) -> String {
    // Latin-1 maps every byte to one char, so markup survives whatever the real encoding is.
    let structural: String = raw.iter().map(|&b| b as char).collect();
    let document = Html::parse_document(&structural);

    if let Some(charset) = http_equiv_charset(&document) {
        return charset;
    }
    if let Some(charset) = meta_charset(&document) {
        return charset;
    }

    if std::str::from_utf8(raw).is_ok() {
        UTF_8.to_string()
    } else {
        ISO_8859_1.to_string()
    }
}

fn http_equiv_charset(document: &Html) -> Option<String> {
    let selector = Selector::parse("head meta[http-equiv]").ok()?;
    document
        .select(&selector)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("content-type"))
        })
        .find_map(|el| el.value().attr("content"))
        .and_then(charset_param)
}

fn meta_charset(document: &Html) -> Option<String> {
    let selector = Selector::parse("head meta[charset]").ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("charset"))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// `charset` parameter of a MIME header value such as `text/html; charset="utf-8"`.
pub fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Decode a page body with the detected label. Unknown labels fall back to lossy UTF-8.
pub fn decode(raw: &[u8], label: &str) -> String {
    match encoding_rs::Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) => {
            let (text, _, _) = encoding.decode(raw);
            text.into_owned()
        }
        None => {
            tracing::debug!("unknown charset label {:?}, decoding as utf-8", label);
            String::from_utf8_lossy(raw).into_owned()
        }
    }
}
