use scraper::{ElementRef, Html, Selector};

/// Collapse a text fragment onto one line: trim, turn `\r \n \t \v \f` into spaces,
/// then squeeze runs of spaces.
pub fn flatten_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_space = false;
    for c in input.trim().chars() {
        let c = match c {
            '\r' | '\n' | '\t' | '\u{0B}' | '\u{0C}' => ' ',
            other => other,
        };
        if c == ' ' {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out
}

/// First `max_chars` characters (not bytes), without a dangling trailing space.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].trim_end().to_string(),
        None => input.to_string(),
    }
}

/// Which part of `<body>` a text fallback reads from.
#[derive(Debug, Clone, Copy)]
pub(super) enum TextScope<'a> {
    /// Inside an element whose `class` attribute is exactly this value.
    Class(&'a str),
    /// Inside the element with this `id`.
    Id(&'a str),
    WholeBody,
}

impl TextScope<'_> {
    fn matches(&self, el: &ElementRef) -> bool {
        match self {
            TextScope::Class(class) => el.value().attr("class") == Some(*class),
            TextScope::Id(id) => el.value().attr("id") == Some(*id),
            TextScope::WholeBody => true,
        }
    }
}

/// Direct text of every leaf element (no element children, not script/style) under
/// `<body>` within `scope`, in document order, joined by spaces.
pub(super) fn leaf_text(document: &Html, scope: TextScope<'_>) -> String {
    let Ok(body_sel) = Selector::parse("body") else {
        return String::new();
    };

    let mut parts: Vec<String> = Vec::new();
    for body in document.select(&body_sel) {
        for node in body.descendants().skip(1) {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            if !is_text_leaf(&el) || !in_scope(&el, &body, scope) {
                continue;
            }
            parts.extend(
                el.children()
                    .filter_map(|child| child.value().as_text())
                    .map(|text| String::from(&**text)),
            );
        }
    }
    parts.join(" ")
}

fn is_text_leaf(el: &ElementRef) -> bool {
    let name = el.value().name();
    if name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style") {
        return false;
    }
    !el.children().any(|child| child.value().is_element())
}

/// Strict ancestor of `el`, below `body`, that matches the scope.
fn in_scope(el: &ElementRef, body: &ElementRef, scope: TextScope<'_>) -> bool {
    if matches!(scope, TextScope::WholeBody) {
        return true;
    }
    el.ancestors()
        .take_while(|node| node.id() != body.id())
        .filter_map(ElementRef::wrap)
        .any(|ancestor| scope.matches(&ancestor))
}
