//! Field extraction for the scheduler's XML responses
//!
//! Control responses are flat documents such as
//! `<Jobs><Job><id>12</id><status>Done</status></Job></Jobs>` or
//! `<errMsg>...</errMsg>`. Only a handful of leaf fields are ever read, so
//! the extraction works on tag boundaries instead of building a tree.

/// Escapes the characters the scheduler treats as markup in credentials
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reverses the predefined XML entities
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Whether the document contains an opening `<tag>` element
pub fn has_tag(xml: &str, tag: &str) -> bool {
    find_open(xml, tag, 0).is_some()
}

/// Text of the first `<tag>` element, entity-unescaped and trimmed
///
/// A self-closing `<tag/>` yields an empty string.
pub fn field(xml: &str, tag: &str) -> Option<String> {
    elements(xml, tag)
        .into_iter()
        .next()
        .map(|inner| unescape(inner.trim()))
}

/// Raw inner text of every `<tag>` element, in document order
pub fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let close = format!("</{}>", tag);
    let mut out = Vec::new();
    let mut cursor = 0;

    while let Some((content_start, self_closing)) = find_open(xml, tag, cursor) {
        if self_closing {
            out.push("");
            cursor = content_start;
            continue;
        }
        match xml[content_start..].find(&close) {
            Some(offset) => {
                out.push(&xml[content_start..content_start + offset]);
                cursor = content_start + offset + close.len();
            }
            None => break,
        }
    }

    out
}

/// Locates the next opening tag named exactly `tag` at or after `from`
///
/// Returns the byte offset just past the opening tag and whether it was
/// self-closing. `<Job>` does not match `<Jobs>`.
fn find_open(xml: &str, tag: &str, from: usize) -> Option<(usize, bool)> {
    let needle = format!("<{}", tag);
    let mut cursor = from;

    while let Some(offset) = xml[cursor..].find(&needle) {
        let name_end = cursor + offset + needle.len();
        match xml[name_end..].chars().next() {
            Some('>') => return Some((name_end + 1, false)),
            Some(c) if c == '/' || c.is_whitespace() => {
                let tag_end = name_end + xml[name_end..].find('>')?;
                let self_closing = xml[..tag_end].ends_with('/');
                return Some((tag_end + 1, self_closing));
            }
            _ => cursor = name_end,
        }
    }

    None
}
