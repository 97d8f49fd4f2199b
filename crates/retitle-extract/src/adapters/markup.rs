//! Markup extraction adapter: visible text of HTML and XML documents.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use retitle_core::{ExtractionAdapter, ExtractionError, ExtractionResult, ExtractionStrategy, Result};

use super::text_native::decode_text;

/// Elements whose content is never visible text.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", " "),
    ("copy", "©"),
    ("reg", "®"),
    ("trade", "™"),
    ("hellip", "…"),
    ("mdash", "—"),
    ("ndash", "–"),
    ("lsquo", "‘"),
    ("rsquo", "’"),
    ("ldquo", "“"),
    ("rdquo", "”"),
    ("laquo", "«"),
    ("raquo", "»"),
    ("euro", "€"),
    ("pound", "£"),
    ("deg", "°"),
    ("middot", "·"),
    ("bull", "•"),
    ("eacute", "é"),
    ("egrave", "è"),
    ("aacute", "á"),
    ("agrave", "à"),
    ("uuml", "ü"),
    ("ouml", "ö"),
    ("auml", "ä"),
    ("szlig", "ß"),
    ("ccedil", "ç"),
    ("ntilde", "ñ"),
];

/// Adapter for `html` and `xml` files.
pub struct MarkupAdapter;

/// Contents of the first `<title>` element, entity-decoded and trimmed.
pub fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = find_tag_open(&lower, 0, "title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title")?;
    let title = decode_entities(html[content_start..content_end].trim());
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Visible text of an HTML/XML document, title first.
pub fn html_to_text(html: &str) -> String {
    let body = decode_entities(&strip_markup(html));
    match extract_title(html) {
        Some(title) => format!("{}\n{}", title, body),
        None => body,
    }
}

/// Position of `<tag` followed by a delimiter, searching from `from`.
fn find_tag_open(lower: &str, from: usize, tag: &str) -> Option<usize> {
    let needle = format!("<{}", tag);
    let mut pos = from;
    while let Some(rel) = lower[pos..].find(&needle) {
        let start = pos + rel;
        let after = start + needle.len();
        match lower.as_bytes().get(after) {
            Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | None => {
                return Some(start)
            }
            _ => pos = after,
        }
    }
    None
}

fn is_tag_start(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('<')
        && matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
}

/// Remove tags, comments, CDATA markers, and raw-text elements. Tags
/// become spaces so adjacent blocks do not run together.
fn strip_markup(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut i = 0;
    let mut title_pending = true;

    while i < html.len() {
        let rest = &lower[i..];

        if rest.starts_with("<!--") {
            i = match rest.find("-->") {
                Some(end) => i + end + 3,
                None => html.len(),
            };
            out.push(' ');
            continue;
        }
        if rest.starts_with("<![cdata[") {
            i += "<![cdata[".len();
            continue;
        }
        if rest.starts_with("]]>") {
            i += 3;
            continue;
        }

        if is_tag_start(rest) {
            if let Some(tag) = RAW_TEXT_ELEMENTS
                .iter()
                .find(|tag| find_tag_open(rest, 0, tag) == Some(0))
            {
                i = element_end(&lower, i, tag).unwrap_or(html.len());
                out.push(' ');
                continue;
            }
            // The first title is emitted by html_to_text; later ones (DocBook
            // sections, feed items) are body text.
            if title_pending && find_tag_open(rest, 0, "title") == Some(0) {
                title_pending = false;
                if let Some(end) = element_end(&lower, i, "title") {
                    i = end;
                    out.push(' ');
                    continue;
                }
            }
            match rest.find('>') {
                Some(end) => {
                    i += end + 1;
                    out.push(' ');
                    continue;
                }
                None => {
                    out.push('<');
                    i += 1;
                    continue;
                }
            }
        }

        if let Some(ch) = html[i..].chars().next() {
            out.push(ch);
            i += ch.len_utf8();
        } else {
            break;
        }
    }
    out
}

/// Index just past the closing tag of the `tag` element opening at `start`.
fn element_end(lower: &str, start: usize, tag: &str) -> Option<usize> {
    let close = format!("</{}", tag);
    let close_at = start + lower[start..].find(&close)?;
    Some(close_at + lower[close_at..].find('>')? + 1)
}

/// Decode named and numeric character references. Unknown references are
/// kept verbatim.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp + 1..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi > 0 && semi <= 10)
            .and_then(|semi| decode_reference(&candidate[..semi]).map(|s| (s, semi)));
        match decoded {
            Some((s, semi)) => {
                out.push_str(&s);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = candidate;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(|c| c.to_string());
    }
    NAMED_ENTITIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.to_string())
}

#[async_trait]
impl ExtractionAdapter for MarkupAdapter {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Markup
    }

    async fn extract(
        &self,
        data: &[u8],
        _filename: &str,
        _config: &JsonValue,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        let decoded = decode_text(data);
        let title = extract_title(&decoded.text);
        let text = html_to_text(&decoded.text);
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }

        Ok(ExtractionResult::text(
            text,
            serde_json::json!({
                "encoding": decoded.encoding,
                "title": title,
                "source_bytes": data.len(),
            }),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "markup"
    }
}
