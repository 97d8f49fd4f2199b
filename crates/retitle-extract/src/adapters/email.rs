//! Email extraction adapter: subject and body of `eml` and `msg` files.
//!
//! `eml` is parsed as an RFC 5322 message with MIME bodies. Attachments are
//! skipped. A message whose header block cannot be parsed is treated as a
//! bare body rather than failed.
//!
//! `msg` is an OLE compound file. No structured parse is attempted; the
//! container is scanned for UTF-16LE (then ASCII) text runs.

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value as JsonValue;
use tracing::debug;

use retitle_core::defaults::BINARY_TEXT_MIN_RUN;
use retitle_core::{ExtractionAdapter, ExtractionError, ExtractionResult, ExtractionStrategy, Result};

use super::markup::html_to_text;
use super::text_native::decode_text;
use crate::command::extension_of;

/// Nesting limit for multipart bodies.
const MAX_MIME_DEPTH: usize = 8;

/// OLE compound file signature.
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Adapter for `eml` and `msg` files.
pub struct EmailAdapter;

// =============================================================================
// HEADERS
// =============================================================================

#[derive(Debug, Default)]
struct Headers(Vec<(String, String)>);

impl Headers {
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

/// Parse an unfolded header block. `None` if any line is not a header.
fn parse_headers(head: &str) -> Option<Headers> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for (i, line) in head.lines().enumerate() {
        if i == 0 && line.starts_with("From ") {
            continue; // mbox separator
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            let (_, value) = headers.last_mut()?;
            value.push(' ');
            value.push_str(line.trim());
            continue;
        }
        let (name, value) = line.split_once(':')?;
        if !is_header_name(name) {
            return None;
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }
    (!headers.is_empty()).then_some(Headers(headers))
}

/// Split an entity into headers and body. Line endings must already be `\n`.
fn split_entity(entity: &str) -> (Option<Headers>, &str) {
    if let Some(body) = entity.strip_prefix('\n') {
        return (Some(Headers::default()), body);
    }
    let (head, body) = match entity.find("\n\n") {
        Some(i) => (&entity[..i], &entity[i + 2..]),
        None => (entity, ""),
    };
    match parse_headers(head) {
        Some(headers) => (Some(headers), body),
        None => (None, entity),
    }
}

// =============================================================================
// MIME
// =============================================================================

#[derive(Debug)]
struct ContentType {
    mime: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self {
                mime: "text/plain".to_string(),
                params: Vec::new(),
            };
        };
        let mut pieces = value.split(';');
        let mime = pieces
            .next()
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "text/plain".to_string());
        let params = pieces
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| {
                (
                    k.trim().to_ascii_lowercase(),
                    v.trim().trim_matches('"').to_string(),
                )
            })
            .collect();
        Self { mime, params }
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn is_attachment(headers: &Headers) -> bool {
    headers
        .get("Content-Disposition")
        .is_some_and(|d| d.trim_start().to_ascii_lowercase().starts_with("attachment"))
}

/// A decoded text body and whether it was HTML.
#[derive(Debug)]
struct BodyPart {
    text: String,
    html: bool,
}

/// Collect text/plain and text/html leaves in document order.
fn collect_text_parts(headers: &Headers, body: &str, depth: usize, out: &mut Vec<BodyPart>) {
    if depth > MAX_MIME_DEPTH || is_attachment(headers) {
        return;
    }
    let content_type = ContentType::parse(headers.get("Content-Type"));

    if content_type.mime.starts_with("multipart/") {
        let Some(boundary) = content_type.param("boundary") else {
            return;
        };
        let delimiter = format!("--{}", boundary);
        for segment in body.split(delimiter.as_str()).skip(1) {
            if segment.starts_with("--") {
                break;
            }
            // Rest of the delimiter line.
            let part = segment.split_once('\n').map(|(_, p)| p).unwrap_or("");
            let (part_headers, part_body) = split_entity(part);
            let part_headers = part_headers.unwrap_or_default();
            collect_text_parts(&part_headers, part_body, depth + 1, out);
        }
        return;
    }

    let html = match content_type.mime.as_str() {
        "text/plain" => false,
        "text/html" => true,
        _ => return,
    };
    let charset = content_type.param("charset").unwrap_or("utf-8");
    let text = decode_transfer(headers.get("Content-Transfer-Encoding"), body, charset);
    out.push(BodyPart { text, html });
}

/// First non-blank text/plain part, else the first non-blank HTML part.
fn choose_body(parts: Vec<BodyPart>) -> Option<BodyPart> {
    let mut html = None;
    for part in parts {
        if part.text.trim().is_empty() {
            continue;
        }
        if !part.html {
            return Some(part);
        }
        if html.is_none() {
            html = Some(part);
        }
    }
    html
}

// =============================================================================
// ENCODINGS
// =============================================================================

fn decode_transfer(encoding: Option<&str>, body: &str, charset: &str) -> String {
    match encoding.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
        Some("quoted-printable") => decode_charset(decode_quoted_printable(body), charset),
        Some("base64") => {
            let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
            match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
                Ok(bytes) => decode_charset(bytes, charset),
                Err(e) => {
                    debug!(error = %e, "Invalid base64 body, using raw text");
                    body.to_string()
                }
            }
        }
        _ => body.to_string(),
    }
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Quoted-printable decode. Soft line breaks are removed; malformed escapes
/// are kept literally.
fn decode_quoted_printable(body: &str) -> Vec<u8> {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            if bytes.get(i + 1) == Some(&b'\n') {
                i += 2;
                continue;
            }
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|&b| hex_value(b)),
                bytes.get(i + 2).and_then(|&b| hex_value(b)),
            ) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Decode bytes in a declared charset. Unknown charsets use the generic
/// fallback chain.
fn decode_charset(bytes: Vec<u8>, charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8(bytes)
            .unwrap_or_else(|e| decode_text(e.as_bytes()).text),
        "iso-8859-1" | "iso-8859-15" | "latin1" | "windows-1252" | "cp1252" => {
            bytes.iter().map(|&b| b as char).collect()
        }
        _ => decode_text(&bytes).text,
    }
}

/// Decode RFC 2047 encoded words (`=?charset?B|Q?text?=`). Whitespace
/// between adjacent encoded words is dropped.
fn decode_encoded_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut after_encoded = false;
    while let Some(start) = rest.find("=?") {
        let (before, word) = rest.split_at(start);
        match parse_encoded_word(word) {
            Some((decoded, consumed)) => {
                if !(after_encoded && before.trim().is_empty()) {
                    out.push_str(before);
                }
                out.push_str(&decoded);
                rest = &word[consumed..];
                after_encoded = true;
            }
            None => {
                out.push_str(before);
                out.push_str("=?");
                rest = &word[2..];
                after_encoded = false;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse one encoded word at the start of `word`; returns the decoded text
/// and the number of bytes consumed.
fn parse_encoded_word(word: &str) -> Option<(String, usize)> {
    let inner = word.strip_prefix("=?")?;
    let charset_end = inner.find('?')?;
    let charset = inner[..charset_end].split('*').next().unwrap_or("");
    let after_charset = &inner[charset_end + 1..];
    let encoding = after_charset.chars().next()?;
    let payload = after_charset.get(1..)?.strip_prefix('?')?;
    let end = payload.find("?=")?;
    let text = &payload[..end];

    let bytes = match encoding.to_ascii_uppercase() {
        'B' => base64::engine::general_purpose::STANDARD
            .decode(text)
            .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(text))
            .ok()?,
        'Q' => decode_quoted_printable(&text.replace('_', " ")),
        _ => return None,
    };
    let consumed = 2 + charset_end + 1 + 2 + end + 2;
    Some((decode_charset(bytes, charset), consumed))
}

// =============================================================================
// EML
// =============================================================================

#[derive(Debug)]
struct ParsedEmail {
    subject: Option<String>,
    from: Option<String>,
    date: Option<String>,
    body: String,
    body_type: &'static str,
    headers_parsed: bool,
}

fn parse_eml(raw: &str) -> ParsedEmail {
    let normalized = raw.replace("\r\n", "\n");
    let (headers, body) = split_entity(&normalized);

    let Some(headers) = headers else {
        return ParsedEmail {
            subject: None,
            from: None,
            date: None,
            body: body.trim().to_string(),
            body_type: "plain",
            headers_parsed: false,
        };
    };

    let header_text = |name: &str| {
        headers
            .get(name)
            .map(decode_encoded_words)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut parts = Vec::new();
    collect_text_parts(&headers, body, 0, &mut parts);
    let (body, body_type) = match choose_body(parts) {
        Some(BodyPart { text, html: false }) => (text.trim().to_string(), "plain"),
        Some(BodyPart { text, html: true }) => (html_to_text(&text).trim().to_string(), "html"),
        None => (String::new(), "none"),
    };

    ParsedEmail {
        subject: header_text("Subject"),
        from: header_text("From"),
        date: header_text("Date"),
        body,
        body_type,
        headers_parsed: true,
    }
}

// =============================================================================
// MSG
// =============================================================================

/// OLE directory entry names that show up as text runs.
fn is_storage_name(run: &str) -> bool {
    run.starts_with("__") || run == "Root Entry" || run.starts_with("__substg1.0_")
}

fn is_run_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r')
        || (' '..='~').contains(&c)
        || ('\u{00A0}'..='\u{024F}').contains(&c)
        || ('\u{2010}'..='\u{2027}').contains(&c)
}

fn keep_run(run: String, out: &mut Vec<String>) {
    let trimmed = run.trim();
    if trimmed.chars().count() >= BINARY_TEXT_MIN_RUN
        && trimmed.chars().any(|c| c.is_alphabetic())
        && !is_storage_name(trimmed)
        && !out.iter().any(|r| r == trimmed)
    {
        out.push(trimmed.to_string());
    }
}

/// Runs of UTF-16LE text at even offsets.
fn utf16_runs(data: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for pair in data.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(unit as u32).filter(|&c| is_run_char(c)) {
            Some(c) => current.push(c),
            None => keep_run(std::mem::take(&mut current), &mut runs),
        }
    }
    keep_run(current, &mut runs);
    runs
}

/// Runs of printable ASCII.
fn ascii_runs(data: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for &b in data {
        let c = b as char;
        if b.is_ascii() && is_run_char(c) {
            current.push(c);
        } else {
            keep_run(std::mem::take(&mut current), &mut runs);
        }
    }
    keep_run(current, &mut runs);
    runs
}

fn scan_msg(data: &[u8]) -> std::result::Result<String, ExtractionError> {
    if !data.starts_with(&OLE_SIGNATURE) {
        debug!("msg file lacks OLE signature, scanning anyway");
    }
    let mut runs = utf16_runs(data);
    if runs.is_empty() {
        runs = ascii_runs(data);
    }
    if runs.is_empty() {
        return Err(ExtractionError::DecodeFailure(
            "no readable text found in msg container".to_string(),
        ));
    }
    Ok(runs.join("\n"))
}

#[async_trait]
impl ExtractionAdapter for EmailAdapter {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Email
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        _config: &JsonValue,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        if extension_of(filename) == "msg" {
            let text = scan_msg(data)?;
            return Ok(ExtractionResult::text(
                text,
                serde_json::json!({ "container": "ole", "source_bytes": data.len() }),
            ));
        }

        let raw = decode_text(data).text;
        let email = parse_eml(&raw);
        let text = match &email.subject {
            Some(subject) if !email.body.is_empty() => format!("{}\n\n{}", subject, email.body),
            Some(subject) => subject.clone(),
            None => email.body.clone(),
        };
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }

        Ok(ExtractionResult::text(
            text,
            serde_json::json!({
                "subject": email.subject,
                "from": email.from,
                "date": email.date,
                "body_type": email.body_type,
                "headers_parsed": email.headers_parsed,
            }),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "From: Alice <alice@example.com>\r\n\
Subject: Team offsite\r\n planning notes\r\n\
Date: Mon, 5 Jan 2026 10:00:00 +0000\r\n\
\r\n\
Let's meet on Friday.\r\n";

    #[test]
    fn test_header_unfolding_and_body() {
        let email = parse_eml(SIMPLE);
        assert_eq!(email.subject.as_deref(), Some("Team offsite planning notes"));
        assert_eq!(email.from.as_deref(), Some("Alice <alice@example.com>"));
        assert_eq!(email.body, "Let's meet on Friday.");
        assert!(email.headers_parsed);
    }

    #[test]
    fn test_encoded_word_subjects() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?Q2Fmw6kgbWVudQ==?="), "Café menu");
        assert_eq!(
            decode_encoded_words("=?iso-8859-1?Q?Caf=E9_au_lait?="),
            "Café au lait"
        );
        assert_eq!(
            decode_encoded_words("=?utf-8?q?Hello?= =?utf-8?q?_World?="),
            "Hello World"
        );
        assert_eq!(decode_encoded_words("Re: plain =? text"), "Re: plain =? text");
    }

    #[test]
    fn test_multipart_prefers_plain_and_skips_attachments() {
        let raw = "Subject: Invoice\n\
Content-Type: multipart/mixed; boundary=\"outer\"\n\
\n\
preamble\n\
--outer\n\
Content-Type: multipart/alternative; boundary=inner\n\
\n\
--inner\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>HTML version</p>\n\
--inner\n\
Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
Amount due: 42 =E2=82=AC, pay=\n\
able in May\n\
--inner--\n\
--outer\n\
Content-Type: text/plain\n\
Content-Disposition: attachment; filename=\"notes.txt\"\n\
\n\
attachment text\n\
--outer--\n";
        let email = parse_eml(raw);
        assert_eq!(email.body_type, "plain");
        assert_eq!(email.body, "Amount due: 42 €, payable in May");
        assert!(!email.body.contains("attachment text"));
    }

    #[test]
    fn test_html_only_body_is_stripped() {
        let raw = "Subject: News\n\
Content-Type: text/html\n\
Content-Transfer-Encoding: base64\n\
\n\
PGgxPkhlbGxvPC9oMT48cD5Xb3JsZDwvcD4=\n";
        let email = parse_eml(raw);
        assert_eq!(email.body_type, "html");
        let words: Vec<_> = email.body.split_whitespace().collect();
        assert_eq!(words, vec!["Hello", "World"]);
    }

    #[test]
    fn test_malformed_headers_degrade_to_body_only() {
        let raw = "this is not a header line\nSubject: nope\n\nstill text";
        let email = parse_eml(raw);
        assert!(!email.headers_parsed);
        assert!(email.subject.is_none());
        assert!(email.body.starts_with("this is not a header line"));
    }

    #[test]
    fn test_msg_scan_prefers_utf16_and_skips_stream_names() {
        let mut data = OLE_SIGNATURE.to_vec();
        data.extend_from_slice(&[0u8; 8]);
        for s in ["Root Entry", "__substg1.0_0037001F", "Quarterly budget review"] {
            for unit in s.encode_utf16() {
                data.extend_from_slice(&unit.to_le_bytes());
            }
            data.extend_from_slice(&[0, 0, 0xFF, 0xFF]);
        }
        let text = scan_msg(&data).unwrap();
        assert_eq!(text, "Quarterly budget review");
    }

    #[test]
    fn test_msg_without_text_is_decode_failure() {
        let err = scan_msg(&[0xD0, 0xCF, 0x11, 0xE0, 0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, ExtractionError::DecodeFailure(_)));
    }

    #[tokio::test]
    async fn test_adapter_subject_then_body() {
        let result = EmailAdapter
            .extract(SIMPLE.as_bytes(), "offsite.eml", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(
            result.text,
            "Team offsite planning notes\n\nLet's meet on Friday."
        );
        assert_eq!(result.metadata["body_type"], "plain");
    }

    #[tokio::test]
    async fn test_adapter_empty_message_is_empty_content() {
        let err = EmailAdapter
            .extract(b"Subject: \n\n   \n", "blank.eml", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, ExtractionError::EmptyContent);
    }
}
