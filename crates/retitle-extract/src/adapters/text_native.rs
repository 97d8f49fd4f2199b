//! TextNative extraction adapter: plain text and markdown.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use retitle_core::{ExtractionAdapter, ExtractionError, ExtractionResult, ExtractionStrategy, Result};

/// Text decoded from raw bytes along with the encoding that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
}

/// Decode bytes with the fallback chain: BOM-declared encoding, strict
/// UTF-8, then a byte-per-char ISO-8859-1 decode. Never fails.
pub fn decode_text(data: &[u8]) -> DecodedText {
    if let Some(rest) = data.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return DecodedText {
            text: String::from_utf8_lossy(rest).into_owned(),
            encoding: "utf-8-bom",
        };
    }
    if let Some(rest) = data.strip_prefix(&[0xFF, 0xFE]) {
        return DecodedText {
            text: decode_utf16(rest, u16::from_le_bytes),
            encoding: "utf-16le",
        };
    }
    if let Some(rest) = data.strip_prefix(&[0xFE, 0xFF]) {
        return DecodedText {
            text: decode_utf16(rest, u16::from_be_bytes),
            encoding: "utf-16be",
        };
    }
    match std::str::from_utf8(data) {
        Ok(text) => DecodedText {
            text: text.to_string(),
            encoding: "utf-8",
        },
        Err(_) => DecodedText {
            text: data.iter().map(|&b| b as char).collect(),
            encoding: "iso-8859-1",
        },
    }
}

/// Decode UTF-16 code units, replacing unpaired surrogates. A trailing odd
/// byte is dropped.
pub(crate) fn decode_utf16(data: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units = data.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Adapter for plain text files (`txt`, `md`).
///
/// Decoding never fails; a file that decodes to nothing visible is
/// `EmptyContent`.
pub struct TextNativeAdapter;

#[async_trait]
impl ExtractionAdapter for TextNativeAdapter {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::TextNative
    }

    async fn extract(
        &self,
        data: &[u8],
        _filename: &str,
        _config: &JsonValue,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        let decoded = decode_text(data);
        if decoded.text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }
        let char_count = decoded.text.chars().count();
        let line_count = decoded.text.lines().count();

        Ok(ExtractionResult::text(
            decoded.text,
            serde_json::json!({
                "encoding": decoded.encoding,
                "char_count": char_count,
                "line_count": line_count,
            }),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true) // No external dependencies
    }

    fn name(&self) -> &str {
        "text_native"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_native_extraction() {
        let adapter = TextNativeAdapter;
        let result = adapter
            .extract(b"Hello, world!\nLine two.", "test.txt", &serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(result.text, "Hello, world!\nLine two.");
        assert_eq!(result.metadata["encoding"], "utf-8");
        assert_eq!(result.metadata["line_count"], 2);
        assert!(!result.is_description);
    }

    #[tokio::test]
    async fn test_blank_file_is_empty_content() {
        let adapter = TextNativeAdapter;
        for data in [&b""[..], &b"   \n\t\n"[..], &b"\xEF\xBB\xBF"[..]] {
            let err = adapter
                .extract(data, "blank.txt", &serde_json::json!({}))
                .await
                .unwrap_err();
            assert_eq!(err, ExtractionError::EmptyContent);
        }
    }

    #[test]
    fn test_decode_utf8_bom() {
        let decoded = decode_text(b"\xEF\xBB\xBFcaf\xC3\xA9");
        assert_eq!(decoded.text, "café");
        assert_eq!(decoded.encoding, "utf-8-bom");
    }

    #[test]
    fn test_decode_utf16le_and_be() {
        let le = [0xFF, 0xFE, b'H', 0, b'i', 0];
        assert_eq!(decode_text(&le).text, "Hi");
        assert_eq!(decode_text(&le).encoding, "utf-16le");
        let be = [0xFE, 0xFF, 0, b'H', 0, b'i'];
        assert_eq!(decode_text(&be).text, "Hi");
        assert_eq!(decode_text(&be).encoding, "utf-16be");
    }

    #[test]
    fn test_decode_invalid_utf8_falls_back_to_latin1() {
        // "café" in Windows-1252
        let decoded = decode_text(b"caf\xE9");
        assert_eq!(decoded.text, "café");
        assert_eq!(decoded.encoding, "iso-8859-1");
    }

    #[tokio::test]
    async fn test_health_check_always_true() {
        assert!(TextNativeAdapter.health_check().await.unwrap());
    }
}
