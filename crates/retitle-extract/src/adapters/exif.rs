//! Image metadata used to describe pictures that carry no readable text.
//!
//! EXIF is parsed with the kamadak-exif crate. Images without EXIF (most
//! PNGs) simply yield no fields; that is not an error.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use serde_json::{json, Value as JsonValue};

/// The few EXIF facts that make a useful description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Capture date as `YYYY-MM-DD`.
    pub captured: Option<String>,
    /// Camera make and model.
    pub camera: Option<String>,
    /// Pixel dimensions from EXIF, when present.
    pub dimensions: Option<(u32, u32)>,
}

impl ImageMetadata {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "captured": self.captured,
            "camera": self.camera,
            "width": self.dimensions.map(|d| d.0),
            "height": self.dimensions.map(|d| d.1),
        })
    }
}

/// Parse EXIF from image bytes. `None` if the container has no EXIF block.
pub fn extract_image_metadata(data: &[u8]) -> Option<ImageMetadata> {
    let mut cursor = Cursor::new(data);
    let exif = Reader::new().read_from_container(&mut cursor).ok()?;

    let get_string = |tag: Tag| {
        exif.get_field(tag, In::PRIMARY)
            .and_then(field_as_string)
            .filter(|s| !s.is_empty())
    };

    let captured = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .into_iter()
        .find_map(|tag| get_string(tag).and_then(|s| exif_date(&s)));

    let camera = match (get_string(Tag::Make), get_string(Tag::Model)) {
        // Many models already start with the make ("Canon EOS R5").
        (Some(make), Some(model)) if model.to_lowercase().starts_with(&make.to_lowercase()) => {
            Some(model)
        }
        (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
        (make, model) => make.or(model),
    };

    let dimensions = match (
        exif.get_field(Tag::PixelXDimension, In::PRIMARY).and_then(field_as_u32),
        exif.get_field(Tag::PixelYDimension, In::PRIMARY).and_then(field_as_u32),
    ) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    };

    Some(ImageMetadata {
        captured,
        camera,
        dimensions,
    })
}

/// `YYYY:MM:DD HH:MM:SS` → `YYYY-MM-DD`. Zeroed dates are treated as absent.
fn exif_date(value: &str) -> Option<String> {
    let date = value.split_whitespace().next()?;
    let parts: Vec<&str> = date.split(|c: char| c == ':' || c == '-').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.parse::<u32>().is_err()) {
        return None;
    }
    if parts.iter().all(|p| p.chars().all(|c| c == '0')) {
        return None;
    }
    Some(format!("{}-{}-{}", parts[0], parts[1], parts[2]))
}

/// Extracts a string value from an EXIF field.
fn field_as_string(field: &exif::Field) -> Option<String> {
    match &field.value {
        exif::Value::Ascii(ref vecs) => vecs
            .first()
            .map(|v| String::from_utf8_lossy(v).trim_matches(char::from(0)).trim().to_string()),
        _ => {
            let s = field.display_value().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s.trim().to_string())
            }
        }
    }
}

/// Extracts a u32 value from an EXIF field.
fn field_as_u32(field: &exif::Field) -> Option<u32> {
    match &field.value {
        exif::Value::Short(ref v) => v.first().map(|&n| n as u32),
        exif::Value::Long(ref v) => v.first().copied(),
        _ => None,
    }
}

/// Pixel dimensions read from the image header (PNG IHDR, JPEG SOFn).
pub fn detect_image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    // PNG: width at offset 16-19, height at offset 20-23
    if data.len() >= 24 && data.starts_with(b"\x89PNG\r\n\x1a\n") {
        let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
        let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
        return Some((width, height));
    }

    // JPEG: baseline (0xFFC0) or progressive (0xFFC2) frame header
    if data.starts_with(&[0xFF, 0xD8]) {
        for i in 0..data.len().saturating_sub(9) {
            if data[i] == 0xFF && matches!(data[i + 1], 0xC0 | 0xC2) {
                // height at offset +5, width at offset +7
                let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
                let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
                if width > 0 && height > 0 {
                    return Some((width, height));
                }
            }
        }
    }

    None
}

/// Deterministic one-line description, e.g. `PNG image 640x480` or
/// `JPEG image 4000x3000 captured 2024-06-01 with Canon EOS R5`.
pub fn describe_from_metadata(
    label: &str,
    dimensions: Option<(u32, u32)>,
    metadata: Option<&ImageMetadata>,
) -> String {
    let mut description = format!("{} image", label);
    if let Some((w, h)) = dimensions.or_else(|| metadata.and_then(|m| m.dimensions)) {
        description.push_str(&format!(" {}x{}", w, h));
    }
    if let Some(meta) = metadata {
        if let Some(date) = &meta.captured {
            description.push_str(&format!(" captured {}", date));
        }
        if let Some(camera) = &meta.camera {
            description.push_str(&format!(" with {}", camera));
        }
    }
    description
}
