//! Filename sanitisation.
//!
//! Maps an arbitrary candidate string to a name that is valid on common
//! filesystems: no path separators, no reserved or control characters, no
//! leading/trailing dots, bounded length, original extension kept verbatim.

use crate::defaults::{FALLBACK_STEM, FILENAME_MAX_BYTES, NAME_MAX_CHARS, NAME_SEPARATOR};

/// Characters that are invalid in a file name on at least one common
/// filesystem.
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Device names Windows refuses as file stems regardless of extension.
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilenameSanitizer {
    max_stem_chars: usize,
    max_bytes: usize,
}

impl Default for FilenameSanitizer {
    fn default() -> Self {
        Self {
            max_stem_chars: NAME_MAX_CHARS,
            max_bytes: FILENAME_MAX_BYTES,
        }
    }
}

impl FilenameSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_stem_chars(mut self, max_stem_chars: usize) -> Self {
        self.max_stem_chars = max_stem_chars.max(1);
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Produce a complete, safe file name (`stem.ext`) for a candidate.
    ///
    /// `extension` is the original extension without the dot and is never
    /// altered. When the candidate sanitises to nothing, `original_stem` is
    /// sanitised instead, then [`FALLBACK_STEM`].
    pub fn sanitize(&self, candidate: &str, extension: &str, original_stem: &str) -> String {
        let mut stem = self.sanitize_stem(candidate, extension);
        if stem.is_empty() {
            stem = self.sanitize_stem(original_stem, extension);
        }
        if stem.is_empty() {
            stem = self.fit_stem(FALLBACK_STEM, "", extension);
        }
        compose(&stem, extension)
    }

    /// Sanitise a stem and fit it into the length budget for `extension`.
    /// May return an empty string.
    pub fn sanitize_stem(&self, candidate: &str, extension: &str) -> String {
        let mut stem = String::with_capacity(candidate.len());
        for c in candidate.chars() {
            let mapped = if RESERVED_CHARS.contains(&c) || c.is_control() || c.is_whitespace() {
                NAME_SEPARATOR
            } else {
                c
            };
            if mapped == NAME_SEPARATOR && stem.ends_with(NAME_SEPARATOR) {
                continue;
            }
            stem.push(mapped);
        }

        let fitted = self.cap_stem(trim_edges(&stem), extension);
        if !is_device_name(&fitted) {
            return fitted;
        }

        // The device check runs on the final cut, which may have produced one.
        // Windows matches the part before the first dot, so mark that part.
        let (base, rest) = fitted.split_at(fitted.find('.').unwrap_or(fitted.len()));
        let marked = self.cap_stem(&format!("{}{}file{}", base, NAME_SEPARATOR, rest), extension);
        if !is_device_name(&marked) {
            return marked;
        }
        let mut shortened = base.to_string();
        shortened.pop();
        trim_edges(&format!("{}{}", shortened, rest)).to_string()
    }

    /// Apply the char cap, then the byte budget.
    fn cap_stem(&self, stem: &str, extension: &str) -> String {
        let capped: String = stem.chars().take(self.max_stem_chars).collect();
        self.fit_stem(trim_edges(&capped), "", extension)
    }

    /// Shorten `stem` until `stem + suffix + "." + extension` fits the byte
    /// budget, and return `stem + suffix`.
    ///
    /// Used by collision resolution to append `-N` without overflowing.
    pub fn fit_stem(&self, stem: &str, suffix: &str, extension: &str) -> String {
        let ext_bytes = if extension.is_empty() {
            0
        } else {
            extension.len() + 1
        };
        let budget = self
            .max_bytes
            .saturating_sub(ext_bytes)
            .saturating_sub(suffix.len());
        let cut = floor_char_boundary(stem, budget);
        let mut shortened = trim_edges(&stem[..cut]).to_string();
        shortened.push_str(suffix);
        shortened
    }
}

/// Join a stem and an extension.
pub fn compose(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c: char| c == '.' || c == NAME_SEPARATOR || c.is_whitespace())
}

fn is_device_name(stem: &str) -> bool {
    let base = stem.split('.').next().unwrap_or(stem);
    WINDOWS_DEVICE_NAMES
        .iter()
        .any(|d| d.eq_ignore_ascii_case(base))
}

/// Largest index `<= max` that lies on a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
