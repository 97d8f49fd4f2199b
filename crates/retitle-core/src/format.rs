//! Format detection: file extension → format family → extraction strategy.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Every extension the pipeline accepts, lowercase, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "docx", "doc", "odt", "rtf", "md", "xlsx", "csv", "tsv", "pptx", "ppt", "eml", "msg", "epub",
    "html", "xml", "pdf", "txt", "jpg", "jpeg", "png", "heic",
];

/// Format family of a file. Derived from the extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    OfficeDocument,
    Spreadsheet,
    Presentation,
    Email,
    Ebook,
    WebPage,
    Pdf,
    PlainText,
    Image,
    /// Not in the supported set. Excluded before extraction.
    Unsupported,
}

/// How text is pulled out of a format family.
///
/// Several families can share one strategy (pandoc handles word processors,
/// slides, and ebooks alike); each family maps to exactly one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// External document converter (pandoc / LibreOffice)
    OfficeConvert,
    /// Header + first rows of a sheet or delimited file
    Spreadsheet,
    /// Subject + body of a mail message
    Email,
    /// Visible text of HTML/XML
    Markup,
    /// PDF text layer via pdftotext, OCR fallback
    PdfText,
    /// Direct decode with encoding fallback
    TextNative,
    /// OCR, then vision or metadata description
    Image,
}

impl Format {
    /// Classify a lowercase or mixed-case extension (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "docx" | "doc" | "odt" | "rtf" => Self::OfficeDocument,
            "xlsx" | "csv" | "tsv" => Self::Spreadsheet,
            "pptx" | "ppt" => Self::Presentation,
            "eml" | "msg" => Self::Email,
            "epub" => Self::Ebook,
            "html" | "xml" => Self::WebPage,
            "pdf" => Self::Pdf,
            "txt" | "md" => Self::PlainText,
            "jpg" | "jpeg" | "png" | "heic" => Self::Image,
            _ => Self::Unsupported,
        }
    }

    /// Classify a path by its extension. No extension means unsupported.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unsupported)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    /// Static strategy table. `None` only for `Unsupported`.
    pub fn strategy(&self) -> Option<ExtractionStrategy> {
        let strategy = match self {
            Self::OfficeDocument | Self::Presentation | Self::Ebook => {
                ExtractionStrategy::OfficeConvert
            }
            Self::Spreadsheet => ExtractionStrategy::Spreadsheet,
            Self::Email => ExtractionStrategy::Email,
            Self::WebPage => ExtractionStrategy::Markup,
            Self::Pdf => ExtractionStrategy::PdfText,
            Self::PlainText => ExtractionStrategy::TextNative,
            Self::Image => ExtractionStrategy::Image,
            Self::Unsupported => return None,
        };
        Some(strategy)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OfficeDocument => "office-document",
            Self::Spreadsheet => "spreadsheet",
            Self::Presentation => "presentation",
            Self::Email => "email",
            Self::Ebook => "ebook",
            Self::WebPage => "web-page",
            Self::Pdf => "pdf",
            Self::PlainText => "plain-text",
            Self::Image => "image",
            Self::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OfficeConvert => write!(f, "office_convert"),
            Self::Spreadsheet => write!(f, "spreadsheet"),
            Self::Email => write!(f, "email"),
            Self::Markup => write!(f, "markup"),
            Self::PdfText => write!(f, "pdf_text"),
            Self::TextNative => write!(f, "text_native"),
            Self::Image => write!(f, "image"),
        }
    }
}

impl std::str::FromStr for ExtractionStrategy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "office_convert" | "officeconvert" | "pandoc" => Ok(Self::OfficeConvert),
            "spreadsheet" => Ok(Self::Spreadsheet),
            "email" | "mail" => Ok(Self::Email),
            "markup" | "html" => Ok(Self::Markup),
            "pdf_text" | "pdftext" => Ok(Self::PdfText),
            "text_native" | "textnative" => Ok(Self::TextNative),
            "image" | "vision" => Ok(Self::Image),
            _ => Err(format!("Invalid extraction strategy: {}", s)),
        }
    }
}

/// Guess the format family from magic bytes.
///
/// Only binary containers carry signatures, so text formats return `None`.
/// Zip-based office files are indistinguishable from each other here and
/// are reported as `OfficeDocument`.
pub fn sniff_format(data: &[u8]) -> Option<Format> {
    let kind = infer::get(data)?;
    let mime = kind.mime_type();
    if mime == "application/pdf" {
        return Some(Format::Pdf);
    }
    if mime.starts_with("image/") {
        return Some(Format::Image);
    }
    if mime == "application/epub+zip" {
        return Some(Format::Ebook);
    }
    if mime.contains("spreadsheetml") || mime.contains("ms-excel") {
        return Some(Format::Spreadsheet);
    }
    if mime.contains("presentationml") || mime.contains("ms-powerpoint") {
        return Some(Format::Presentation);
    }
    if mime.contains("wordprocessingml")
        || mime.contains("msword")
        || mime.contains("opendocument.text")
        || mime == "application/rtf"
        || mime == "application/zip"
    {
        return Some(Format::OfficeDocument);
    }
    None
}

/// Whether a sniffed signature is compatible with the extension's family.
///
/// Zip and OLE containers are shared by several families, so only clear
/// contradictions (a PNG named `.pdf`) count as mismatches.
pub fn signature_matches(declared: Format, sniffed: Format) -> bool {
    use Format::*;
    if declared == sniffed {
        return true;
    }
    let container_family = |f: Format| {
        matches!(
            f,
            OfficeDocument | Spreadsheet | Presentation | Ebook | Email
        )
    };
    container_family(declared) && container_family(sniffed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_extension_maps_to_a_family() {
        for ext in SUPPORTED_EXTENSIONS {
            let format = Format::from_extension(ext);
            assert!(format.is_supported(), "{} should be supported", ext);
            assert!(format.strategy().is_some());
        }
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(Format::from_extension("PDF"), Format::Pdf);
        assert_eq!(Format::from_extension("JpEg"), Format::Image);
        assert_eq!(
            Format::from_path(Path::new("/tmp/Report.DOCX")),
            Format::OfficeDocument
        );
    }

    #[test]
    fn test_unknown_and_missing_extensions_are_unsupported() {
        assert_eq!(Format::from_extension("zip"), Format::Unsupported);
        assert_eq!(Format::from_extension("xls"), Format::Unsupported);
        assert_eq!(Format::from_path(Path::new("Makefile")), Format::Unsupported);
        assert_eq!(Format::from_path(Path::new(".bashrc")), Format::Unsupported);
        assert_eq!(Format::Unsupported.strategy(), None);
    }

    #[test]
    fn test_family_assignment() {
        assert_eq!(Format::from_extension("rtf"), Format::OfficeDocument);
        assert_eq!(Format::from_extension("tsv"), Format::Spreadsheet);
        assert_eq!(Format::from_extension("ppt"), Format::Presentation);
        assert_eq!(Format::from_extension("msg"), Format::Email);
        assert_eq!(Format::from_extension("xml"), Format::WebPage);
        assert_eq!(Format::from_extension("md"), Format::PlainText);
        assert_eq!(Format::from_extension("heic"), Format::Image);
    }

    #[test]
    fn test_strategy_table() {
        assert_eq!(
            Format::Ebook.strategy(),
            Some(ExtractionStrategy::OfficeConvert)
        );
        assert_eq!(
            Format::Presentation.strategy(),
            Some(ExtractionStrategy::OfficeConvert)
        );
        assert_eq!(Format::WebPage.strategy(), Some(ExtractionStrategy::Markup));
        assert_eq!(Format::Pdf.strategy(), Some(ExtractionStrategy::PdfText));
    }

    #[test]
    fn test_strategy_display_round_trips_through_from_str() {
        for strategy in [
            ExtractionStrategy::OfficeConvert,
            ExtractionStrategy::Spreadsheet,
            ExtractionStrategy::Email,
            ExtractionStrategy::Markup,
            ExtractionStrategy::PdfText,
            ExtractionStrategy::TextNative,
            ExtractionStrategy::Image,
        ] {
            let parsed: ExtractionStrategy = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
        assert!("bogus".parse::<ExtractionStrategy>().is_err());
    }

    #[test]
    fn test_sniff_pdf_and_png() {
        assert_eq!(sniff_format(b"%PDF-1.7\n..."), Some(Format::Pdf));
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_format(&png), Some(Format::Image));
        assert_eq!(sniff_format(b"just some text"), None);
    }

    #[test]
    fn test_signature_matches_tolerates_shared_containers() {
        assert!(signature_matches(Format::Pdf, Format::Pdf));
        assert!(signature_matches(Format::Spreadsheet, Format::OfficeDocument));
        assert!(!signature_matches(Format::Pdf, Format::Image));
    }
}
