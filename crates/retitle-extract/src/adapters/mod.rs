//! Extraction adapter implementations, one per extraction strategy.

pub mod email;
pub mod exif;
pub mod image;
pub mod markup;
pub mod office_convert;
pub mod pdf_text;
pub mod spreadsheet;
pub mod text_native;

pub use email::EmailAdapter;
pub use image::ImageAdapter;
pub use markup::MarkupAdapter;
pub use office_convert::OfficeConvertAdapter;
pub use pdf_text::PdfTextAdapter;
pub use spreadsheet::SpreadsheetAdapter;
pub use text_native::TextNativeAdapter;
