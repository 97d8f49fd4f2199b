//! # retitle-rename
//!
//! Turns a directory of files into content-derived names.
//!
//! A run scans the directory, analyses files concurrently (extract, normalize,
//! name, sanitize), then commits plans one at a time in scan order against a
//! single [`DirectoryNamespace`]: resolve collisions, rename without
//! overwriting. Per-file failures end up in the [`RunSummary`]; only an
//! unreadable directory fails the run.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use retitle_extract::ExtractionRegistry;
//! use retitle_inference::{LlmNameGenerator, OllamaBackend};
//! use retitle_rename::{RenameConfig, RenameRunner};
//!
//! let namer = LlmNameGenerator::new(Arc::new(OllamaBackend::from_env()));
//! let runner = RenameRunner::new(
//!     Arc::new(ExtractionRegistry::with_defaults(None)),
//!     Arc::new(namer),
//!     RenameConfig::from_env(),
//! );
//! let summary = runner.run(std::path::Path::new("./inbox")).await?;
//! for line in summary.report_lines() {
//!     println!("{}", line);
//! }
//! ```

pub mod executor;
pub mod namespace;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod scan;

pub use executor::{apply_rename, CommitOutcome, RenameExecutor};
pub use namespace::{CollisionResolver, DirectoryNamespace};
pub use pipeline::{Analyzed, AnalyzerSettings, FileAnalyzer};
pub use report::{FileOutcome, OutcomeStatus, RunSummary};
pub use runner::{CancelHandle, RenameConfig, RenameRunner};
pub use scan::{scan_directory, DirectoryScan};
