//! Error types for retitle.
//!
//! Two layers: [`Error`] is for run-level failures (the target directory is
//! gone, configuration is broken). Everything that can go wrong with a single
//! file is a [`FileError`], which is attached to that file's outcome and never
//! aborts the run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using retitle's run-level Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Run-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The target directory is missing or unreadable. Fatal for the run.
    #[error("Directory unavailable: {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

/// Failure to turn a file's bytes into text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The file could not be read (missing, permission denied, ...).
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// An external converter or parser failed, is missing, or timed out.
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// Extraction succeeded but produced no visible text.
    #[error("no extractable content")]
    EmptyContent,

    /// Bytes could not be decoded into text at all.
    #[error("decode failure: {0}")]
    DecodeFailure(String),
}

impl ExtractionError {
    pub fn variant(&self) -> &'static str {
        match self {
            Self::IoFailure(_) => "IOFailure",
            Self::ConversionFailed(_) => "ConversionFailed",
            Self::EmptyContent => "EmptyContent",
            Self::DecodeFailure(_) => "DecodeFailure",
        }
    }
}

impl From<std::io::Error> for ExtractionError {
    fn from(e: std::io::Error) -> Self {
        ExtractionError::IoFailure(e.to_string())
    }
}

/// Failure of the external naming service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameGenerationFailure {
    #[error("naming service timed out after {0:?}")]
    Timeout(Duration),

    #[error("naming service returned an empty name")]
    EmptyResult,

    #[error("naming service unavailable: {0}")]
    Unavailable(String),
}

impl NameGenerationFailure {
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "Timeout",
            Self::EmptyResult => "EmptyResult",
            Self::Unavailable(_) => "Unavailable",
        }
    }
}

/// Failure of the final filesystem rename.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenameIoError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rename crosses devices: {0}")]
    CrossDevice(String),

    #[error("target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("rename failed: {0}")]
    Other(String),
}

impl RenameIoError {
    pub fn variant(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "PermissionDenied",
            Self::CrossDevice(_) => "CrossDevice",
            Self::TargetExists(_) => "TargetExists",
            Self::Other(_) => "Other",
        }
    }

    /// Classify an I/O error raised by a rename of `target`.
    pub fn from_io(e: &std::io::Error, target: &std::path::Path) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied(e.to_string()),
            ErrorKind::CrossesDevices => Self::CrossDevice(e.to_string()),
            ErrorKind::AlreadyExists => Self::TargetExists(target.to_path_buf()),
            _ => Self::Other(e.to_string()),
        }
    }
}

/// Everything that can go wrong for one file. Attached to the file's
/// outcome; the run always continues with the next file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    NameGeneration(#[from] NameGenerationFailure),

    #[error("no free name for '{stem}' after {attempts} attempts")]
    CollisionResolutionExhausted { stem: String, attempts: u32 },

    #[error(transparent)]
    Rename(#[from] RenameIoError),

    #[error("plan is in state {from} and cannot move to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("run cancelled before this file was processed")]
    Cancelled,
}

impl FileError {
    /// Stable `Family::Variant` string used in report lines.
    pub fn kind(&self) -> String {
        match self {
            Self::Extraction(e) => format!("ExtractionError::{}", e.variant()),
            Self::NameGeneration(e) => format!("NameGenerationFailure::{}", e.variant()),
            Self::CollisionResolutionExhausted { .. } => "CollisionResolutionExhausted".into(),
            Self::Rename(e) => format!("RenameIOError::{}", e.variant()),
            Self::InvalidTransition { .. } => "InvalidTransition".into(),
            Self::Cancelled => "Cancelled".into(),
        }
    }
}
