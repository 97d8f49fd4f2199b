//! Directory enumeration.

use std::path::{Path, PathBuf};

use tracing::debug;

use retitle_core::{Error, Result};

/// Snapshot of a directory's immediate entries.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScan {
    pub directory: PathBuf,
    /// Regular files, sorted by file name. This is the processing order.
    pub files: Vec<PathBuf>,
    /// Names of every other entry (subdirectories, symlinks, sockets).
    /// They are never renamed but still occupy their names.
    pub others: Vec<String>,
}

fn unavailable(path: &Path, source: std::io::Error) -> Error {
    Error::DirectoryUnavailable {
        path: path.to_path_buf(),
        source,
    }
}

/// List the immediate entries of `directory`. Does not recurse and does not
/// follow symlinks.
///
/// A missing or unreadable directory is [`Error::DirectoryUnavailable`],
/// the only run-fatal error.
pub async fn scan_directory(directory: &Path) -> Result<DirectoryScan> {
    let meta = tokio::fs::metadata(directory)
        .await
        .map_err(|e| unavailable(directory, e))?;
    if !meta.is_dir() {
        return Err(unavailable(
            directory,
            std::io::Error::other("not a directory"),
        ));
    }

    let mut entries = tokio::fs::read_dir(directory)
        .await
        .map_err(|e| unavailable(directory, e))?;

    let mut scan = DirectoryScan {
        directory: directory.to_path_buf(),
        ..Default::default()
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| unavailable(directory, e))?
    {
        let file_type = match entry.file_type().await {
            Ok(t) => t,
            Err(e) => {
                debug!(entry = ?entry.path(), error = %e, "Skipping entry with unreadable type");
                scan.others.push(entry.file_name().to_string_lossy().into_owned());
                continue;
            }
        };
        if file_type.is_file() {
            scan.files.push(entry.path());
        } else {
            scan.others.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    scan.files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!(
        directory = %directory.display(),
        files = scan.files.len(),
        others = scan.others.len(),
        "Scanned directory"
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_lists_files_sorted_and_keeps_other_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("deep.txt"), "x").unwrap();

        let scan = scan_directory(dir.path()).await.unwrap();
        let names: Vec<_> = scan
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(scan.others, vec!["nested".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_not_batch_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt")).unwrap();

        let scan = scan_directory(dir.path()).await.unwrap();
        assert_eq!(scan.files.len(), 1);
        assert_eq!(scan.others, vec!["link.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_directory(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, Error::DirectoryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_file_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        let err = scan_directory(&file).await.unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
