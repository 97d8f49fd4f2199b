//! Run-scoped record of claimed names, and collision resolution against it.
//!
//! One [`DirectoryNamespace`] exists per run. It is owned by the committing
//! task and only mutated through `&mut`, so read-check-claim is a single
//! critical section without a lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use retitle_core::defaults::COLLISION_MAX_ATTEMPTS;
use retitle_core::{compose, FileError, FilenameSanitizer};

use crate::scan::DirectoryScan;

/// Who holds a name in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Holder {
    /// A file of the current batch, by its source path.
    Batch(PathBuf),
    /// Anything the run must never touch.
    Foreign,
}

/// Names in use in one directory during one run.
///
/// Keys are compared case-insensitively so that a run never produces two
/// names that collide on a case-insensitive filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryNamespace {
    directory: PathBuf,
    claims: HashMap<String, Holder>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl DirectoryNamespace {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            claims: HashMap::new(),
        }
    }

    /// Seed the namespace with every name present at scan time.
    pub fn from_scan(scan: &DirectoryScan) -> Self {
        let mut namespace = Self::new(&scan.directory);
        for name in &scan.others {
            namespace.claims.insert(key(name), Holder::Foreign);
        }
        for path in &scan.files {
            if let Some(name) = path.file_name() {
                namespace
                    .claims
                    .insert(key(&name.to_string_lossy()), Holder::Batch(path.clone()));
            }
        }
        namespace
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claims.contains_key(&key(name))
    }

    /// Whether `owner` may take `name`.
    ///
    /// A file may keep its own name. Names not recorded here are checked on
    /// disk, so entries created after the scan are never overwritten.
    pub async fn is_available(&self, name: &str, owner: &Path) -> bool {
        match self.claims.get(&key(name)) {
            Some(Holder::Batch(path)) => path == owner,
            Some(Holder::Foreign) => false,
            None => tokio::fs::symlink_metadata(self.directory.join(name))
                .await
                .is_err(),
        }
    }

    pub fn claim(&mut self, name: &str, owner: &Path) {
        self.claims
            .insert(key(name), Holder::Batch(owner.to_path_buf()));
    }

    /// Record a name as permanently taken by something outside the batch.
    pub fn occupy(&mut self, name: &str) {
        self.claims.insert(key(name), Holder::Foreign);
    }

    /// Give up `name` if `owner` holds it.
    pub fn release(&mut self, name: &str, owner: &Path) {
        let k = key(name);
        if matches!(self.claims.get(&k), Some(Holder::Batch(p)) if p == owner) {
            self.claims.remove(&k);
        }
    }

    /// Update after `owner` was renamed from `old_name` to `new_name`.
    pub fn record_rename(&mut self, old_name: &str, new_name: &str, owner: &Path, new_path: &Path) {
        if key(old_name) != key(new_name) {
            self.release(old_name, owner);
        }
        self.claims
            .insert(key(new_name), Holder::Batch(new_path.to_path_buf()));
    }
}

/// Picks a unique final name, appending `-1`, `-2`, ... on collision.
#[derive(Debug, Clone, Copy)]
pub struct CollisionResolver {
    sanitizer: FilenameSanitizer,
    max_attempts: u32,
}

impl Default for CollisionResolver {
    fn default() -> Self {
        Self {
            sanitizer: FilenameSanitizer::default(),
            max_attempts: COLLISION_MAX_ATTEMPTS,
        }
    }
}

impl CollisionResolver {
    pub fn new(sanitizer: FilenameSanitizer) -> Self {
        Self {
            sanitizer,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Claim and return a free name for `owner` derived from `sanitized_name`.
    ///
    /// The unsuffixed name is tried first, then up to `max_attempts`
    /// suffixes. Suffixed stems are shortened so the name stays within the
    /// byte budget.
    #[instrument(skip(self, namespace), fields(subsystem = "rename", component = "resolver", op = "resolve"))]
    pub async fn resolve(
        &self,
        namespace: &mut DirectoryNamespace,
        sanitized_name: &str,
        extension: &str,
        owner: &Path,
    ) -> Result<String, FileError> {
        if namespace.is_available(sanitized_name, owner).await {
            namespace.claim(sanitized_name, owner);
            return Ok(sanitized_name.to_string());
        }

        let stem = split_stem(sanitized_name, extension);
        for n in 1..=self.max_attempts {
            let candidate = compose(
                &self.sanitizer.fit_stem(stem, &format!("-{}", n), extension),
                extension,
            );
            if namespace.is_available(&candidate, owner).await {
                debug!(suffix = n, name = %candidate, "Resolved collision");
                namespace.claim(&candidate, owner);
                return Ok(candidate);
            }
        }

        Err(FileError::CollisionResolutionExhausted {
            stem: stem.to_string(),
            attempts: self.max_attempts,
        })
    }
}

/// Stem of `name` when it ends in `.extension`.
fn split_stem<'a>(name: &'a str, extension: &str) -> &'a str {
    if extension.is_empty() {
        return name;
    }
    name.strip_suffix(extension)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(name)
    }

    #[tokio::test]
    async fn test_first_seen_wins_unsuffixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut ns = DirectoryNamespace::new(dir.path());
        let resolver = CollisionResolver::default();

        let a = batch_path(dir.path(), "a.pdf");
        let b = batch_path(dir.path(), "b.pdf");
        let first = resolver.resolve(&mut ns, "Invoice.pdf", "pdf", &a).await.unwrap();
        let second = resolver.resolve(&mut ns, "Invoice.pdf", "pdf", &b).await.unwrap();
        assert_eq!(first, "Invoice.pdf");
        assert_eq!(second, "Invoice-1.pdf");
    }

    #[tokio::test]
    async fn test_file_may_keep_its_own_name() {
        let dir = tempfile::tempdir().unwrap();
        let own = dir.path().join("Invoice.pdf");
        std::fs::write(&own, "x").unwrap();
        let scan = DirectoryScan {
            directory: dir.path().to_path_buf(),
            files: vec![own.clone()],
            others: vec![],
        };
        let mut ns = DirectoryNamespace::from_scan(&scan);
        let name = CollisionResolver::default()
            .resolve(&mut ns, "Invoice.pdf", "pdf", &own)
            .await
            .unwrap();
        assert_eq!(name, "Invoice.pdf");
    }

    #[tokio::test]
    async fn test_collisions_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let scan = DirectoryScan {
            directory: dir.path().to_path_buf(),
            files: vec![],
            others: vec!["INVOICE.pdf".to_string()],
        };
        let mut ns = DirectoryNamespace::from_scan(&scan);
        let name = CollisionResolver::default()
            .resolve(&mut ns, "invoice.pdf", "pdf", &dir.path().join("x.pdf"))
            .await
            .unwrap();
        assert_eq!(name, "invoice-1.pdf");
    }

    #[tokio::test]
    async fn test_unrecorded_file_on_disk_is_never_claimed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Notes.txt"), "appeared after scan").unwrap();
        let mut ns = DirectoryNamespace::new(dir.path());
        let name = CollisionResolver::default()
            .resolve(&mut ns, "Notes.txt", "txt", &dir.path().join("a.txt"))
            .await
            .unwrap();
        assert_eq!(name, "Notes-1.txt");
    }

    #[tokio::test]
    async fn test_exhaustion_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut ns = DirectoryNamespace::new(dir.path());
        for name in ["Report.txt", "Report-1.txt", "Report-2.txt"] {
            ns.occupy(name);
        }
        let err = CollisionResolver::default()
            .with_max_attempts(2)
            .resolve(&mut ns, "Report.txt", "txt", &dir.path().join("a.txt"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FileError::CollisionResolutionExhausted {
                stem: "Report".to_string(),
                attempts: 2
            }
        );
    }

    #[tokio::test]
    async fn test_suffix_fits_byte_budget() {
        let dir = tempfile::tempdir().unwrap();
        let sanitizer = FilenameSanitizer::new().with_max_bytes(12);
        let mut ns = DirectoryNamespace::new(dir.path());
        ns.occupy("abcdefgh.txt");
        let name = CollisionResolver::new(sanitizer)
            .resolve(&mut ns, "abcdefgh.txt", "txt", &dir.path().join("z.txt"))
            .await
            .unwrap();
        assert_eq!(name, "abcdef-1.txt");
        assert!(name.len() <= 12);
    }

    #[test]
    fn test_record_rename_moves_claim() {
        let dir = Path::new("/d");
        let src = dir.join("a.txt");
        let dst = dir.join("Summary.txt");
        let mut ns = DirectoryNamespace::new(dir);
        ns.claim("a.txt", &src);
        ns.claim("Summary.txt", &src);
        ns.record_rename("a.txt", "Summary.txt", &src, &dst);
        assert!(!ns.is_claimed("a.txt"));
        assert!(ns.is_claimed("summary.txt"));
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_release_only_by_owner() {
        let mut ns = DirectoryNamespace::new("/d");
        ns.claim("x.txt", Path::new("/d/a.txt"));
        ns.release("x.txt", Path::new("/d/b.txt"));
        assert!(ns.is_claimed("x.txt"));
        ns.release("x.txt", Path::new("/d/a.txt"));
        assert!(!ns.is_claimed("x.txt"));
    }

    #[test]
    fn test_split_stem() {
        assert_eq!(split_stem("Invoice.pdf", "pdf"), "Invoice");
        assert_eq!(split_stem("archive.tar.GZ", "GZ"), "archive.tar");
        assert_eq!(split_stem("README", ""), "README");
    }
}
