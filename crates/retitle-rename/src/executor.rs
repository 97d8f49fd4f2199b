//! Applies resolved plans to the filesystem without ever overwriting.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use retitle_core::{FileError, RenameIoError, RenamePlan};

use crate::namespace::{CollisionResolver, DirectoryNamespace};

/// What committing one plan did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The file now lives at this path.
    Renamed(PathBuf),
    /// The resolved name equals the current one.
    Unchanged,
    /// Dry run: the file would be renamed to this name.
    Planned(String),
}

/// Resolution rounds per plan: the first, plus one after losing a race.
const MAX_RESOLUTION_ROUNDS: u32 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct RenameExecutor {
    resolver: CollisionResolver,
    dry_run: bool,
}

impl RenameExecutor {
    pub fn new(resolver: CollisionResolver) -> Self {
        Self {
            resolver,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Resolve a sanitized plan against the namespace and rename the file.
    ///
    /// If the target appears between resolution and rename, the name is
    /// marked taken and resolution runs once more. The plan ends `Applied`,
    /// `Resolved` (dry run or unchanged), or `Failed`.
    #[instrument(skip(self, namespace, plan), fields(subsystem = "rename", component = "executor", op = "commit", file = %plan.source_path().display()))]
    pub async fn commit(
        &self,
        namespace: &mut DirectoryNamespace,
        plan: &mut RenamePlan,
        extension: &str,
    ) -> Result<CommitOutcome, FileError> {
        let result = self.commit_inner(namespace, plan, extension).await;
        if let Err(e) = &result {
            // Only fails if the plan is already terminal, which commit never leaves it in.
            let _ = plan.mark_failed(e.clone());
        }
        result
    }

    async fn commit_inner(
        &self,
        namespace: &mut DirectoryNamespace,
        plan: &mut RenamePlan,
        extension: &str,
    ) -> Result<CommitOutcome, FileError> {
        let source = plan.source_path().to_path_buf();
        let sanitized = plan
            .sanitized_name()
            .ok_or(FileError::InvalidTransition {
                from: "pending",
                to: "resolved",
            })?
            .to_string();
        let old_name = file_name(&source);

        let mut round = 1;
        loop {
            let final_name = self
                .resolver
                .resolve(namespace, &sanitized, extension, &source)
                .await?;
            plan.mark_resolved(final_name.clone())?;

            if final_name == old_name {
                return Ok(CommitOutcome::Unchanged);
            }
            if self.dry_run {
                return Ok(CommitOutcome::Planned(final_name));
            }

            let target = plan
                .target_path()
                .unwrap_or_else(|| namespace.directory().join(&final_name));
            match apply_rename(&source, &target).await {
                Ok(()) => {
                    plan.mark_applied()?;
                    namespace.record_rename(&old_name, &final_name, &source, &target);
                    info!(from = %old_name, to = %final_name, "Renamed file");
                    return Ok(CommitOutcome::Renamed(target));
                }
                Err(RenameIoError::TargetExists(path)) if round < MAX_RESOLUTION_ROUNDS => {
                    warn!(target = %path.display(), "Target appeared before rename, resolving again");
                    namespace.occupy(&final_name);
                    plan.reopen()?;
                    round += 1;
                }
                Err(e) => {
                    namespace.release(&final_name, &source);
                    return Err(e.into());
                }
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Rename `source` to `target`, refusing to replace any existing entry.
///
/// The no-replace check is made by the kernel in the same call as the
/// rename, so a file created at `target` by another process is never
/// clobbered. The one exception is a target that is `source` itself (a
/// case-only rename on a case-insensitive filesystem), which is renamed
/// in place.
pub async fn apply_rename(source: &Path, target: &Path) -> Result<(), RenameIoError> {
    if source == target {
        return Ok(());
    }

    match tokio::fs::symlink_metadata(target).await {
        Ok(existing) => {
            let is_self = match tokio::fs::symlink_metadata(source).await {
                Ok(own) => same_file(&own, &existing),
                Err(e) => return Err(RenameIoError::from_io(&e, source)),
            };
            if !is_self {
                return Err(RenameIoError::TargetExists(target.to_path_buf()));
            }
            debug!(target = %target.display(), "Target is the source itself, case-only rename");
            return tokio::fs::rename(source, target)
                .await
                .map_err(|e| RenameIoError::from_io(&e, target));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(RenameIoError::from_io(&e, target)),
    }

    let (src, dst) = (source.to_path_buf(), target.to_path_buf());
    tokio::task::spawn_blocking(move || rename_no_replace(&src, &dst))
        .await
        .map_err(|e| RenameIoError::Other(format!("rename task failed: {}", e)))?
        .map_err(|e| RenameIoError::from_io(&e, target))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn rename_no_replace(source: &Path, target: &Path) -> std::io::Result<()> {
    use rustix::fs::{renameat_with, RenameFlags, CWD};
    use rustix::io::Errno;

    match renameat_with(CWD, source, CWD, target, RenameFlags::NOREPLACE) {
        Ok(()) => Ok(()),
        // Kernel or filesystem without RENAME_NOREPLACE
        Err(e) if e == Errno::INVAL || e == Errno::NOSYS => link_then_unlink(source, target),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn rename_no_replace(source: &Path, target: &Path) -> std::io::Result<()> {
    link_then_unlink(source, target)
}

/// `link(2)` fails with `EEXIST` if the target exists, so this never
/// replaces anything. The new link is removed again if the old name
/// cannot be.
fn link_then_unlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::hard_link(source, target)?;
    if let Err(e) = std::fs::remove_file(source) {
        let _ = std::fs::remove_file(target);
        return Err(e);
    }
    Ok(())
}

#[cfg(unix)]
fn same_file(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &std::fs::Metadata, _b: &std::fs::Metadata) -> bool {
    false
}
