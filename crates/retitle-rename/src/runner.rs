//! Run orchestration: bounded concurrent analysis, ordered commits.
//!
//! Files are analysed on a `JoinSet` capped by a semaphore. Results arrive in
//! any order and wait in a reorder buffer; the committing loop takes them
//! strictly in scan order, so collision tie-breaks do not depend on timing.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use retitle_core::defaults::{
    ENV_DRY_RUN, ENV_EXTRACT_TIMEOUT_SECS, ENV_GEN_TIMEOUT_SECS, ENV_MAX_CONCURRENT,
    ENV_NAME_MAX_CHARS, ENV_NAME_RETRIES, EXTRACTION_CMD_TIMEOUT_SECS, GEN_TIMEOUT_SECS,
    MAX_CONCURRENT, NAME_MAX_CHARS, NAME_MAX_RETRIES,
};
use retitle_core::{FileError, FileRecord, NameGenerator, Result};
use retitle_extract::ExtractionRegistry;

use crate::executor::{CommitOutcome, RenameExecutor};
use crate::namespace::{CollisionResolver, DirectoryNamespace};
use crate::pipeline::{Analyzed, AnalyzerSettings, FileAnalyzer};
use crate::report::{FileOutcome, OutcomeStatus, RunSummary};
use crate::scan::scan_directory;

/// Configuration for a rename run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameConfig {
    /// Files analysed at the same time.
    pub max_concurrent: usize,
    /// Plan and resolve names but rename nothing.
    pub dry_run: bool,
    pub name_max_chars: usize,
    pub name_retries: u32,
    pub gen_timeout: Duration,
    pub extract_timeout_secs: u64,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            max_concurrent: MAX_CONCURRENT,
            dry_run: false,
            name_max_chars: NAME_MAX_CHARS,
            name_retries: NAME_MAX_RETRIES,
            gen_timeout: Duration::from_secs(GEN_TIMEOUT_SECS),
            extract_timeout_secs: EXTRACTION_CMD_TIMEOUT_SECS,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl RenameConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let dry_run = std::env::var(ENV_DRY_RUN)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_concurrent = env_parse::<usize>(ENV_MAX_CONCURRENT)
            .unwrap_or(MAX_CONCURRENT)
            .max(1);

        let name_max_chars = env_parse::<usize>(ENV_NAME_MAX_CHARS)
            .unwrap_or(NAME_MAX_CHARS)
            .max(1);

        let name_retries = env_parse::<u32>(ENV_NAME_RETRIES)
            .unwrap_or(NAME_MAX_RETRIES)
            .min(1);

        let gen_timeout_secs = env_parse::<u64>(ENV_GEN_TIMEOUT_SECS)
            .unwrap_or(GEN_TIMEOUT_SECS)
            .max(1);

        let extract_timeout_secs = env_parse::<u64>(ENV_EXTRACT_TIMEOUT_SECS)
            .unwrap_or(EXTRACTION_CMD_TIMEOUT_SECS)
            .max(1);

        Self {
            max_concurrent,
            dry_run,
            name_max_chars,
            name_retries,
            gen_timeout: Duration::from_secs(gen_timeout_secs),
            extract_timeout_secs,
        }
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_name_max_chars(mut self, chars: usize) -> Self {
        self.name_max_chars = chars.max(1);
        self
    }

    /// Extra naming attempts after a failure, capped at one.
    pub fn with_name_retries(mut self, retries: u32) -> Self {
        self.name_retries = retries.min(1);
        self
    }

    pub fn with_gen_timeout(mut self, timeout: Duration) -> Self {
        self.gen_timeout = timeout;
        self
    }

    pub fn with_extract_timeout_secs(mut self, secs: u64) -> Self {
        self.extract_timeout_secs = secs.max(1);
        self
    }

    fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            name_max_chars: self.name_max_chars,
            gen_timeout: self.gen_timeout,
            name_retries: self.name_retries,
            extract_timeout_secs: self.extract_timeout_secs,
        }
    }
}

/// Stops a run from starting new files. Analyses already running finish and
/// are committed.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one analysis. `None` means it never started; `Err` carries a
/// panic or abort message.
type AnalysisSlot = Option<std::result::Result<Analyzed, String>>;

/// Result of one spawned analysis.
type TaskResult = (usize, AnalysisSlot);

/// Holds results that arrive out of order until every earlier file in
/// `order` has been handed out.
struct ReorderBuffer<T> {
    order: Vec<usize>,
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> ReorderBuffer<T> {
    fn new(order: Vec<usize>) -> Self {
        Self {
            order,
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    fn insert(&mut self, index: usize, item: T) {
        self.pending.insert(index, item);
    }

    /// Next result in order, if it has arrived.
    fn pop_ready(&mut self) -> Option<(usize, T)> {
        let index = *self.order.get(self.next)?;
        let item = self.pending.remove(&index)?;
        self.next += 1;
        Some((index, item))
    }
}

/// Slot for a task that ended without returning, so that later files are
/// still committed.
fn join_failure(e: &tokio::task::JoinError) -> AnalysisSlot {
    let message = if e.is_panic() {
        "analysis panicked"
    } else {
        "analysis task was aborted"
    };
    Some(Err(message.to_string()))
}

pub struct RenameRunner {
    analyzer: Arc<FileAnalyzer>,
    executor: RenameExecutor,
    config: RenameConfig,
    cancel: CancelHandle,
}

impl RenameRunner {
    pub fn new(
        registry: Arc<ExtractionRegistry>,
        namer: Arc<dyn NameGenerator>,
        config: RenameConfig,
    ) -> Self {
        let analyzer = FileAnalyzer::new(registry, namer).with_settings(config.analyzer_settings());
        let executor = RenameExecutor::new(CollisionResolver::new(analyzer.sanitizer()))
            .with_dry_run(config.dry_run);
        Self {
            analyzer: Arc::new(analyzer),
            executor,
            config,
            cancel: CancelHandle::new(),
        }
    }

    /// Use an externally owned cancel handle (e.g. wired to Ctrl-C).
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RenameConfig {
        &self.config
    }

    /// Rename every supported file directly inside `directory`.
    ///
    /// Only an unavailable directory is an error. Every per-file failure is
    /// recorded in the returned summary.
    #[instrument(skip(self), fields(subsystem = "rename", component = "runner", op = "run", run_id = tracing::field::Empty))]
    pub async fn run(&self, directory: &Path) -> Result<RunSummary> {
        let mut summary = RunSummary::new(directory, self.config.dry_run);
        tracing::Span::current().record("run_id", tracing::field::display(summary.run_id));

        let scan = scan_directory(directory).await.map_err(|e| {
            error!(directory = %directory.display(), error = %e, "Directory unavailable");
            e
        })?;
        let mut namespace = DirectoryNamespace::from_scan(&scan);

        info!(
            directory = %directory.display(),
            files = scan.files.len(),
            max_concurrent = self.config.max_concurrent,
            dry_run = self.config.dry_run,
            "Rename run started"
        );

        let mut slots: Vec<Option<FileOutcome>> = Vec::with_capacity(scan.files.len());
        let mut order = Vec::new();
        let mut task_index = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut tasks = tokio::task::JoinSet::new();

        for (index, path) in scan.files.iter().enumerate() {
            let record = FileRecord::new(path);
            if !record.format().is_supported() {
                debug!(file = %record.file_name(), "Skipping unsupported format");
                slots.push(Some(FileOutcome::skipped(path, "unsupported format")));
                continue;
            }
            slots.push(None);
            order.push(index);

            let analyzer = self.analyzer.clone();
            let semaphore = semaphore.clone();
            let cancelled = self.cancel.subscribe();
            let handle = tasks.spawn(async move { analyze_task(index, record, analyzer, semaphore, cancelled).await });
            task_index.insert(handle.id(), index);
        }

        let mut buffer = ReorderBuffer::new(order);
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (index, result))) => buffer.insert(index, result),
                Err(e) => {
                    let Some(&index) = task_index.get(&e.id()) else {
                        error!(error = %e, "Analysis task failed for an unknown file");
                        continue;
                    };
                    error!(index, error = %e, "Analysis task failed");
                    buffer.insert(index, join_failure(&e));
                }
            }

            while let Some((index, result)) = buffer.pop_ready() {
                let outcome = self.commit(&mut namespace, &scan.files[index], result).await;
                slots[index] = Some(outcome);
            }
        }

        // Only a task that never reported back leaves a slot empty.
        summary.outcomes = slots
            .into_iter()
            .zip(scan.files.iter())
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| FileOutcome::failed(path, &FileError::Cancelled))
            })
            .collect();
        summary.finish();

        info!(
            renamed = summary.renamed(),
            planned = summary.planned(),
            unchanged = summary.unchanged(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            cancelled = summary.cancelled(),
            duration_ms = summary.duration_ms().unwrap_or_default(),
            "Rename run finished"
        );
        Ok(summary)
    }

    async fn commit(
        &self,
        namespace: &mut DirectoryNamespace,
        path: &Path,
        result: AnalysisSlot,
    ) -> FileOutcome {
        let analyzed = match result {
            None => return FileOutcome::failed(path, &FileError::Cancelled),
            Some(Err(panic)) => {
                return FileOutcome::new(
                    path,
                    OutcomeStatus::Failed {
                        kind: "Internal".to_string(),
                        message: panic,
                    },
                )
            }
            Some(Ok(analyzed)) => analyzed,
        };

        let mut plan = match analyzed.plan {
            Ok(plan) => plan,
            Err(e) => return FileOutcome::failed(path, &e),
        };

        let extension = analyzed.record.extension();
        match self.executor.commit(namespace, &mut plan, &extension).await {
            Ok(CommitOutcome::Renamed(target)) => FileOutcome::new(
                path,
                OutcomeStatus::Renamed {
                    to: target
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                },
            ),
            Ok(CommitOutcome::Unchanged) => FileOutcome::new(path, OutcomeStatus::Unchanged),
            Ok(CommitOutcome::Planned(name)) => {
                FileOutcome::new(path, OutcomeStatus::Planned { to: name })
            }
            Err(e) => {
                warn!(file = %analyzed.record.file_name(), error_kind = %e.kind(), error = %e, "Rename failed");
                FileOutcome::failed(path, &e)
            }
        }
    }
}

async fn analyze_task(
    index: usize,
    record: FileRecord,
    analyzer: Arc<FileAnalyzer>,
    semaphore: Arc<Semaphore>,
    cancelled: watch::Receiver<bool>,
) -> TaskResult {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return (index, None);
    };
    if *cancelled.borrow() {
        return (index, None);
    }

    let result = AssertUnwindSafe(analyzer.analyze(record))
        .catch_unwind()
        .await
        .map_err(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "analysis panicked".to_string());
            error!(index, error = %message, "Analysis panicked");
            message
        });
    (index, Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_buffer_releases_in_order() {
        let mut buffer = ReorderBuffer::new(vec![0, 2, 3]);
        buffer.insert(3, "d");
        buffer.insert(2, "c");
        assert_eq!(buffer.pop_ready(), None);

        buffer.insert(0, "a");
        assert_eq!(buffer.pop_ready(), Some((0, "a")));
        assert_eq!(buffer.pop_ready(), Some((2, "c")));
        assert_eq!(buffer.pop_ready(), Some((3, "d")));
        assert_eq!(buffer.pop_ready(), None);
    }

    #[tokio::test]
    async fn test_aborted_task_does_not_block_later_files() {
        let mut tasks = tokio::task::JoinSet::new();
        let stuck = tasks.spawn(async {
            std::future::pending::<()>().await;
            0usize
        });
        tasks.spawn(async { 1usize });
        let task_index = HashMap::from([(stuck.id(), 0usize)]);
        stuck.abort();

        let mut buffer = ReorderBuffer::new(vec![0, 1]);
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, index)) => buffer.insert(index, None),
                Err(e) => {
                    assert!(e.is_cancelled());
                    let slot = join_failure(&e);
                    assert!(matches!(&slot, Some(Err(msg)) if msg.contains("aborted")));
                    buffer.insert(task_index[&e.id()], slot);
                }
            }
        }

        let (first, slot) = buffer.pop_ready().unwrap();
        assert_eq!(first, 0);
        assert!(matches!(slot, Some(Err(_))));
        assert_eq!(buffer.pop_ready().map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_config_builders_clamp() {
        let config = RenameConfig::default()
            .with_max_concurrent(0)
            .with_name_retries(5)
            .with_name_max_chars(0)
            .with_dry_run(true);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.name_retries, 1);
        assert_eq!(config.name_max_chars, 1);
        assert!(config.dry_run);
    }

    #[test]
    fn test_default_config_matches_defaults() {
        let config = RenameConfig::default();
        assert_eq!(config.max_concurrent, MAX_CONCURRENT);
        assert_eq!(config.gen_timeout, Duration::from_secs(GEN_TIMEOUT_SECS));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
        assert!(*handle.subscribe().borrow());
    }
}
