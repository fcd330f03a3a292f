//! Remote synchronizer: download files that are not yet present locally.
//!
//! Downloads go to a hidden `.<name>.partial` file next to the target and
//! are renamed into place only once complete, so a file that exists under
//! its final name is always whole. Failed transfers remove their partial
//! file and are retried by the next sync.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use metrics::counter;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::sources::{RemoteEntry, RemoteSource};

/// Summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: usize,
    pub skipped_existing: usize,
    /// Entries whose transfer failed, with the reason.
    pub failed: Vec<(String, String)>,
}

enum EntryOutcome {
    Downloaded,
    AlreadyPresent,
}

/// Mirrors new remote files into a local directory.
pub struct RemoteSynchronizer {
    source: Arc<dyn RemoteSource>,
    local_dir: PathBuf,
    extension: String,
    workers: usize,
}

impl RemoteSynchronizer {
    pub fn new(source: Arc<dyn RemoteSource>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            local_dir: local_dir.into(),
            extension: "txt".to_string(),
            workers: 1,
        }
    }

    /// Only names ending in `.<extension>` are synced (case-insensitive).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Whether a remote name is a plain, visible file with the wanted extension.
    pub fn is_candidate(&self, name: &str) -> bool {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return false;
        }
        let suffix = format!(".{}", self.extension.to_ascii_lowercase());
        name.to_ascii_lowercase().ends_with(&suffix)
    }

    /// Download every candidate not already present locally.
    ///
    /// Fails only when the local directory cannot be prepared or the remote
    /// listing fails; individual transfer errors are reported.
    pub async fn sync(&self) -> Result<SyncReport> {
        fs::create_dir_all(&self.local_dir).await?;

        let entries = self.source.list().await?;
        let candidates: Vec<RemoteEntry> = entries
            .into_iter()
            .filter(|e| self.is_candidate(&e.name))
            .collect();

        info!(
            source = %self.source.describe(),
            local_dir = %self.local_dir.display(),
            candidates = candidates.len(),
            "Syncing remote files"
        );

        let outcomes: Vec<(String, Result<EntryOutcome>)> = stream::iter(candidates)
            .map(|entry| async move {
                let outcome = self.sync_entry(&entry).await;
                (entry.name, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = SyncReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(EntryOutcome::Downloaded) => report.downloaded += 1,
                Ok(EntryOutcome::AlreadyPresent) => report.skipped_existing += 1,
                Err(e) => {
                    counter!("probe_download_failures_total").increment(1);
                    warn!(file = %name, error = %e, "Download failed");
                    report.failed.push((name, e.to_string()));
                }
            }
        }
        report.failed.sort();

        info!(
            downloaded = report.downloaded,
            skipped = report.skipped_existing,
            failed = report.failed.len(),
            "Sync finished"
        );
        Ok(report)
    }

    #[instrument(skip(self, entry), fields(file = %entry.name))]
    async fn sync_entry(&self, entry: &RemoteEntry) -> Result<EntryOutcome> {
        let final_path = self.local_dir.join(&entry.name);
        if fs::try_exists(&final_path).await? {
            debug!("Already present, skipping");
            return Ok(EntryOutcome::AlreadyPresent);
        }

        let partial_path = self.local_dir.join(format!(".{}.partial", entry.name));
        let result = match self.download_to(entry, &partial_path).await {
            Ok(bytes) => fs::rename(&partial_path, &final_path)
                .await
                .map(|_| bytes)
                .map_err(IngestionError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                counter!("probe_files_downloaded_total").increment(1);
                info!(bytes, "Downloaded");
                Ok(EntryOutcome::Downloaded)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(error = %cleanup, "Failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }

    async fn download_to(&self, entry: &RemoteEntry, path: &Path) -> Result<u64> {
        let mut body = self.source.open(entry).await?;
        let mut file = fs::File::create(path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = entry.size {
            if written != expected {
                return Err(IngestionError::Transfer(format!(
                    "size mismatch: expected {} bytes, got {}",
                    expected, written
                )));
            }
        }

        Ok(written)
    }
}
