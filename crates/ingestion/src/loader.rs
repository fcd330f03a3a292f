//! Dive loader: decoded files into the store, once per profile number.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use metrics::counter;
use storage::{DiveStore, InsertOutcome};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::decoder::DiveDecoder;
use crate::error::{IngestionError, Result};
use crate::fields::{header_from_record, readings_from_record};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Persisted { profile_number: i64, readings: u64 },
    Duplicate { profile_number: i64 },
}

/// Summary of a load batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Dives newly written to the store.
    pub persisted: usize,
    /// Files whose profile number was already stored.
    pub duplicates: usize,
    /// Files that failed verification, decoding or validation.
    pub rejected: usize,
    /// Every file that was not loaded, with the reason.
    pub failures: Vec<(String, String)>,
}

/// Loads every local dive file through a [`DiveDecoder`].
pub struct DiveLoader {
    store: Arc<dyn DiveStore>,
    decoder: Arc<dyn DiveDecoder>,
    workers: usize,
}

impl DiveLoader {
    pub fn new(store: Arc<dyn DiveStore>, decoder: Arc<dyn DiveDecoder>) -> Self {
        Self {
            store,
            decoder,
            workers: 1,
        }
    }

    /// Number of files processed concurrently (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Load all non-hidden files in `local_dir`.
    ///
    /// Per-file problems end up in the report; only an unreadable
    /// directory is an error.
    pub async fn load_all(&self, local_dir: &Path) -> Result<LoadReport> {
        let files = list_dive_files(local_dir).await?;
        info!(
            dir = %local_dir.display(),
            files = files.len(),
            decoder = self.decoder.name(),
            "Loading dive files"
        );

        let outcomes: Vec<(PathBuf, Result<FileOutcome>)> = stream::iter(files)
            .map(|path| async move {
                let outcome = self.load_file(&path).await;
                (path, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = LoadReport::default();
        for (path, outcome) in outcomes {
            let file = display_name(&path);
            match outcome {
                Ok(FileOutcome::Persisted { .. }) => report.persisted += 1,
                Ok(FileOutcome::Duplicate { .. }) => report.duplicates += 1,
                Err(e) => {
                    if matches!(
                        e,
                        IngestionError::Decode { .. } | IngestionError::InvalidRecord(_)
                    ) {
                        report.rejected += 1;
                    }
                    counter!("probe_load_failures_total").increment(1);
                    warn!(file = %file, error = %e, "Skipping dive file");
                    report.failures.push((file, e.to_string()));
                }
            }
        }
        report.failures.sort();

        info!(
            persisted = report.persisted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            failed = report.failures.len(),
            "Load finished"
        );
        Ok(report)
    }

    /// Verify, decode and persist a single file.
    #[instrument(skip(self, path), fields(file = %path.display()))]
    pub async fn load_file(&self, path: &Path) -> Result<FileOutcome> {
        let file_name = display_name(path);

        if !self.decoder.verify(path).await {
            return Err(IngestionError::decode(&file_name, "failed verification"));
        }
        let record = self.decoder.decode(path).await?;

        let session_id = Uuid::new_v4();
        let header = header_from_record(&record, &file_name, session_id)?;
        let readings = readings_from_record(&record, session_id)?;

        if self.store.profile_exists(header.profile_number).await? {
            debug!(profile_number = header.profile_number, "Dive already stored");
            counter!("probe_dives_duplicate_total").increment(1);
            return Ok(FileOutcome::Duplicate {
                profile_number: header.profile_number,
            });
        }

        match self.store.insert_dive(&header, &readings).await? {
            InsertOutcome::Inserted { readings } => {
                counter!("probe_dives_loaded_total").increment(1);
                info!(
                    profile_number = header.profile_number,
                    session_id = %session_id,
                    readings,
                    "Loaded dive"
                );
                Ok(FileOutcome::Persisted {
                    profile_number: header.profile_number,
                    readings,
                })
            }
            InsertOutcome::Duplicate => {
                counter!("probe_dives_duplicate_total").increment(1);
                Ok(FileOutcome::Duplicate {
                    profile_number: header.profile_number,
                })
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Regular, non-hidden files in `dir`, sorted by name.
async fn list_dive_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}
