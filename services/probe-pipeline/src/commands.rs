//! Batch commands behind the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use ingestion::{
    DiveLoader, InterpolationEngine, InterpolationReport, LoadReport, RemoteSynchronizer,
    SyncReport, TabularTextDecoder,
};
use probe_common::{parse_timestamp, Channel, ResampleInterval, TimeRange};
use storage::projection::{
    binned_csv, binned_profile, daily_stats, raw_csv, raw_export, surface_csv, surface_summary,
    DailyStats, DepthAggregation, ProfileQuery,
};
use storage::DiveStore;
use tracing::{error, info};

use crate::config::PipelineConfig;

pub async fn open_store(config: &PipelineConfig) -> Result<Arc<dyn DiveStore>> {
    storage::connect(&config.database_url)
        .await
        .context("Failed to open the dive store")
}

pub async fn sync(config: &PipelineConfig) -> Result<SyncReport> {
    let source = config.remote_source()?;
    let report = RemoteSynchronizer::new(source, &config.local_dir)
        .with_extension(config.remote.extension.clone())
        .with_workers(config.workers)
        .sync()
        .await
        .context("Sync could not run")?;
    Ok(report)
}

pub async fn load(config: &PipelineConfig, store: Arc<dyn DiveStore>) -> Result<LoadReport> {
    let report = DiveLoader::new(store, Arc::new(TabularTextDecoder::new()))
        .with_workers(config.workers)
        .load_all(&config.local_dir)
        .await
        .with_context(|| format!("Cannot read {}", config.local_dir.display()))?;
    Ok(report)
}

pub async fn interpolate(
    config: &PipelineConfig,
    store: Arc<dyn DiveStore>,
    force: bool,
) -> Result<InterpolationReport> {
    let report = InterpolationEngine::new(store, config.depth_set()?)
        .with_workers(config.workers)
        .interpolate_all(force)
        .await
        .context("Interpolation could not run")?;
    Ok(report)
}

/// Counts of one full `run`.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub downloaded: Option<usize>,
    pub persisted: usize,
    pub interpolated: usize,
}

/// Sync, load and interpolate in order.
///
/// A failed sync is logged and the local files are still processed; the
/// run then reports the sync error once the other steps are done.
pub async fn run(config: &PipelineConfig, force: bool) -> Result<RunSummary> {
    let synced = sync(config).await;
    if let Err(e) = &synced {
        error!(error = %e, "Sync failed, continuing with local files");
    }

    let store = open_store(config).await?;
    let loaded = load(config, store.clone()).await?;
    let interpolated = interpolate(config, store, force).await?;

    let summary = RunSummary {
        downloaded: synced.as_ref().ok().map(|r| r.downloaded),
        persisted: loaded.persisted,
        interpolated: interpolated.processed,
    };
    info!(?summary, "Run finished");

    match synced {
        Ok(_) => Ok(summary),
        Err(e) => Err(e.context(format!(
            "run finished without sync ({} dives loaded, {} interpolated)",
            summary.persisted, summary.interpolated
        ))),
    }
}

/// Parse a `--from`/`--to` pair. A date-only `to` includes that whole day.
pub fn parse_range(from: &str, to: &str) -> Result<TimeRange> {
    let start = parse_timestamp(from).with_context(|| format!("Invalid --from: {}", from))?;
    let mut end = parse_timestamp(to).with_context(|| format!("Invalid --to: {}", to))?;
    if is_date_only(to) {
        end += Duration::days(1);
    }
    if end <= start {
        bail!("--to must be after --from");
    }
    Ok(TimeRange::new(start, end))
}

fn is_date_only(s: &str) -> bool {
    let s = s.trim();
    s.len() == 10 && !s.contains(['T', ' '])
}

/// A range covering every dive the store can hold.
pub fn all_time() -> TimeRange {
    let start = Utc
        .with_ymd_and_hms(1970, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let end = Utc
        .with_ymd_and_hms(9999, 12, 31, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    TimeRange::new(start, end)
}

/// What `export` should produce.
#[derive(Debug, Clone)]
pub enum ExportKind {
    Profile(ProfileQuery),
    Raw(TimeRange),
    Surface {
        range: TimeRange,
        interval: ResampleInterval,
    },
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub from: String,
    pub to: String,
    pub min_depth: f64,
    pub max_depth: Option<f64>,
    pub channels: String,
    pub interval: String,
    pub average_depths: bool,
    pub raw: bool,
    pub surface: bool,
    pub output: Option<PathBuf>,
}

impl ExportRequest {
    pub fn kind(&self) -> Result<ExportKind> {
        let range = parse_range(&self.from, &self.to)?;
        let interval: ResampleInterval = self.interval.parse()?;

        if self.raw {
            return Ok(ExportKind::Raw(range));
        }
        if self.surface {
            return Ok(ExportKind::Surface { range, interval });
        }

        let mut query = ProfileQuery::new(range);
        query.min_depth = self.min_depth;
        if let Some(max) = self.max_depth {
            query.max_depth = max;
        }
        if query.max_depth < query.min_depth {
            bail!("--max-depth must not be below --min-depth");
        }
        query.channels = Channel::parse_list(&self.channels)?;
        query.interval = interval;
        query.depth_aggregation = if self.average_depths {
            DepthAggregation::Average
        } else {
            DepthAggregation::AllSelected
        };
        Ok(ExportKind::Profile(query))
    }
}

/// Render the requested export as CSV.
pub async fn export_csv(store: &dyn DiveStore, kind: &ExportKind) -> Result<String> {
    let csv = match kind {
        ExportKind::Profile(query) => {
            let rows = binned_profile(store, query).await?;
            info!(rows = rows.len(), "Exporting binned profile");
            binned_csv(&rows, &query.channels)
        }
        ExportKind::Raw(range) => {
            let rows = raw_export(store, *range).await?;
            info!(rows = rows.len(), "Exporting raw readings");
            raw_csv(&rows)
        }
        ExportKind::Surface { range, interval } => {
            let rows = surface_summary(store, *range, *interval).await?;
            info!(rows = rows.len(), "Exporting surface conditions");
            surface_csv(&rows)
        }
    };
    Ok(csv)
}

pub async fn stats(store: &dyn DiveStore, range: TimeRange) -> Result<Vec<DailyStats>> {
    Ok(daily_stats(store, range).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ExportRequest {
        ExportRequest {
            from: "2024-05-01".to_string(),
            to: "2024-05-31".to_string(),
            min_depth: 0.0,
            max_depth: Some(10.0),
            channels: "temp,salt".to_string(),
            interval: "1D".to_string(),
            average_depths: false,
            raw: false,
            surface: false,
            output: None,
        }
    }

    #[test]
    fn test_date_only_end_is_inclusive() {
        let range = parse_range("2024-05-01", "2024-05-31").unwrap();
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 5, 31, 23, 0, 0).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));

        let exact = parse_range("2024-05-01", "2024-05-31T12:00:00Z").unwrap();
        assert!(!exact.contains(Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap()));

        assert!(parse_range("2024-05-02", "2024-05-01T00:00:00Z").is_err());
    }

    #[test]
    fn test_profile_export_request() {
        let ExportKind::Profile(query) = request().kind().unwrap() else {
            panic!("expected a profile export");
        };
        assert_eq!(query.channels, vec![Channel::Temperature, Channel::Salinity]);
        assert_eq!(query.interval, ResampleInterval::Day);
        assert_eq!(query.max_depth, 10.0);
        assert_eq!(query.depth_aggregation, DepthAggregation::AllSelected);
    }

    #[test]
    fn test_export_request_validation() {
        let mut bad = request();
        bad.interval = "2H".to_string();
        assert!(bad.kind().is_err());

        let mut bad = request();
        bad.channels = "pressure".to_string();
        assert!(bad.kind().is_err());

        let mut raw = request();
        raw.raw = true;
        assert!(matches!(raw.kind().unwrap(), ExportKind::Raw(_)));
    }

    #[tokio::test]
    async fn test_run_loads_from_local_remote() {
        let (remote, _) = test_utils::DiveFile::new(8)
            .with_depths(&test_utils::v_cast_depths(3.0, 0.5))
            .write_temp()
            .unwrap();
        let local = tempfile::tempdir().unwrap();

        let mut config = PipelineConfig::default();
        config.database_url = "sqlite::memory:".to_string();
        config.local_dir = local.path().to_path_buf();
        config.remote.kind = crate::config::RemoteKind::Local;
        config.remote.directory = Some(remote.path().to_path_buf());

        let summary = run(&config, false).await.unwrap();
        assert_eq!(summary.downloaded, Some(1));
        assert_eq!(summary.persisted, 1);
        assert_eq!(summary.interpolated, 1);
    }
}
