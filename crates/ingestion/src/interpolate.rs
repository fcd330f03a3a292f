//! Interpolation engine: raw dives onto the canonical depth set.

use std::sync::Arc;

use depth_grid::{descent_reversals, resample, truncate_at_apex, Sample};
use futures::stream::{self, StreamExt};
use metrics::counter;
use probe_common::{ChannelValues, DepthSet, InterpolatedReading, RawReading, SessionId};
use storage::{DiveStore, SessionSummary};
use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;

/// Reversal (dbar) on the way down that marks a yo-yo cast.
pub const YO_YO_TOLERANCE_DBAR: f64 = 0.5;

/// Summary of an interpolation batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpolationReport {
    /// Dives whose interpolated rows were written.
    pub processed: usize,
    /// Dives that already had interpolated rows.
    pub skipped: usize,
    pub failures: Vec<(SessionId, String)>,
}

/// Resamples stored dives and writes the interpolated rows back.
pub struct InterpolationEngine {
    store: Arc<dyn DiveStore>,
    depth_set: DepthSet,
    workers: usize,
}

impl InterpolationEngine {
    pub fn new(store: Arc<dyn DiveStore>, depth_set: DepthSet) -> Self {
        Self {
            store,
            depth_set,
            workers: 1,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn depth_set(&self) -> &DepthSet {
        &self.depth_set
    }

    /// Interpolate every dive lacking interpolated rows, or every dive
    /// when `force` is set.
    ///
    /// A failing dive is logged and reported; it never stops the batch.
    pub async fn interpolate_all(&self, force: bool) -> Result<InterpolationReport> {
        let sessions = self.store.list_sessions().await?;
        let (pending, done): (Vec<SessionSummary>, Vec<SessionSummary>) = sessions
            .into_iter()
            .partition(|s| force || !s.is_interpolated());

        info!(
            pending = pending.len(),
            skipped = done.len(),
            force,
            "Interpolating dives"
        );

        let outcomes: Vec<(SessionId, Result<u64>)> = stream::iter(pending)
            .map(|summary| async move {
                let outcome = self.interpolate_session(summary.session_id).await;
                (summary.session_id, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = InterpolationReport {
            skipped: done.len(),
            ..Default::default()
        };
        for (session_id, outcome) in outcomes {
            match outcome {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    counter!("probe_interpolation_failures_total").increment(1);
                    error!(session_id = %session_id, error = %e, "Interpolation failed");
                    report.failures.push((session_id, e.to_string()));
                }
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Interpolation finished"
        );
        Ok(report)
    }

    /// Recompute one dive's interpolated rows, replacing any existing ones.
    ///
    /// Returns the number of rows written.
    #[instrument(skip(self))]
    pub async fn interpolate_session(&self, session_id: SessionId) -> Result<u64> {
        let raw = self.store.raw_readings(session_id).await?;
        let rows = resample_readings(&raw, &self.depth_set)?;

        let samples = to_samples(&raw);
        if let Ok(descent) = truncate_at_apex(&samples) {
            let depths: Vec<f64> = descent.iter().map(|s| s.depth).collect();
            let reversals = descent_reversals(&depths, YO_YO_TOLERANCE_DBAR);
            if reversals > 0 {
                warn!(
                    session_id = %session_id,
                    reversals,
                    "Descent reverses direction (yo-yo cast); keeping readings up to the apex"
                );
            }
        }

        let written = self.store.replace_interpolated(session_id, &rows).await?;
        counter!("probe_dives_interpolated_total").increment(1);
        debug!(session_id = %session_id, rows = written, "Interpolated dive");
        Ok(written)
    }
}

/// Column 0 carries `seq`; the rest follow [`probe_common::Channel::ALL`].
fn to_samples(raw: &[RawReading]) -> Vec<Sample> {
    let mut ordered: Vec<&RawReading> = raw.iter().collect();
    ordered.sort_by_key(|r| r.seq);

    ordered
        .into_iter()
        .map(|r| {
            let mut values = Vec::with_capacity(6);
            values.push(Some(r.seq as f64));
            values.extend(r.values.to_array());
            Sample::new(r.pressure_dbar, values)
        })
        .collect()
}

/// Resample one dive's raw readings onto `depth_set`.
///
/// Readings are taken in `seq` order. The sequence number is resampled
/// alongside the channels and rounded.
pub fn resample_readings(
    raw: &[RawReading],
    depth_set: &DepthSet,
) -> Result<Vec<InterpolatedReading>> {
    let session_id = match raw.first() {
        Some(r) => r.session_id,
        None => return Err(depth_grid::ResampleError::NoSamples.into()),
    };

    let resampled = resample(&to_samples(raw), depth_set.as_slice())?;

    Ok(resampled
        .into_iter()
        .map(|sample| {
            let channels = [
                sample.values[1],
                sample.values[2],
                sample.values[3],
                sample.values[4],
                sample.values[5],
            ];
            InterpolatedReading {
                session_id,
                seq: sample.values[0].map(|s| s.round() as i64),
                pressure_dbar: sample.depth,
                values: ChannelValues::from_array(channels),
            }
        })
        .collect())
}
