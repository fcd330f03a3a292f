//! The store interface used by the loader, the interpolation engine and
//! the export projections.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use probe_common::{
    DiveHeader, InterpolatedReading, ProbeError, ProbeResult, RawReading, SessionId, TimeRange,
};
use tracing::info;

use crate::postgres::PgDiveStore;
use crate::sqlite::SqliteDiveStore;

/// Result of persisting one dive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Header and readings committed.
    Inserted { readings: u64 },
    /// A dive with the same profile number already exists; nothing written.
    Duplicate,
}

/// A stored dive and how many interpolated rows it currently has.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub profile_number: i64,
    pub start_datetime: DateTime<Utc>,
    pub interpolated_rows: u64,
}

impl SessionSummary {
    pub fn is_interpolated(&self) -> bool {
        self.interpolated_rows > 0
    }
}

/// An interpolated reading with its dive's start time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedReading {
    pub start_datetime: DateTime<Utc>,
    pub reading: InterpolatedReading,
}

/// A raw reading with its dive's start time and profile number.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRawReading {
    pub start_datetime: DateTime<Utc>,
    pub profile_number: i64,
    pub reading: RawReading,
}

/// Durable storage for dives.
///
/// Every write that touches more than one row is a single transaction:
/// readers never see a header without its readings, or a half-replaced
/// set of interpolated rows.
#[async_trait]
pub trait DiveStore: Send + Sync {
    /// Create tables and indexes if missing.
    async fn migrate(&self) -> ProbeResult<()>;

    /// Whether a dive with this profile number is already stored.
    async fn profile_exists(&self, profile_number: i64) -> ProbeResult<bool>;

    /// Insert a header and all of its raw readings atomically.
    ///
    /// A profile-number conflict rolls the transaction back and yields
    /// [`InsertOutcome::Duplicate`], so concurrent loaders cannot both
    /// insert the same dive.
    async fn insert_dive(
        &self,
        header: &DiveHeader,
        readings: &[RawReading],
    ) -> ProbeResult<InsertOutcome>;

    async fn get_dive(&self, session_id: SessionId) -> ProbeResult<Option<DiveHeader>>;

    /// All dives, newest first, with their interpolated row counts.
    async fn list_sessions(&self) -> ProbeResult<Vec<SessionSummary>>;

    /// Raw readings of one dive ordered by `seq`.
    async fn raw_readings(&self, session_id: SessionId) -> ProbeResult<Vec<RawReading>>;

    /// Interpolated readings of one dive ordered by depth.
    async fn interpolated_readings(
        &self,
        session_id: SessionId,
    ) -> ProbeResult<Vec<InterpolatedReading>>;

    /// Replace a dive's interpolated readings in one transaction.
    ///
    /// Returns the number of rows written.
    async fn replace_interpolated(
        &self,
        session_id: SessionId,
        rows: &[InterpolatedReading],
    ) -> ProbeResult<u64>;

    async fn dive_count(&self) -> ProbeResult<u64>;

    /// Headers of dives starting within `range`, oldest first.
    async fn dives_between(&self, range: TimeRange) -> ProbeResult<Vec<DiveHeader>>;

    /// Interpolated readings of dives starting within `range` whose depth
    /// lies in `[min_depth, max_depth]`.
    async fn interpolated_between(
        &self,
        range: TimeRange,
        min_depth: f64,
        max_depth: f64,
    ) -> ProbeResult<Vec<TimedReading>>;

    /// Raw readings of dives starting within `range`.
    async fn raw_between(&self, range: TimeRange) -> ProbeResult<Vec<TimedRawReading>>;
}

/// Open the store named by `database_url` and run migrations.
///
/// `sqlite:` URLs select [`SqliteDiveStore`], `postgres://` and
/// `postgresql://` select [`PgDiveStore`].
pub async fn connect(database_url: &str) -> ProbeResult<Arc<dyn DiveStore>> {
    let store: Arc<dyn DiveStore> = if database_url.starts_with("sqlite:") {
        Arc::new(SqliteDiveStore::connect(database_url).await?)
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")
    {
        Arc::new(PgDiveStore::connect(database_url).await?)
    } else {
        return Err(ProbeError::ConfigError(format!(
            "unsupported database url scheme: {}",
            database_url.split(':').next().unwrap_or_default()
        )));
    };

    store.migrate().await?;
    info!("Store connected and migrated");
    Ok(store)
}

pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> ProbeError {
    move |e| ProbeError::DatabaseError(format!("{}: {}", context, e))
}
