//! SQLite dive store for local runs and tests.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use probe_common::{
    DiveHeader, GeoPoint, InterpolatedReading, ProbeError, ProbeResult, RawReading, SessionId,
    TimeRange,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};
use uuid::Uuid;

use crate::rows::{InterpolatedRow, RawRow, SummaryRow, TimedInterpolatedRow, TimedRawRow};
use crate::schema::{statements, SQLITE_SCHEMA};
use crate::store::{db_error, DiveStore, InsertOutcome, SessionSummary, TimedRawReading, TimedReading};

const HEADER_COLUMNS: &str = "sessionid, devicename, profilenumber, startdatetime, airtemp, \
     location, filename, windspeed, winddirection, airpressure";

/// Dive store backed by a SQLite file (or memory).
pub struct SqliteDiveStore {
    pool: SqlitePool,
}

impl SqliteDiveStore {
    /// Open or create the database named by a `sqlite:` URL.
    pub async fn connect(database_url: &str) -> ProbeResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_error("Invalid SQLite URL"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if database_url.contains(":memory:") {
            memory_pool_options()
        } else {
            SqlitePoolOptions::new().max_connections(5)
        }
        .connect_with(options)
        .await
        .map_err(db_error("Failed to open SQLite database"))?;

        info!(url = %database_url, "Opened SQLite dive store");
        Ok(Self { pool })
    }

    /// Open a migrated in-memory database (for testing).
    pub async fn open_memory() -> ProbeResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_error("Invalid SQLite URL"))?
            .foreign_keys(true);

        let pool = memory_pool_options()
            .connect_with(options)
            .await
            .map_err(db_error("Failed to open SQLite database"))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DiveStore for SqliteDiveStore {
    async fn migrate(&self) -> ProbeResult<()> {
        for statement in statements(SQLITE_SCHEMA) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error("Migration failed"))?;
        }
        Ok(())
    }

    async fn profile_exists(&self, profile_number: i64) -> ProbeResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM session_data WHERE profilenumber = ?")
                .bind(profile_number)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("Query failed"))?;

        Ok(count > 0)
    }

    async fn insert_dive(
        &self,
        header: &DiveHeader,
        readings: &[RawReading],
    ) -> ProbeResult<InsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_error("Begin failed"))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO session_data (
                sessionid, devicename, profilenumber, startdatetime, airtemp,
                location, filename, windspeed, winddirection, airpressure
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (profilenumber) DO NOTHING
            "#,
        )
        .bind(header.session_id)
        .bind(&header.device_name)
        .bind(header.profile_number)
        .bind(header.start_datetime)
        .bind(header.air_temp)
        .bind(header.location.map(|p| p.to_wkt()))
        .bind(&header.file_name)
        .bind(header.wind_speed)
        .bind(header.wind_direction)
        .bind(header.air_pressure)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Insert failed"))?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await.map_err(db_error("Rollback failed"))?;
            return Ok(InsertOutcome::Duplicate);
        }

        for reading in readings {
            let values = &reading.values;
            sqlx::query(
                r#"
                INSERT INTO raw_timeseries (
                    sessionid, seq, salinity, temperature, pressure_dbar,
                    oxygen, fluorescence, turbidity
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(header.session_id)
            .bind(reading.seq)
            .bind(values.salinity)
            .bind(values.temperature)
            .bind(reading.pressure_dbar)
            .bind(values.oxygen)
            .bind(values.fluorescence)
            .bind(values.turbidity)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Insert failed"))?;
        }

        tx.commit().await.map_err(db_error("Commit failed"))?;

        debug!(
            session_id = %header.session_id,
            profile_number = header.profile_number,
            readings = readings.len(),
            "Stored dive"
        );

        Ok(InsertOutcome::Inserted {
            readings: readings.len() as u64,
        })
    }

    async fn get_dive(&self, session_id: SessionId) -> ProbeResult<Option<DiveHeader>> {
        let row = sqlx::query_as::<_, SqliteHeaderRow>(&format!(
            "SELECT {} FROM session_data WHERE sessionid = ?",
            HEADER_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Query failed"))?;

        row.map(DiveHeader::try_from).transpose()
    }

    async fn list_sessions(&self) -> ProbeResult<Vec<SessionSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT s.sessionid, s.profilenumber, s.startdatetime,
                   COUNT(i.sessionid) AS interpolated
            FROM session_data s
            LEFT JOIN interpolated_timeseries i ON i.sessionid = s.sessionid
            GROUP BY s.sessionid, s.profilenumber, s.startdatetime
            ORDER BY s.startdatetime DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Query failed"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn raw_readings(&self, session_id: SessionId) -> ProbeResult<Vec<RawReading>> {
        let rows = sqlx::query_as::<_, RawRow>(
            "SELECT sessionid, seq, salinity, temperature, pressure_dbar, \
             oxygen, fluorescence, turbidity \
             FROM raw_timeseries WHERE sessionid = ? ORDER BY seq",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Query failed"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn interpolated_readings(
        &self,
        session_id: SessionId,
    ) -> ProbeResult<Vec<InterpolatedReading>> {
        let rows = sqlx::query_as::<_, InterpolatedRow>(
            "SELECT sessionid, seq, salinity, temperature, pressure_dbar, \
             oxygen, fluorescence, turbidity \
             FROM interpolated_timeseries WHERE sessionid = ? ORDER BY pressure_dbar",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Query failed"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn replace_interpolated(
        &self,
        session_id: SessionId,
        rows: &[InterpolatedReading],
    ) -> ProbeResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_error("Begin failed"))?;

        sqlx::query("DELETE FROM interpolated_timeseries WHERE sessionid = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Delete failed"))?;

        for row in rows {
            let values = &row.values;
            sqlx::query(
                r#"
                INSERT INTO interpolated_timeseries (
                    sessionid, seq, salinity, temperature, pressure_dbar,
                    oxygen, fluorescence, turbidity
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session_id)
            .bind(row.seq)
            .bind(values.salinity)
            .bind(values.temperature)
            .bind(row.pressure_dbar)
            .bind(values.oxygen)
            .bind(values.fluorescence)
            .bind(values.turbidity)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Insert failed"))?;
        }

        tx.commit().await.map_err(db_error("Commit failed"))?;
        Ok(rows.len() as u64)
    }

    async fn dive_count(&self) -> ProbeResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session_data")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Query failed"))?;

        Ok(count.max(0) as u64)
    }

    async fn dives_between(&self, range: TimeRange) -> ProbeResult<Vec<DiveHeader>> {
        let rows = sqlx::query_as::<_, SqliteHeaderRow>(&format!(
            "SELECT {} FROM session_data \
             WHERE startdatetime >= ? AND startdatetime < ? \
             ORDER BY startdatetime ASC",
            HEADER_COLUMNS
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Query failed"))?;

        rows.into_iter().map(DiveHeader::try_from).collect()
    }

    async fn interpolated_between(
        &self,
        range: TimeRange,
        min_depth: f64,
        max_depth: f64,
    ) -> ProbeResult<Vec<TimedReading>> {
        let rows = sqlx::query_as::<_, TimedInterpolatedRow>(
            r#"
            SELECT s.startdatetime, i.sessionid, i.seq, i.salinity, i.temperature,
                   i.pressure_dbar, i.oxygen, i.fluorescence, i.turbidity
            FROM interpolated_timeseries i
            JOIN session_data s ON s.sessionid = i.sessionid
            WHERE s.startdatetime >= ? AND s.startdatetime < ?
              AND i.pressure_dbar >= ? AND i.pressure_dbar <= ?
            ORDER BY s.startdatetime ASC, i.pressure_dbar ASC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(min_depth)
        .bind(max_depth)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Query failed"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn raw_between(&self, range: TimeRange) -> ProbeResult<Vec<TimedRawReading>> {
        let rows = sqlx::query_as::<_, TimedRawRow>(
            r#"
            SELECT s.startdatetime, s.profilenumber, r.sessionid, r.seq, r.salinity,
                   r.temperature, r.pressure_dbar, r.oxygen, r.fluorescence, r.turbidity
            FROM raw_timeseries r
            JOIN session_data s ON s.sessionid = r.sessionid
            WHERE s.startdatetime >= ? AND s.startdatetime < ?
            ORDER BY s.startdatetime ASC, r.seq ASC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Query failed"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// Every connection to `:memory:` is its own database, so keep exactly one
// and never recycle it.
fn memory_pool_options() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

/// Header row with the location stored as WKT.
#[derive(FromRow)]
struct SqliteHeaderRow {
    sessionid: Uuid,
    devicename: String,
    profilenumber: i64,
    startdatetime: DateTime<Utc>,
    airtemp: Option<f64>,
    location: Option<String>,
    filename: String,
    windspeed: Option<f64>,
    winddirection: Option<f64>,
    airpressure: Option<f64>,
}

impl TryFrom<SqliteHeaderRow> for DiveHeader {
    type Error = ProbeError;

    fn try_from(row: SqliteHeaderRow) -> Result<Self, Self::Error> {
        let location = row
            .location
            .as_deref()
            .map(GeoPoint::from_wkt)
            .transpose()
            .map_err(|e| ProbeError::corrupt_row("session_data", e.to_string()))?;

        Ok(DiveHeader {
            session_id: row.sessionid,
            device_name: row.devicename,
            profile_number: row.profilenumber,
            start_datetime: row.startdatetime,
            file_name: row.filename,
            air_temp: row.airtemp,
            wind_speed: row.windspeed,
            wind_direction: row.winddirection,
            air_pressure: row.airpressure,
            location,
        })
    }
}
