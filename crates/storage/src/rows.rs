//! Row types shared by both back ends.

use chrono::{DateTime, Utc};
use probe_common::{ChannelValues, InterpolatedReading, RawReading};
use sqlx::FromRow;
use uuid::Uuid;

use crate::store::{SessionSummary, TimedRawReading, TimedReading};

#[derive(FromRow)]
pub(crate) struct RawRow {
    pub sessionid: Uuid,
    pub seq: i64,
    pub salinity: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure_dbar: f64,
    pub oxygen: Option<f64>,
    pub fluorescence: Option<f64>,
    pub turbidity: Option<f64>,
}

impl From<RawRow> for RawReading {
    fn from(row: RawRow) -> Self {
        RawReading {
            session_id: row.sessionid,
            seq: row.seq,
            pressure_dbar: row.pressure_dbar,
            values: ChannelValues {
                salinity: row.salinity,
                temperature: row.temperature,
                oxygen: row.oxygen,
                fluorescence: row.fluorescence,
                turbidity: row.turbidity,
            },
        }
    }
}

#[derive(FromRow)]
pub(crate) struct InterpolatedRow {
    pub sessionid: Uuid,
    pub seq: Option<i64>,
    pub salinity: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure_dbar: f64,
    pub oxygen: Option<f64>,
    pub fluorescence: Option<f64>,
    pub turbidity: Option<f64>,
}

impl From<InterpolatedRow> for InterpolatedReading {
    fn from(row: InterpolatedRow) -> Self {
        InterpolatedReading {
            session_id: row.sessionid,
            seq: row.seq,
            pressure_dbar: row.pressure_dbar,
            values: ChannelValues {
                salinity: row.salinity,
                temperature: row.temperature,
                oxygen: row.oxygen,
                fluorescence: row.fluorescence,
                turbidity: row.turbidity,
            },
        }
    }
}

#[derive(FromRow)]
pub(crate) struct TimedInterpolatedRow {
    pub startdatetime: DateTime<Utc>,
    #[sqlx(flatten)]
    pub reading: InterpolatedRow,
}

impl From<TimedInterpolatedRow> for TimedReading {
    fn from(row: TimedInterpolatedRow) -> Self {
        TimedReading {
            start_datetime: row.startdatetime,
            reading: row.reading.into(),
        }
    }
}

#[derive(FromRow)]
pub(crate) struct TimedRawRow {
    pub startdatetime: DateTime<Utc>,
    pub profilenumber: i64,
    #[sqlx(flatten)]
    pub reading: RawRow,
}

impl From<TimedRawRow> for TimedRawReading {
    fn from(row: TimedRawRow) -> Self {
        TimedRawReading {
            start_datetime: row.startdatetime,
            profile_number: row.profilenumber,
            reading: row.reading.into(),
        }
    }
}

#[derive(FromRow)]
pub(crate) struct SummaryRow {
    pub sessionid: Uuid,
    pub profilenumber: i64,
    pub startdatetime: DateTime<Utc>,
    pub interpolated: i64,
}

impl From<SummaryRow> for SessionSummary {
    fn from(row: SummaryRow) -> Self {
        SessionSummary {
            session_id: row.sessionid,
            profile_number: row.profilenumber,
            start_datetime: row.startdatetime,
            interpolated_rows: row.interpolated.max(0) as u64,
        }
    }
}
