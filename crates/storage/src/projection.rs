//! Read-only views over stored dives for the dashboard and CSV export.
//!
//! Everything here reads through [`DiveStore`]; nothing writes.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use probe_common::{
    Channel, ChannelValues, DiveHeader, ProbeError, ProbeResult, ResampleInterval, SessionId,
    TimeRange,
};
use serde::{Deserialize, Serialize};

use crate::store::{DiveStore, TimedRawReading, TimedReading};

/// How depths are combined inside a time bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthAggregation {
    /// One row per depth in the selected range.
    #[default]
    AllSelected,
    /// One row per bin, averaged across the selected depths.
    Average,
}

impl FromStr for DepthAggregation {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all_selected" | "all" => Ok(DepthAggregation::AllSelected),
            "average" | "avg" | "mean" => Ok(DepthAggregation::Average),
            other => Err(ProbeError::ConfigError(format!(
                "unknown depth aggregation: {}",
                other
            ))),
        }
    }
}

/// Selection over interpolated readings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileQuery {
    pub range: TimeRange,
    pub min_depth: f64,
    pub max_depth: f64,
    /// Channels to report; others are left empty.
    pub channels: Vec<Channel>,
    pub interval: ResampleInterval,
    pub depth_aggregation: DepthAggregation,
}

impl ProfileQuery {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            min_depth: 0.0,
            max_depth: f64::MAX,
            channels: Channel::ALL.to_vec(),
            interval: ResampleInterval::All,
            depth_aggregation: DepthAggregation::AllSelected,
        }
    }
}

/// One aggregated row of a profile query.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedRow {
    pub bucket: DateTime<Utc>,
    /// `None` when depths were averaged together.
    pub pressure_dbar: Option<f64>,
    /// Mean of the non-null values per selected channel.
    pub values: ChannelValues,
    /// Distinct dives contributing to the row.
    pub dives: usize,
}

/// Mean surface conditions per time bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceRow {
    pub bucket: DateTime<Utc>,
    pub air_temp: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub air_pressure: Option<f64>,
    pub dives: usize,
}

/// Dives and mean air temperature for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq)]
pub struct DailyStats {
    pub day: NaiveDate,
    pub dives: u64,
    pub mean_air_temp: Option<f64>,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn get(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Default)]
struct ChannelAccumulator {
    channels: [Mean; 5],
    sessions: HashSet<SessionId>,
}

/// Time bin of a dive. With no binning each dive keeps its own bin, even
/// when another dive started at the same instant.
fn bin_key(
    interval: ResampleInterval,
    start: DateTime<Utc>,
    session_id: SessionId,
) -> (DateTime<Utc>, Option<SessionId>) {
    let dive = (interval == ResampleInterval::All).then_some(session_id);
    (interval.bucket_start(start), dive)
}

/// Depth as an exact grouping key (thousandths of a dbar).
fn depth_key(depth: f64) -> i64 {
    (depth * 1000.0).round() as i64
}

/// Aggregate interpolated readings according to `query`.
///
/// Readings outside the query's time or depth range are ignored, so the
/// same function serves pre-filtered store results and in-memory data.
pub fn bin_readings(readings: &[TimedReading], query: &ProfileQuery) -> Vec<BinnedRow> {
    type Key = ((DateTime<Utc>, Option<SessionId>), Option<i64>);
    let mut bins: BTreeMap<Key, ChannelAccumulator> = BTreeMap::new();

    for timed in readings {
        let reading = &timed.reading;
        if !query.range.contains(timed.start_datetime)
            || reading.pressure_dbar < query.min_depth
            || reading.pressure_dbar > query.max_depth
        {
            continue;
        }

        let bucket = bin_key(query.interval, timed.start_datetime, reading.session_id);
        let depth = match query.depth_aggregation {
            DepthAggregation::AllSelected => Some(depth_key(reading.pressure_dbar)),
            DepthAggregation::Average => None,
        };

        let acc = bins.entry((bucket, depth)).or_default();
        for channel in &query.channels {
            acc.channels[channel.index()].add(reading.values.get(*channel));
        }
        acc.sessions.insert(reading.session_id);
    }

    bins.into_iter()
        .map(|(((bucket, _), depth), acc)| {
            let mut values = ChannelValues::default();
            for channel in &query.channels {
                values.set(*channel, acc.channels[channel.index()].get());
            }
            BinnedRow {
                bucket,
                pressure_dbar: depth.map(|k| k as f64 / 1000.0),
                values,
                dives: acc.sessions.len(),
            }
        })
        .collect()
}

/// Run a profile query against the store.
pub async fn binned_profile(
    store: &dyn DiveStore,
    query: &ProfileQuery,
) -> ProbeResult<Vec<BinnedRow>> {
    let readings = store
        .interpolated_between(query.range, query.min_depth, query.max_depth)
        .await?;
    Ok(bin_readings(&readings, query))
}

/// Raw readings of dives in `range`, oldest dive first.
pub async fn raw_export(
    store: &dyn DiveStore,
    range: TimeRange,
) -> ProbeResult<Vec<TimedRawReading>> {
    store.raw_between(range).await
}

pub fn surface_bins(headers: &[DiveHeader], interval: ResampleInterval) -> Vec<SurfaceRow> {
    #[derive(Default)]
    struct Acc {
        air_temp: Mean,
        wind_speed: Mean,
        wind_direction: Mean,
        air_pressure: Mean,
        dives: usize,
    }

    let mut bins: BTreeMap<(DateTime<Utc>, Option<SessionId>), Acc> = BTreeMap::new();
    for header in headers {
        let acc = bins
            .entry(bin_key(interval, header.start_datetime, header.session_id))
            .or_default();
        acc.air_temp.add(header.air_temp);
        acc.wind_speed.add(header.wind_speed);
        acc.wind_direction.add(header.wind_direction);
        acc.air_pressure.add(header.air_pressure);
        acc.dives += 1;
    }

    bins.into_iter()
        .map(|((bucket, _), acc)| SurfaceRow {
            bucket,
            air_temp: acc.air_temp.get(),
            wind_speed: acc.wind_speed.get(),
            wind_direction: acc.wind_direction.get(),
            air_pressure: acc.air_pressure.get(),
            dives: acc.dives,
        })
        .collect()
}

/// Surface conditions of dives in `range`, binned by `interval`.
pub async fn surface_summary(
    store: &dyn DiveStore,
    range: TimeRange,
    interval: ResampleInterval,
) -> ProbeResult<Vec<SurfaceRow>> {
    let headers = store.dives_between(range).await?;
    Ok(surface_bins(&headers, interval))
}

pub fn daily_stats_from(headers: &[DiveHeader]) -> Vec<DailyStats> {
    let mut days: BTreeMap<NaiveDate, (u64, Mean)> = BTreeMap::new();
    for header in headers {
        let (count, air_temp) = days.entry(header.start_datetime.date_naive()).or_default();
        *count += 1;
        air_temp.add(header.air_temp);
    }

    days.into_iter()
        .map(|(day, (dives, air_temp))| DailyStats {
            day,
            dives,
            mean_air_temp: air_temp.get(),
        })
        .collect()
}

/// Dives per day and mean daily air temperature for dives in `range`.
pub async fn daily_stats(store: &dyn DiveStore, range: TimeRange) -> ProbeResult<Vec<DailyStats>> {
    let headers = store.dives_between(range).await?;
    Ok(daily_stats_from(&headers))
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// CSV with `time,pressure_dbar,dives` followed by the selected channels.
pub fn binned_csv(rows: &[BinnedRow], channels: &[Channel]) -> String {
    let mut out = String::from("time,pressure_dbar,dives");
    for channel in channels {
        out.push(',');
        out.push_str(channel.column());
    }
    out.push('\n');

    for row in rows {
        let _ = write!(
            out,
            "{},{},{}",
            timestamp(row.bucket),
            cell(row.pressure_dbar),
            row.dives
        );
        for channel in channels {
            out.push(',');
            out.push_str(&cell(row.values.get(*channel)));
        }
        out.push('\n');
    }
    out
}

pub fn raw_csv(rows: &[TimedRawReading]) -> String {
    let mut out = String::from("time,profilenumber,seq,pressure_dbar");
    for channel in Channel::ALL {
        out.push(',');
        out.push_str(channel.column());
    }
    out.push('\n');

    for row in rows {
        let _ = write!(
            out,
            "{},{},{},{}",
            timestamp(row.start_datetime),
            row.profile_number,
            row.reading.seq,
            row.reading.pressure_dbar
        );
        for value in row.reading.values.to_array() {
            out.push(',');
            out.push_str(&cell(value));
        }
        out.push('\n');
    }
    out
}

pub fn surface_csv(rows: &[SurfaceRow]) -> String {
    let mut out = String::from("time,dives,airtemp,windspeed,winddirection,airpressure\n");
    for row in rows {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            timestamp(row.bucket),
            row.dives,
            cell(row.air_temp),
            cell(row.wind_speed),
            cell(row.wind_direction),
            cell(row.air_pressure)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use probe_common::InterpolatedReading;
    use uuid::Uuid;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap()
    }

    fn reading(session: SessionId, start: DateTime<Utc>, depth: f64, temp: f64) -> TimedReading {
        TimedReading {
            start_datetime: start,
            reading: InterpolatedReading {
                session_id: session,
                seq: Some(1),
                pressure_dbar: depth,
                values: ChannelValues {
                    temperature: Some(temp),
                    salinity: Some(31.0),
                    ..Default::default()
                },
            },
        }
    }

    fn may() -> TimeRange {
        TimeRange::new(at(1, 0), at(31, 0))
    }

    #[test]
    fn test_all_selected_keeps_depths_and_means_within_bin() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let data = vec![
            reading(a, at(1, 1), 0.5, 10.0),
            reading(a, at(1, 1), 1.5, 9.0),
            reading(b, at(1, 2), 0.5, 12.0),
        ];
        let mut query = ProfileQuery::new(may());
        query.interval = ResampleInterval::Hours3;
        query.channels = vec![Channel::Temperature];

        let rows = bin_readings(&data, &query);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pressure_dbar, Some(0.5));
        assert_eq!(rows[0].values.temperature, Some(11.0));
        assert_eq!(rows[0].dives, 2);
        // unselected channels stay empty
        assert_eq!(rows[0].values.salinity, None);
        assert_eq!(rows[1].pressure_dbar, Some(1.5));
        assert_eq!(rows[1].dives, 1);
    }

    #[test]
    fn test_average_collapses_depths() {
        let a = Uuid::new_v4();
        let data = vec![
            reading(a, at(2, 6), 0.5, 10.0),
            reading(a, at(2, 6), 1.5, 8.0),
            reading(a, at(2, 6), 2.5, 6.0),
        ];
        let mut query = ProfileQuery::new(may());
        query.max_depth = 2.0;
        query.depth_aggregation = DepthAggregation::Average;

        let rows = bin_readings(&data, &query);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pressure_dbar, None);
        assert_eq!(rows[0].values.temperature, Some(9.0));
    }

    #[test]
    fn test_unbinned_dives_starting_together_stay_apart() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let data = vec![
            reading(a, at(3, 9), 0.5, 10.0),
            reading(b, at(3, 9), 0.5, 14.0),
        ];
        let mut query = ProfileQuery::new(may());
        query.channels = vec![Channel::Temperature];

        let rows = bin_readings(&data, &query);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.dives == 1 && r.bucket == at(3, 9)));
        let mut temps: Vec<f64> = rows.iter().filter_map(|r| r.values.temperature).collect();
        temps.sort_by(f64::total_cmp);
        assert_eq!(temps, vec![10.0, 14.0]);

        query.interval = ResampleInterval::Day;
        let rows = bin_readings(&data, &query);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values.temperature, Some(12.0));
    }

    #[test]
    fn test_out_of_range_readings_ignored() {
        let a = Uuid::new_v4();
        let data = vec![reading(a, at(31, 0), 0.5, 10.0)];
        assert!(bin_readings(&data, &ProfileQuery::new(may())).is_empty());
    }

    #[test]
    fn test_daily_stats_skip_missing_air_temp() {
        let header = |start, air_temp| DiveHeader {
            session_id: Uuid::new_v4(),
            device_name: "SAIV-204".to_string(),
            profile_number: 1,
            start_datetime: start,
            file_name: "x.txt".to_string(),
            air_temp,
            wind_speed: None,
            wind_direction: None,
            air_pressure: None,
            location: None,
        };
        let headers = vec![
            header(at(3, 6), Some(10.0)),
            header(at(3, 18), None),
            header(at(4, 6), Some(14.0)),
        ];

        let stats = daily_stats_from(&headers);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].dives, 2);
        assert_eq!(stats[0].mean_air_temp, Some(10.0));
        assert_eq!(stats[1].mean_air_temp, Some(14.0));

        let surface = surface_bins(&headers, ResampleInterval::Day);
        assert_eq!(surface.len(), 2);
        assert_eq!(surface[0].wind_speed, None);
    }

    #[test]
    fn test_binned_csv_empty_cells() {
        let row = BinnedRow {
            bucket: at(1, 0),
            pressure_dbar: None,
            values: ChannelValues {
                temperature: Some(9.5),
                ..Default::default()
            },
            dives: 3,
        };
        let csv = binned_csv(&[row], &[Channel::Temperature, Channel::Oxygen]);
        assert_eq!(
            csv,
            "time,pressure_dbar,dives,temperature,oxygen\n2024-05-01T00:00:00Z,,3,9.5,\n"
        );
    }

    #[test]
    fn test_depth_aggregation_parse() {
        assert_eq!(
            "average".parse::<DepthAggregation>().unwrap(),
            DepthAggregation::Average
        );
        assert_eq!(
            "all_selected".parse::<DepthAggregation>().unwrap(),
            DepthAggregation::AllSelected
        );
        assert!("median".parse::<DepthAggregation>().is_err());
    }
}
