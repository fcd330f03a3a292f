//! Projections read back through the SQLite store.

use chrono::{TimeZone, Utc};
use probe_common::{
    Channel, ChannelValues, DiveHeader, InterpolatedReading, RawReading, ResampleInterval,
    TimeRange,
};
use storage::projection::{
    binned_profile, daily_stats, raw_csv, raw_export, DepthAggregation, ProfileQuery,
};
use storage::{DiveStore, SqliteDiveStore};
use uuid::Uuid;

async fn seed_dive(store: &SqliteDiveStore, profile: i64, hour: u32, temps: &[f64]) -> Uuid {
    let header = DiveHeader {
        session_id: Uuid::new_v4(),
        device_name: "SAIV-204".to_string(),
        profile_number: profile,
        start_datetime: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        file_name: format!("240501_{}.txt", profile),
        air_temp: Some(10.0 + hour as f64),
        wind_speed: None,
        wind_direction: None,
        air_pressure: None,
        location: None,
    };
    let raw: Vec<RawReading> = temps
        .iter()
        .enumerate()
        .map(|(i, t)| RawReading {
            session_id: header.session_id,
            seq: i as i64 + 1,
            pressure_dbar: i as f64 + 0.5,
            values: ChannelValues {
                temperature: Some(*t),
                ..Default::default()
            },
        })
        .collect();
    store.insert_dive(&header, &raw).await.unwrap();

    let interpolated: Vec<InterpolatedReading> = raw
        .iter()
        .map(|r| InterpolatedReading {
            session_id: r.session_id,
            seq: Some(r.seq),
            pressure_dbar: r.pressure_dbar,
            values: r.values,
        })
        .collect();
    store
        .replace_interpolated(header.session_id, &interpolated)
        .await
        .unwrap();

    header.session_id
}

fn may_first() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_sessions_listed_newest_first() {
    let store = SqliteDiveStore::open_memory().await.unwrap();
    seed_dive(&store, 1, 3, &[10.0]).await;
    seed_dive(&store, 2, 9, &[11.0]).await;

    let sessions = store.list_sessions().await.unwrap();
    assert_eq!(
        sessions.iter().map(|s| s.profile_number).collect::<Vec<_>>(),
        vec![2, 1]
    );
}

#[tokio::test]
async fn test_profile_query_bins_two_dives() {
    let store = SqliteDiveStore::open_memory().await.unwrap();
    seed_dive(&store, 1, 1, &[10.0, 9.0, 8.0]).await;
    seed_dive(&store, 2, 2, &[12.0, 11.0, 10.0]).await;

    let mut query = ProfileQuery::new(may_first());
    query.max_depth = 1.5;
    query.channels = vec![Channel::Temperature];
    query.interval = ResampleInterval::Hours3;

    let rows = binned_profile(&store, &query).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].pressure_dbar, Some(0.5));
    assert_eq!(rows[0].values.temperature, Some(11.0));
    assert_eq!(rows[0].dives, 2);

    query.depth_aggregation = DepthAggregation::Average;
    let rows = binned_profile(&store, &query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values.temperature, Some(10.5));
}

#[tokio::test]
async fn test_raw_export_and_daily_stats() {
    let store = SqliteDiveStore::open_memory().await.unwrap();
    seed_dive(&store, 5, 4, &[10.0, 9.0]).await;
    seed_dive(&store, 6, 8, &[10.0]).await;

    let raw = raw_export(&store, may_first()).await.unwrap();
    assert_eq!(raw.len(), 3);
    let csv = raw_csv(&raw);
    assert!(csv.starts_with("time,profilenumber,seq,pressure_dbar,salinity"));
    assert!(csv.contains("2024-05-01T04:00:00Z,5,1,0.5,,10,,,"));

    let stats = daily_stats(&store, may_first()).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].dives, 2);
    assert_eq!(stats[0].mean_air_temp, Some(16.0));
}
