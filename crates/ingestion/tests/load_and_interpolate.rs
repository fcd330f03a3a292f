//! Loader and interpolation engine against the in-memory SQLite store.

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use ingestion::{DiveLoader, InterpolationEngine, TabularTextDecoder};
use probe_common::{DepthSet, DiveHeader};
use storage::{DiveStore, SqliteDiveStore};
use test_utils::{assert_approx_eq, temperature_at, v_cast_depths, yo_yo_depths, DiveFile, GARBAGE_FILE};
use uuid::Uuid;

async fn memory_store() -> Arc<dyn DiveStore> {
    Arc::new(SqliteDiveStore::open_memory().await.unwrap())
}

fn loader(store: &Arc<dyn DiveStore>) -> DiveLoader {
    DiveLoader::new(store.clone(), Arc::new(TabularTextDecoder::new()))
}

fn write_batch(dir: &Path) {
    let first = DiveFile::new(1).with_depths(&v_cast_depths(5.0, 0.25));
    first.write_to(dir).unwrap();
    // same dive fetched again under another name
    std::fs::write(dir.join("copy_of_first.txt"), first.to_text()).unwrap();

    DiveFile::new(2)
        .with_depths(&[0.3, 1.1, 2.0, 2.9, 1.4])
        .write_to(dir)
        .unwrap();

    std::fs::write(dir.join("garbage.txt"), GARBAGE_FILE).unwrap();
    std::fs::write(
        dir.join("no_profile.txt"),
        DiveFile::new(3).with_depths(&[1.0]).without_profile_number().to_text(),
    )
    .unwrap();
    std::fs::write(dir.join(".hidden.txt"), "ignored").unwrap();
}

#[tokio::test]
async fn test_load_dedups_and_skips_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    write_batch(dir.path());
    let store = memory_store().await;

    let report = loader(&store).load_all(dir.path()).await.unwrap();
    assert_eq!(report.persisted, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.rejected, 2);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(store.dive_count().await.unwrap(), 2);

    // re-running the batch persists nothing new
    let again = loader(&store).load_all(dir.path()).await.unwrap();
    assert_eq!(again.persisted, 0);
    assert_eq!(again.duplicates, 3);
    assert_eq!(store.dive_count().await.unwrap(), 2);

    let sessions = store.list_sessions().await.unwrap();
    let first = sessions.iter().find(|s| s.profile_number == 1).unwrap();
    let raw = store.raw_readings(first.session_id).await.unwrap();
    assert_eq!(raw.len(), v_cast_depths(5.0, 0.25).len());
}

#[tokio::test]
async fn test_parallel_load_inserts_each_profile_once() {
    let dir = tempfile::tempdir().unwrap();
    let file = DiveFile::new(42).with_depths(&[1.0, 2.0, 3.0]);
    for i in 0..6 {
        std::fs::write(dir.path().join(format!("copy_{}.txt", i)), file.to_text()).unwrap();
    }
    let store = memory_store().await;

    let report = loader(&store)
        .with_workers(4)
        .load_all(dir.path())
        .await
        .unwrap();

    assert_eq!(report.persisted, 1);
    assert_eq!(report.duplicates, 5);
    assert_eq!(store.dive_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_interpolated_depths_stay_on_grid_and_above_apex() {
    let dir = tempfile::tempdir().unwrap();
    write_batch(dir.path());
    let store = memory_store().await;
    loader(&store).load_all(dir.path()).await.unwrap();

    let depth_set = DepthSet::canonical();
    let engine = InterpolationEngine::new(store.clone(), depth_set.clone());
    let report = engine.interpolate_all(false).await.unwrap();
    assert_eq!(report.processed, 2);
    assert!(report.failures.is_empty());

    for session in store.list_sessions().await.unwrap() {
        let raw = store.raw_readings(session.session_id).await.unwrap();
        let max_depth = raw.iter().map(|r| r.pressure_dbar).fold(f64::MIN, f64::max);
        let rows = store.interpolated_readings(session.session_id).await.unwrap();

        assert!(!rows.is_empty());
        for row in &rows {
            assert!(depth_set.contains(row.pressure_dbar));
            assert!(row.pressure_dbar <= max_depth);
            // oxygen was never reported
            assert_eq!(row.values.oxygen, None);
            assert_approx_eq!(
                row.values.temperature.unwrap(),
                temperature_at(row.pressure_dbar),
                1e-9
            );
        }
    }

    let second = engine.interpolate_all(false).await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 2);
}

#[tokio::test]
async fn test_force_recomputes_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    DiveFile::new(5)
        .with_depths(&v_cast_depths(3.0, 0.5))
        .write_to(dir.path())
        .unwrap();
    let store = memory_store().await;
    loader(&store).load_all(dir.path()).await.unwrap();

    let session_id = store.list_sessions().await.unwrap()[0].session_id;
    InterpolationEngine::new(store.clone(), DepthSet::new(vec![0.5]).unwrap())
        .interpolate_all(false)
        .await
        .unwrap();
    assert_eq!(store.interpolated_readings(session_id).await.unwrap().len(), 1);

    let engine = InterpolationEngine::new(store.clone(), DepthSet::canonical());
    assert_eq!(engine.interpolate_all(false).await.unwrap().processed, 0);

    let forced = engine.interpolate_all(true).await.unwrap();
    assert_eq!(forced.processed, 1);
    let depths: Vec<f64> = store
        .interpolated_readings(session_id)
        .await
        .unwrap()
        .iter()
        .map(|r| r.pressure_dbar)
        .collect();
    assert_eq!(depths, vec![0.5, 1.5, 2.5]);
}

#[tokio::test]
async fn test_one_bad_dive_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    for n in 10..13 {
        DiveFile::new(n)
            .with_depths(&v_cast_depths(4.0, 0.5))
            .write_to(dir.path())
            .unwrap();
    }
    let store = memory_store().await;
    loader(&store).load_all(dir.path()).await.unwrap();

    // a dive stored without readings cannot be resampled
    let empty = DiveHeader {
        session_id: Uuid::new_v4(),
        device_name: "SAIV-204".to_string(),
        profile_number: 99,
        start_datetime: Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
        file_name: "broken.txt".to_string(),
        air_temp: None,
        wind_speed: None,
        wind_direction: None,
        air_pressure: None,
        location: None,
    };
    store.insert_dive(&empty, &[]).await.unwrap();

    let report = InterpolationEngine::new(store.clone(), DepthSet::canonical())
        .with_workers(2)
        .interpolate_all(false)
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, empty.session_id);
    assert!(store
        .interpolated_readings(empty.session_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_yo_yo_cast_still_processed() {
    let dir = tempfile::tempdir().unwrap();
    DiveFile::new(21)
        .with_depths(&yo_yo_depths(6.0, 0.5, 2.0))
        .write_to(dir.path())
        .unwrap();
    let store = memory_store().await;
    loader(&store).load_all(dir.path()).await.unwrap();

    let report = InterpolationEngine::new(store.clone(), DepthSet::canonical())
        .interpolate_all(false)
        .await
        .unwrap();
    assert_eq!(report.processed, 1);

    let session_id = store.list_sessions().await.unwrap()[0].session_id;
    let rows = store.interpolated_readings(session_id).await.unwrap();
    assert_eq!(rows.len(), 6);
}

#[tokio::test]
async fn test_loaded_header_keeps_start_time_and_file_name() {
    let start = Utc.with_ymd_and_hms(2023, 11, 14, 21, 30, 0).unwrap();
    let (dir, path) = DiveFile::new(77)
        .at(start)
        .with_depths(&[0.5, 1.5])
        .write_temp()
        .unwrap();
    let store = memory_store().await;

    let report = loader(&store).load_all(dir.path()).await.unwrap();
    assert_eq!(report.persisted, 1);

    let session = store.list_sessions().await.unwrap().remove(0);
    let header = store.get_dive(session.session_id).await.unwrap().unwrap();
    assert_eq!(header.profile_number, 77);
    assert_eq!(header.start_datetime, start);
    assert_eq!(
        header.file_name,
        path.file_name().unwrap().to_string_lossy()
    );
}
