//! Dive file fixtures in the probe's text export format.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::generators::{salinity_at, temperature_at};

/// Column header written by the SAIV probes.
pub const PROBE_COLUMNS: &str = "seq;pressure(dBAR);salt;temp;oxygene;fluorescens;turbidity";

/// Builder for a dive file.
#[derive(Debug, Clone)]
pub struct DiveFile {
    pub device_name: String,
    pub profile_number: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub air_temp: Option<f64>,
    /// Pre-rendered data rows, without the column header.
    pub rows: Vec<String>,
}

impl DiveFile {
    /// A dive with the given profile number and no rows.
    pub fn new(profile_number: i64) -> Self {
        Self {
            device_name: "SAIV-204".to_string(),
            profile_number: Some(profile_number),
            start_time: Utc
                .with_ymd_and_hms(2024, 5, 1, 6, 0, 0)
                .single()
                .map(|t| t + chrono::Duration::minutes(profile_number)),
            latitude: Some(60.3913),
            longitude: Some(5.3221),
            air_temp: Some(11.2),
            rows: Vec::new(),
        }
    }

    /// Add rows for `depths` with temperature and salinity from the
    /// generators; oxygen, fluorescence and turbidity are left empty.
    pub fn with_depths(mut self, depths: &[f64]) -> Self {
        let offset = self.rows.len();
        for (i, depth) in depths.iter().enumerate() {
            self.rows.push(format!(
                "{};{};{};{};;;",
                offset + i + 1,
                depth,
                salinity_at(*depth),
                temperature_at(*depth)
            ));
        }
        self
    }

    pub fn without_profile_number(mut self) -> Self {
        self.profile_number = None;
        self
    }

    pub fn at(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    /// File name the probe would use, `YYMMDD_<profile>.txt`.
    pub fn file_name(&self) -> String {
        let date = self
            .start_time
            .map(|t| t.format("%y%m%d").to_string())
            .unwrap_or_else(|| "000000".to_string());
        format!("{}_{:04}.txt", date, self.profile_number.unwrap_or(0))
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec![format!("DeviceName: {}", self.device_name)];
        if let Some(n) = self.profile_number {
            lines.push(format!("ProfileNumber: {}", n));
        }
        if let Some(t) = self.start_time {
            lines.push(format!("StartTime: {}", t.to_rfc3339()));
        }
        if let Some(lat) = self.latitude {
            lines.push(format!("Latitude: {}", lat));
        }
        if let Some(lon) = self.longitude {
            lines.push(format!("Longitude: {}", lon));
        }
        if let Some(air) = self.air_temp {
            lines.push(format!("AirTemp: {}", air));
        }
        lines.push("[data]".to_string());
        lines.push(PROBE_COLUMNS.to_string());
        lines.extend(self.rows.iter().cloned());

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Write the file into `dir` under [`DiveFile::file_name`].
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.to_text())?;
        Ok(path)
    }

    /// Write the file into a fresh temporary directory, removed on drop.
    pub fn write_temp(&self) -> std::io::Result<(TempDir, PathBuf)> {
        let dir = tempfile::tempdir()?;
        let path = self.write_to(dir.path())?;
        Ok((dir, path))
    }
}

/// Text that is not a dive file at all.
pub const GARBAGE_FILE: &str = "this is not\na probe export\n";
