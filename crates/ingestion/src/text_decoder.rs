//! Decoder for the probe's semicolon-separated text export.
//!
//! ```text
//! DeviceName: SAIV-204
//! ProfileNumber: 1532
//! StartTime: 2024-05-01T06:30:00Z
//! Latitude: 60.3913
//! Longitude: 5.3221
//! [data]
//! seq;pressure(dBAR);salt;temp;oxygene;fluorescens;turbidity
//! 1;0.42;31.2;9.8;98.1;0.7;1.1
//! ```

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

use crate::decoder::{DiveDecoder, DiveRecord, ReadingFields};
use crate::error::{IngestionError, Result};

const DATA_MARKER: &str = "[data]";
const PRESSURE_COLUMN: &str = "pressure(dBAR)";
const START_TIME_KEY: &str = "StartTime";

/// Reads `Key: value` headers followed by a `[data]` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularTextDecoder;

impl TabularTextDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiveDecoder for TabularTextDecoder {
    fn name(&self) -> &str {
        "tabular-text"
    }

    async fn verify(&self, path: &Path) -> bool {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => check_structure(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Unreadable dive file");
                false
            }
        }
    }

    async fn decode(&self, path: &Path) -> Result<DiveRecord> {
        let text = tokio::fs::read_to_string(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        parse_dive_text(&text, &file_name)
    }
}

/// Structural check: data marker, a pressure column and a rectangular table.
pub fn check_structure(text: &str) -> bool {
    let mut lines = text.lines().map(str::trim);
    if !lines.any(|l| l.eq_ignore_ascii_case(DATA_MARKER)) {
        return false;
    }

    let mut table = lines.filter(|l| !l.is_empty());
    let Some(columns) = table.next() else {
        return false;
    };
    let columns: Vec<&str> = columns.split(';').map(str::trim).collect();
    if !columns
        .iter()
        .any(|c| c.eq_ignore_ascii_case(PRESSURE_COLUMN))
    {
        return false;
    }

    table.all(|row| row.split(';').count() == columns.len())
}

/// Parse the full text of a dive file.
pub fn parse_dive_text(text: &str, file_name: &str) -> Result<DiveRecord> {
    let mut header = Map::new();
    let mut lines = text.lines().map(str::trim);

    let mut found_marker = false;
    for line in lines.by_ref() {
        if line.eq_ignore_ascii_case(DATA_MARKER) {
            found_marker = true;
            break;
        }
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(IngestionError::decode(
                file_name,
                format!("header line without ':': {}", line),
            ));
        };
        header.insert(key.trim().to_string(), header_value(value.trim()));
    }

    if !found_marker {
        return Err(IngestionError::decode(file_name, "missing [data] marker"));
    }

    let mut table = lines.filter(|l| !l.is_empty());
    let columns: Vec<String> = table
        .next()
        .ok_or_else(|| IngestionError::decode(file_name, "missing column header"))?
        .split(';')
        .map(|c| c.trim().to_string())
        .collect();

    let mut readings = Vec::new();
    for (row, line) in table.enumerate() {
        let cells: Vec<&str> = line.split(';').map(str::trim).collect();
        if cells.len() != columns.len() {
            return Err(IngestionError::decode(
                file_name,
                format!(
                    "row {} has {} cells, expected {}",
                    row + 1,
                    cells.len(),
                    columns.len()
                ),
            ));
        }

        let mut reading = ReadingFields::new();
        for (column, cell) in columns.iter().zip(cells) {
            let value = if cell.is_empty() {
                None
            } else {
                Some(parse_number(cell).ok_or_else(|| {
                    IngestionError::decode(
                        file_name,
                        format!("row {} column {}: not a number: {}", row + 1, column, cell),
                    )
                })?)
            };
            reading.insert(column.clone(), value);
        }
        readings.push(reading);
    }

    let has_start = header
        .keys()
        .any(|k| k.eq_ignore_ascii_case(START_TIME_KEY));
    if !has_start {
        if let Some(date) = date_from_filename(file_name) {
            header.insert(
                START_TIME_KEY.to_string(),
                Value::String(date.format("%Y-%m-%d").to_string()),
            );
        }
    }

    Ok(DiveRecord { header, readings })
}

/// Date encoded as a `YYMMDD` prefix of the file name, e.g. `240501_0007.txt`.
pub fn date_from_filename(file_name: &str) -> Option<NaiveDate> {
    let prefix = file_name.get(..6)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = prefix[0..2].parse().ok()?;
    let month: u32 = prefix[2..4].parse().ok()?;
    let day: u32 = prefix[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

// Decimal commas show up in some instrument locales.
fn parse_number(cell: &str) -> Option<f64> {
    cell.parse::<f64>()
        .ok()
        .or_else(|| cell.replace(',', ".").parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn header_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(f) = parse_number(raw) {
        return Value::from(f);
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "DeviceName: SAIV-204
ProfileNumber: 1532
StartTime: 2024-05-01T06:30:00Z
Latitude: 60.3913
[data]
seq;pressure(dBAR);salt;temp
1;0.42;31.2;9.8
2;1.10;;9.6
";

    #[test]
    fn test_parse_header_and_rows() {
        let record = parse_dive_text(SAMPLE, "240501_1532.txt").unwrap();

        assert_eq!(record.header_value("profilenumber"), Some(&Value::from(1532)));
        assert_eq!(record.header_value("DeviceName"), Some(&Value::from("SAIV-204")));
        assert_eq!(
            record.header_value("StartTime"),
            Some(&Value::from("2024-05-01T06:30:00Z"))
        );
        assert_eq!(record.readings.len(), 2);
        assert_eq!(record.readings[0]["pressure(dBAR)"], Some(0.42));
        assert_eq!(record.readings[1]["salt"], None);
    }

    #[test]
    fn test_start_time_from_filename() {
        let text = "ProfileNumber: 3\n[data]\nseq;pressure(dBAR)\n1;0.5\n";
        let record = parse_dive_text(text, "230917_0003.txt").unwrap();
        assert_eq!(record.header_value("StartTime"), Some(&Value::from("2023-09-17")));

        assert_eq!(date_from_filename("notadate.txt"), None);
        assert_eq!(date_from_filename("231399_x.txt"), None);
    }

    #[test]
    fn test_check_structure() {
        assert!(check_structure(SAMPLE));
        assert!(!check_structure("DeviceName: x\nseq;pressure(dBAR)\n1;2\n"));
        assert!(!check_structure("[data]\nseq;depth\n1;2\n"));
        assert!(!check_structure("[data]\nseq;pressure(dBAR)\n1;2;3\n"));
    }

    #[test]
    fn test_bad_cell_is_decode_error() {
        let text = "[data]\nseq;pressure(dBAR)\n1;deep\n";
        let err = parse_dive_text(text, "x.txt").unwrap_err();
        assert!(matches!(err, IngestionError::Decode { .. }));
    }
}
