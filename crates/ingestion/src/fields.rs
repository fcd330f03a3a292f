//! Mapping decoded records onto the store's model.
//!
//! Instruments name their columns in their own way (`salt`, `temp`,
//! `pressure(dBAR)`, ...). This module owns the translation to the store's
//! column names and the validation that goes with it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use probe_common::{
    parse_timestamp, Channel, ChannelValues, DiveHeader, GeoPoint, RawReading, SessionId,
};
use serde_json::Value;
use tracing::debug;

use crate::decoder::{DiveRecord, ReadingFields};
use crate::error::{IngestionError, Result};

/// Store-side meaning of a decoded reading column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingField {
    Seq,
    Pressure,
    Channel(Channel),
}

/// Map an instrument column name to its store field, if it has one.
pub fn reading_field(name: &str) -> Option<ReadingField> {
    let lower = name.trim().to_ascii_lowercase();
    match lower.as_str() {
        "seq" | "sequence" => Some(ReadingField::Seq),
        "pressure(dbar)" | "pressure_dbar" | "pressure" => Some(ReadingField::Pressure),
        other => other.parse::<Channel>().ok().map(ReadingField::Channel),
    }
}

fn header_f64(record: &DiveRecord, key: &str) -> Option<f64> {
    let value: Option<f64> = match record.header_value(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

fn header_text(record: &DiveRecord, key: &str) -> Option<String> {
    match record.header_value(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn profile_number(record: &DiveRecord) -> Result<i64> {
    let value = record
        .header_value("ProfileNumber")
        .ok_or_else(|| IngestionError::InvalidRecord("missing profile number".into()))?;

    let number = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    number.ok_or_else(|| IngestionError::InvalidRecord(format!("invalid profile number: {}", value)))
}

fn start_datetime(record: &DiveRecord) -> Result<DateTime<Utc>> {
    let raw = header_text(record, "StartTime")
        .ok_or_else(|| IngestionError::InvalidRecord("missing start time".into()))?;
    parse_timestamp(&raw).map_err(|e| IngestionError::InvalidRecord(e.to_string()))
}

fn location(record: &DiveRecord) -> Result<Option<GeoPoint>> {
    match (
        header_f64(record, "Longitude"),
        header_f64(record, "Latitude"),
    ) {
        (Some(lon), Some(lat)) => GeoPoint::new(lon, lat)
            .map(Some)
            .map_err(|e| IngestionError::InvalidRecord(e.to_string())),
        _ => Ok(None),
    }
}

/// Build the dive header for a decoded record.
///
/// A record without a profile number cannot be deduplicated and is
/// rejected.
pub fn header_from_record(
    record: &DiveRecord,
    file_name: &str,
    session_id: SessionId,
) -> Result<DiveHeader> {
    Ok(DiveHeader {
        session_id,
        device_name: header_text(record, "DeviceName").unwrap_or_else(|| "unknown".to_string()),
        profile_number: profile_number(record)?,
        start_datetime: start_datetime(record)?,
        file_name: file_name.to_string(),
        air_temp: header_f64(record, "AirTemp"),
        wind_speed: header_f64(record, "WindSpeed"),
        wind_direction: header_f64(record, "WindDirection"),
        air_pressure: header_f64(record, "AirPressure"),
        location: location(record)?,
    })
}

fn reading_from_fields(
    fields: &ReadingFields,
    position: usize,
    session_id: SessionId,
) -> Option<RawReading> {
    let mut seq = None;
    let mut pressure = None;
    let mut values = ChannelValues::default();

    for (name, value) in fields {
        match reading_field(name) {
            Some(ReadingField::Seq) => seq = *value,
            Some(ReadingField::Pressure) => pressure = *value,
            Some(ReadingField::Channel(channel)) => values.set(channel, *value),
            None => {}
        }
    }

    let Some(pressure_dbar) = pressure.filter(|p| p.is_finite()) else {
        debug!(position, "Dropping reading without pressure");
        return None;
    };

    Some(RawReading {
        session_id,
        seq: seq.map(|s| s.round() as i64).unwrap_or(position as i64 + 1),
        pressure_dbar,
        values,
    })
}

/// Convert decoded readings, in acquisition order, to raw readings.
///
/// Readings without a pressure are dropped; readings without a sequence
/// number get their 1-based position. Repeated sequence numbers make the
/// whole record invalid.
pub fn readings_from_record(record: &DiveRecord, session_id: SessionId) -> Result<Vec<RawReading>> {
    let mut seen = HashSet::new();
    let mut readings = Vec::with_capacity(record.readings.len());

    for (position, fields) in record.readings.iter().enumerate() {
        let Some(reading) = reading_from_fields(fields, position, session_id) else {
            continue;
        };
        if !seen.insert(reading.seq) {
            return Err(IngestionError::InvalidRecord(format!(
                "duplicate sequence number {}",
                reading.seq
            )));
        }
        readings.push(reading);
    }

    Ok(readings)
}
