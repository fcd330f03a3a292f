//! Dive headers and readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::Channel;
use crate::point::GeoPoint;

/// Opaque identifier of one stored dive.
pub type SessionId = Uuid;

/// One physical dive.
///
/// At most one header exists per `profile_number`; headers are created
/// once and never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiveHeader {
    pub session_id: SessionId,
    pub device_name: String,
    /// Instrument-assigned dive number, the natural deduplication key.
    pub profile_number: i64,
    pub start_datetime: DateTime<Utc>,
    /// Source file, for traceability.
    pub file_name: String,
    pub air_temp: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub air_pressure: Option<f64>,
    pub location: Option<GeoPoint>,
}

/// Optional values for every [`Channel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelValues {
    pub salinity: Option<f64>,
    pub temperature: Option<f64>,
    pub oxygen: Option<f64>,
    pub fluorescence: Option<f64>,
    pub turbidity: Option<f64>,
}

impl ChannelValues {
    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Salinity => self.salinity,
            Channel::Temperature => self.temperature,
            Channel::Oxygen => self.oxygen,
            Channel::Fluorescence => self.fluorescence,
            Channel::Turbidity => self.turbidity,
        }
    }

    pub fn set(&mut self, channel: Channel, value: Option<f64>) {
        let slot = match channel {
            Channel::Salinity => &mut self.salinity,
            Channel::Temperature => &mut self.temperature,
            Channel::Oxygen => &mut self.oxygen,
            Channel::Fluorescence => &mut self.fluorescence,
            Channel::Turbidity => &mut self.turbidity,
        };
        *slot = value;
    }

    /// Values in [`Channel::ALL`] order.
    pub fn to_array(&self) -> [Option<f64>; 5] {
        Channel::ALL.map(|c| self.get(c))
    }

    pub fn from_array(values: [Option<f64>; 5]) -> Self {
        let mut out = Self::default();
        for (channel, value) in Channel::ALL.iter().zip(values) {
            out.set(*channel, value);
        }
        out
    }

    /// True when no channel carries a value.
    pub fn is_empty(&self) -> bool {
        self.to_array().iter().all(Option::is_none)
    }
}

/// One instrument-reported sample at its native depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub session_id: SessionId,
    /// Monotonic instrument sequence number, unique within a session.
    pub seq: i64,
    pub pressure_dbar: f64,
    pub values: ChannelValues,
}

/// One resampled sample at a canonical depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedReading {
    pub session_id: SessionId,
    /// Sequence number interpolated alongside the channels, rounded.
    pub seq: Option<i64>,
    /// Always a member of the depth set the dive was resampled onto.
    pub pressure_dbar: f64,
    pub values: ChannelValues,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_values_roundtrip_array() {
        let mut values = ChannelValues::default();
        assert!(values.is_empty());

        values.set(Channel::Oxygen, Some(97.5));
        assert_eq!(values.get(Channel::Oxygen), Some(97.5));
        assert!(!values.is_empty());

        let array = values.to_array();
        assert_eq!(array[Channel::Oxygen.index()], Some(97.5));
        assert_eq!(ChannelValues::from_array(array), values);
    }
}
