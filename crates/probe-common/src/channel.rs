//! Measurement channels reported by CTD-style probes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// A measured quantity, excluding pressure (which is the depth axis).
///
/// Not every instrument reports every channel, so values for a channel
/// are always optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Salinity,
    Temperature,
    Oxygen,
    Fluorescence,
    Turbidity,
}

impl Channel {
    /// All channels in storage column order.
    pub const ALL: [Channel; 5] = [
        Channel::Salinity,
        Channel::Temperature,
        Channel::Oxygen,
        Channel::Fluorescence,
        Channel::Turbidity,
    ];

    /// Column name in `raw_timeseries` / `interpolated_timeseries`.
    pub fn column(&self) -> &'static str {
        match self {
            Channel::Salinity => "salinity",
            Channel::Temperature => "temperature",
            Channel::Oxygen => "oxygen",
            Channel::Fluorescence => "fluorescence",
            Channel::Turbidity => "turbidity",
        }
    }

    /// Position of this channel in [`Channel::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Channel::Salinity => 0,
            Channel::Temperature => 1,
            Channel::Oxygen => 2,
            Channel::Fluorescence => 3,
            Channel::Turbidity => 4,
        }
    }

    /// Parse a comma-separated channel list, e.g. `"temp,salt"`.
    ///
    /// An empty string selects every channel.
    pub fn parse_list(s: &str) -> Result<Vec<Channel>, ProbeError> {
        let mut channels = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let channel: Channel = part.parse()?;
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
        if channels.is_empty() {
            return Ok(Channel::ALL.to_vec());
        }
        Ok(channels)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Channel {
    type Err = ProbeError;

    /// Accepts the column names as well as the short names the
    /// instrument and the old dashboard use (`salt`, `temp`, `oxygene`,
    /// `fluorescens`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "salinity" | "salt" => Ok(Channel::Salinity),
            "temperature" | "temp" => Ok(Channel::Temperature),
            "oxygen" | "oxygene" => Ok(Channel::Oxygen),
            "fluorescence" | "fluorescens" => Ok(Channel::Fluorescence),
            "turbidity" => Ok(Channel::Turbidity),
            other => Err(ProbeError::UnknownChannel(other.to_string())),
        }
    }
}
