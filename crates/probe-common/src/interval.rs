//! Time bins used when aggregating dives for comparison over time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Resampling interval offered at the export boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResampleInterval {
    /// No binning; each dive is its own bucket.
    #[serde(rename = "all")]
    All,
    #[serde(rename = "3H")]
    Hours3,
    #[serde(rename = "6H")]
    Hours6,
    #[serde(rename = "12H")]
    Hours12,
    #[serde(rename = "1D")]
    Day,
    #[serde(rename = "1W")]
    Week,
    #[serde(rename = "1M")]
    Month,
}

impl ResampleInterval {
    pub const ALL: [ResampleInterval; 7] = [
        ResampleInterval::All,
        ResampleInterval::Hours3,
        ResampleInterval::Hours6,
        ResampleInterval::Hours12,
        ResampleInterval::Day,
        ResampleInterval::Week,
        ResampleInterval::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResampleInterval::All => "all",
            ResampleInterval::Hours3 => "3H",
            ResampleInterval::Hours6 => "6H",
            ResampleInterval::Hours12 => "12H",
            ResampleInterval::Day => "1D",
            ResampleInterval::Week => "1W",
            ResampleInterval::Month => "1M",
        }
    }

    /// Origin for fixed-width bins (a Monday, so weeks start on Monday).
    pub fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Fixed bin width, `None` for `All` and the calendar month.
    pub fn width(&self) -> Option<Duration> {
        match self {
            ResampleInterval::Hours3 => Some(Duration::hours(3)),
            ResampleInterval::Hours6 => Some(Duration::hours(6)),
            ResampleInterval::Hours12 => Some(Duration::hours(12)),
            ResampleInterval::Day => Some(Duration::days(1)),
            ResampleInterval::Week => Some(Duration::weeks(1)),
            ResampleInterval::All | ResampleInterval::Month => None,
        }
    }

    /// Start of the bin containing `ts`.
    ///
    /// `All` returns `ts` unchanged.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            ResampleInterval::All => ts,
            ResampleInterval::Month => Utc
                .with_ymd_and_hms(ts.year(), ts.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or(ts),
            fixed => {
                let Some(width) = fixed.width() else {
                    return ts;
                };
                let origin = Self::origin();
                let width_secs = width.num_seconds();
                let offset = (ts - origin).num_seconds().div_euclid(width_secs);
                origin + Duration::seconds(offset * width_secs)
            }
        }
    }
}

impl fmt::Display for ResampleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResampleInterval {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ProbeError::UnknownInterval(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!("3H".parse::<ResampleInterval>().unwrap(), ResampleInterval::Hours3);
        assert_eq!("1d".parse::<ResampleInterval>().unwrap(), ResampleInterval::Day);
        assert_eq!("all".parse::<ResampleInterval>().unwrap(), ResampleInterval::All);
        assert!("2H".parse::<ResampleInterval>().is_err());
    }

    #[test]
    fn test_three_hour_bins() {
        let bucket = ResampleInterval::Hours3.bucket_start(ts(2024, 5, 1, 7, 45));
        assert_eq!(bucket, ts(2024, 5, 1, 6, 0));
    }

    #[test]
    fn test_week_bins_start_monday() {
        // 2024-05-01 is a Wednesday
        let bucket = ResampleInterval::Week.bucket_start(ts(2024, 5, 1, 12, 0));
        assert_eq!(bucket, ts(2024, 4, 29, 0, 0));
    }

    #[test]
    fn test_month_bins_calendar() {
        let bucket = ResampleInterval::Month.bucket_start(ts(2024, 2, 29, 23, 59));
        assert_eq!(bucket, ts(2024, 2, 1, 0, 0));
    }

    #[test]
    fn test_before_origin() {
        let bucket = ResampleInterval::Day.bucket_start(ts(1999, 12, 31, 18, 0));
        assert_eq!(bucket, ts(1999, 12, 31, 0, 0));
    }

    #[test]
    fn test_all_is_identity() {
        let t = ts(2024, 5, 1, 7, 45);
        assert_eq!(ResampleInterval::All.bucket_start(t), t);
    }
}
