//! Common types shared across the dive-probe pipeline crates.
//!
//! A dive is a single probe deployment from the surface to its deepest
//! point and back. Raw readings arrive at irregular depths; interpolated
//! readings sit on a fixed [`DepthSet`] so dives can be compared over time.

pub mod channel;
pub mod depth;
pub mod dive;
pub mod error;
pub mod interval;
pub mod point;
pub mod time;

pub use channel::Channel;
pub use depth::DepthSet;
pub use dive::{ChannelValues, DiveHeader, InterpolatedReading, RawReading, SessionId};
pub use error::{ProbeError, ProbeResult};
pub use interval::ResampleInterval;
pub use point::{GeoPoint, WGS84_SRID};
pub use time::{parse_timestamp, TimeParseError, TimeRange};
