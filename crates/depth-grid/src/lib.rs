//! Depth-grid resampling for probe dives.
//!
//! A probe descends from the surface to its deepest point (the apex) and
//! ascends again, sampling at irregular depths. This crate turns such a
//! series into values on a fixed list of target depths:
//!
//! ```text
//! raw samples (seq order)
//!      │
//!      ├─► truncate after the apex (keep the descent)
//!      │
//!      ├─► add empty rows for target depths above the apex
//!      │
//!      ├─► sort by depth
//!      │
//!      ├─► linear interpolation per column, depth as the x-axis
//!      │
//!      ├─► forward fill, then back fill the edges
//!      │
//!      └─► keep rows whose depth is a target
//! ```
//!
//! Columns are independent: a column with no values stays empty, nothing
//! is synthesised from nothing.

pub mod error;
pub mod profile;

pub use error::{ResampleError, Result};
pub use profile::{
    apex_index, descent_reversals, fill_edges, interpolate_by_depth, resample, truncate_at_apex,
    Sample,
};
