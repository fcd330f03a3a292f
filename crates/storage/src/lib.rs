//! Storage for dive headers, raw readings and interpolated readings.
//!
//! Provides:
//! - The [`DiveStore`] trait the pipeline components are written against
//! - PostgreSQL/PostGIS back end for production
//! - SQLite back end for local runs and tests
//! - Read-only projections for the dashboard/export boundary

pub mod postgres;
pub mod projection;
mod rows;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use postgres::PgDiveStore;
pub use sqlite::SqliteDiveStore;
pub use store::{connect, DiveStore, InsertOutcome, SessionSummary, TimedRawReading, TimedReading};
