//! Dive ingestion library.
//!
//! Moves probe dives from a remote file server into the store and onto
//! the canonical depth grid:
//!
//! - [`RemoteSynchronizer`] mirrors new instrument files locally from an
//!   FTP server, an HTTP directory index or a mounted share
//! - [`DiveLoader`] decodes them and persists each dive once, keyed by
//!   profile number
//! - [`InterpolationEngine`] resamples stored dives onto a [`DepthSet`]
//!
//! Every batch is fail-open: a bad file or dive is logged and reported,
//! the rest of the batch carries on.
//!
//! [`DepthSet`]: probe_common::DepthSet

pub mod decoder;
pub mod error;
pub mod fields;
pub mod interpolate;
pub mod loader;
pub mod sources;
pub mod sync;
pub mod text_decoder;

// Re-exports
pub use decoder::{DiveDecoder, DiveRecord, ReadingFields};
pub use error::{IngestionError, Result};
pub use interpolate::{resample_readings, InterpolationEngine, InterpolationReport};
pub use loader::{DiveLoader, FileOutcome, LoadReport};
pub use sources::{
    ByteStream, FtpDirectorySource, HttpDirectorySource, LocalDirectorySource, RemoteEntry,
    RemoteSource,
};
pub use sync::{RemoteSynchronizer, SyncReport};
pub use text_decoder::TabularTextDecoder;
