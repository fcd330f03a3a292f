//! The decoder contract the loader consumes.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Instrument-native channel values of one reading, keyed by column name.
///
/// A missing key or `None` means the channel was not reported.
pub type ReadingFields = BTreeMap<String, Option<f64>>;

/// A decoded dive file: header fields plus readings in acquisition order.
///
/// Field names are whatever the instrument writes; mapping them onto the
/// store's columns is the loader's job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiveRecord {
    pub header: Map<String, Value>,
    pub readings: Vec<ReadingFields>,
}

impl DiveRecord {
    /// Header value by key, ignoring ASCII case.
    pub fn header_value(&self, key: &str) -> Option<&Value> {
        self.header
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }
}

/// Turns raw instrument files into [`DiveRecord`]s.
///
/// `verify` is a cheap structural check; `decode` may still fail on a
/// file that verified.
#[async_trait]
pub trait DiveDecoder: Send + Sync {
    fn name(&self) -> &str;

    async fn verify(&self, path: &Path) -> bool;

    async fn decode(&self, path: &Path) -> Result<DiveRecord>;
}
