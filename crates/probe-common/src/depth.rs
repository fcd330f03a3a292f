//! The canonical depth grid dives are resampled onto.

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// A sorted, duplicate-free list of depths (pressure in dbar).
///
/// Membership is exact: a reading sits on the grid only if its pressure
/// equals a grid value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct DepthSet {
    depths: Vec<f64>,
}

impl DepthSet {
    /// The canonical set `0.5, 1.5, …, 19.5`.
    pub fn canonical() -> Self {
        Self {
            depths: (0..20).map(|i| 0.5 + i as f64).collect(),
        }
    }

    /// `count` depths starting at `start`, spaced `step` apart.
    pub fn regular(start: f64, step: f64, count: usize) -> Result<Self, ProbeError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(ProbeError::InvalidDepthSet(format!(
                "step must be positive, got {}",
                step
            )));
        }
        Self::new((0..count).map(|i| start + step * i as f64).collect())
    }

    /// Build from arbitrary depths; sorts and removes duplicates.
    pub fn new(mut depths: Vec<f64>) -> Result<Self, ProbeError> {
        if depths.is_empty() {
            return Err(ProbeError::InvalidDepthSet("depth set is empty".into()));
        }
        if let Some(bad) = depths.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(ProbeError::InvalidDepthSet(format!(
                "depths must be finite and non-negative, got {}",
                bad
            )));
        }
        depths.sort_by(f64::total_cmp);
        depths.dedup();
        Ok(Self { depths })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.depths
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    pub fn contains(&self, depth: f64) -> bool {
        self.depths
            .binary_search_by(|d| d.total_cmp(&depth))
            .is_ok()
    }

    pub fn min(&self) -> Option<f64> {
        self.depths.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.depths.last().copied()
    }
}

impl Default for DepthSet {
    fn default() -> Self {
        Self::canonical()
    }
}

impl TryFrom<Vec<f64>> for DepthSet {
    type Error = ProbeError;

    fn try_from(depths: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(depths)
    }
}

impl From<DepthSet> for Vec<f64> {
    fn from(set: DepthSet) -> Self {
        set.depths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_set() {
        let set = DepthSet::canonical();
        assert_eq!(set.len(), 20);
        assert_eq!(set.min(), Some(0.5));
        assert_eq!(set.max(), Some(19.5));
        assert!(set.contains(3.5));
        assert!(!set.contains(3.0));
        assert!(!set.contains(20.5));
    }

    #[test]
    fn test_new_sorts_and_dedups() {
        let set = DepthSet::new(vec![2.5, 0.5, 1.5, 0.5]).unwrap();
        assert_eq!(set.as_slice(), &[0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(DepthSet::new(vec![]).is_err());
        assert!(DepthSet::new(vec![1.0, f64::NAN]).is_err());
        assert!(DepthSet::new(vec![-1.0]).is_err());
        assert!(DepthSet::regular(0.5, 0.0, 10).is_err());
    }

    #[test]
    fn test_deserialize_from_list() {
        let set: DepthSet = serde_json::from_str("[3.0, 1.0, 2.0]").unwrap();
        assert_eq!(set.as_slice(), &[1.0, 2.0, 3.0]);
        assert!(serde_json::from_str::<DepthSet>("[]").is_err());
    }
}
