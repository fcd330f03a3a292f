//! Profile truncation, interpolation and edge filling.

use crate::error::{ResampleError, Result};

/// One row of a profile: a depth and any number of optional values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub depth: f64,
    pub values: Vec<Option<f64>>,
}

impl Sample {
    pub fn new(depth: f64, values: Vec<Option<f64>>) -> Self {
        Self { depth, values }
    }

    /// A row at `depth` with `width` unset values.
    pub fn empty(depth: f64, width: usize) -> Self {
        Self {
            depth,
            values: vec![None; width],
        }
    }
}

/// Index of the deepest sample.
///
/// Ties resolve to the first occurrence, so a probe that rests at its
/// maximum depth keeps only the first of those rows.
pub fn apex_index(samples: &[Sample]) -> Result<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (index, sample) in samples.iter().enumerate() {
        if !sample.depth.is_finite() {
            return Err(ResampleError::NonFiniteDepth {
                index,
                depth: sample.depth,
            });
        }
        match best {
            Some((_, depth)) if sample.depth <= depth => {}
            _ => best = Some((index, sample.depth)),
        }
    }

    best.map(|(index, _)| index).ok_or(ResampleError::NoSamples)
}

/// The descent leg: every sample up to and including the apex.
pub fn truncate_at_apex(samples: &[Sample]) -> Result<&[Sample]> {
    let apex = apex_index(samples)?;
    Ok(&samples[..=apex])
}

/// Fill interior gaps by linear interpolation against `depths`.
///
/// `depths` must be sorted ascending and the same length as `values`.
/// Gaps before the first or after the last known value are left unset.
pub fn interpolate_by_depth(depths: &[f64], values: &mut [Option<f64>]) {
    debug_assert_eq!(depths.len(), values.len());

    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi - lo < 2 {
            continue;
        }
        let (Some(v_lo), Some(v_hi)) = (values[lo], values[hi]) else {
            continue;
        };
        let (d_lo, d_hi) = (depths[lo], depths[hi]);
        let span = d_hi - d_lo;

        for i in lo + 1..hi {
            values[i] = if span == 0.0 {
                Some(v_lo)
            } else {
                Some(v_lo + (v_hi - v_lo) * (depths[i] - d_lo) / span)
            };
        }
    }
}

/// Forward fill, then back fill. An all-unset column stays unset.
pub fn fill_edges(values: &mut [Option<f64>]) {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }

    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
}

/// Resample a profile onto `targets`.
///
/// Samples must be in acquisition order. The result is sorted by depth,
/// holds at most one row per target, and never contains a target at or
/// beyond the apex depth unless a sample was recorded exactly there.
pub fn resample(samples: &[Sample], targets: &[f64]) -> Result<Vec<Sample>> {
    let descent = truncate_at_apex(samples)?;
    let width = descent[0].values.len();

    for (index, sample) in descent.iter().enumerate() {
        if sample.values.len() != width {
            return Err(ResampleError::RaggedSample {
                index,
                expected: width,
                found: sample.values.len(),
            });
        }
    }

    let max_depth = descent[descent.len() - 1].depth;
    let mut rows: Vec<Sample> = descent.to_vec();

    for &target in targets {
        let observed = descent.iter().any(|s| s.depth == target);
        if !observed && target < max_depth {
            rows.push(Sample::empty(target, width));
        }
    }

    // stable: equal depths keep acquisition order
    rows.sort_by(|a, b| a.depth.total_cmp(&b.depth));

    let depths: Vec<f64> = rows.iter().map(|r| r.depth).collect();
    for column in 0..width {
        let mut values: Vec<Option<f64>> = rows.iter().map(|r| r.values[column]).collect();
        interpolate_by_depth(&depths, &mut values);
        fill_edges(&mut values);
        for (row, value) in rows.iter_mut().zip(values) {
            row.values[column] = value;
        }
    }

    let mut out: Vec<Sample> = Vec::with_capacity(targets.len());
    for row in rows {
        if !targets.contains(&row.depth) {
            continue;
        }
        if out.last().is_some_and(|prev| prev.depth == row.depth) {
            continue;
        }
        out.push(row);
    }

    Ok(out)
}

/// Count direction reversals deeper than `tolerance` in a descent.
///
/// A clean cast has none; a yo-yo cast climbs back up at least once
/// before reaching its apex.
pub fn descent_reversals(depths: &[f64], tolerance: f64) -> usize {
    let mut peak = f64::NEG_INFINITY;
    let mut rising = false;
    let mut count = 0;

    for &depth in depths {
        if depth > peak {
            peak = depth;
            rising = false;
        } else if !rising && peak - depth > tolerance {
            count += 1;
            rising = true;
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(points: &[(f64, Option<f64>)]) -> Vec<Sample> {
        points
            .iter()
            .map(|&(depth, value)| Sample::new(depth, vec![value]))
            .collect()
    }

    fn depths(samples: &[Sample]) -> Vec<f64> {
        samples.iter().map(|s| s.depth).collect()
    }

    fn column(samples: &[Sample], c: usize) -> Vec<Option<f64>> {
        samples.iter().map(|s| s.values[c]).collect()
    }

    #[test]
    fn test_truncate_at_apex() {
        let samples = profile(&[
            (1.0, Some(1.0)),
            (3.0, Some(1.0)),
            (5.0, Some(1.0)),
            (7.0, Some(1.0)),
            (5.0, Some(1.0)),
            (3.0, Some(1.0)),
            (1.0, Some(1.0)),
        ]);
        let descent = truncate_at_apex(&samples).unwrap();
        assert_eq!(depths(descent), vec![1.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_apex_first_occurrence() {
        let samples = profile(&[(1.0, None), (4.0, None), (4.0, None), (2.0, None)]);
        assert_eq!(apex_index(&samples).unwrap(), 1);
    }

    #[test]
    fn test_apex_errors() {
        assert_eq!(apex_index(&[]), Err(ResampleError::NoSamples));
        let samples = profile(&[(1.0, None), (f64::NAN, None)]);
        assert!(matches!(
            apex_index(&samples),
            Err(ResampleError::NonFiniteDepth { index: 1, .. })
        ));
    }

    #[test]
    fn test_interpolates_linearly_in_depth() {
        let samples = profile(&[(2.0, Some(10.0)), (4.0, Some(20.0))]);
        let out = resample(&samples, &[0.5, 3.0, 5.0]).unwrap();

        assert_eq!(depths(&out), vec![0.5, 3.0]);
        // 0.5 lies above the shallowest sample and takes the back-filled value
        assert_eq!(column(&out, 0), vec![Some(10.0), Some(15.0)]);
    }

    #[test]
    fn test_uses_depth_not_row_position() {
        let samples = profile(&[(0.0, Some(0.0)), (10.0, Some(100.0))]);
        let out = resample(&samples, &[1.0, 9.0]).unwrap();

        // positional interpolation would give 33.3 and 66.7
        let values = column(&out, 0);
        assert!((values[0].unwrap() - 10.0).abs() < 1e-9);
        assert!((values[1].unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_targets_beyond_apex_are_omitted() {
        let samples = profile(&[(0.2, Some(1.0)), (2.7, Some(2.0)), (1.0, Some(3.0))]);
        let out = resample(&samples, &[0.5, 1.5, 2.5, 3.5]).unwrap();
        assert_eq!(depths(&out), vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_target_at_apex_kept_only_when_observed() {
        let observed = profile(&[(1.0, Some(1.0)), (2.5, Some(2.0))]);
        let out = resample(&observed, &[0.5, 1.5, 2.5]).unwrap();
        assert_eq!(depths(&out), vec![0.5, 1.5, 2.5]);
        assert_eq!(out[2].values[0], Some(2.0));
    }

    #[test]
    fn test_empty_column_stays_empty() {
        let samples = vec![
            Sample::new(1.0, vec![Some(5.0), None]),
            Sample::new(3.0, vec![Some(7.0), None]),
        ];
        let out = resample(&samples, &[1.5, 2.5]).unwrap();
        assert_eq!(column(&out, 0), vec![Some(5.5), Some(6.5)]);
        assert_eq!(column(&out, 1), vec![None, None]);
    }

    #[test]
    fn test_interior_gap_in_real_row_is_interpolated() {
        let samples = profile(&[(1.0, Some(1.0)), (2.0, None), (3.0, Some(3.0)), (4.0, None)]);
        let out = resample(&samples, &[2.0, 3.5]).unwrap();
        assert_eq!(depths(&out), vec![2.0, 3.5]);
        // 3.5 sits past the last observation and is forward-filled
        assert_eq!(column(&out, 0), vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_duplicate_target_depth_keeps_first() {
        let samples = profile(&[(0.5, Some(1.0)), (0.5, Some(2.0)), (2.0, Some(3.0))]);
        let out = resample(&samples, &[0.5, 1.5]).unwrap();
        assert_eq!(depths(&out), vec![0.5, 1.5]);
        assert_eq!(out[0].values[0], Some(1.0));
    }

    #[test]
    fn test_ragged_samples_rejected() {
        let samples = vec![
            Sample::new(1.0, vec![Some(1.0)]),
            Sample::new(2.0, vec![Some(1.0), Some(2.0)]),
        ];
        assert!(matches!(
            resample(&samples, &[1.5]),
            Err(ResampleError::RaggedSample { index: 1, .. })
        ));
    }

    #[test]
    fn test_fill_edges() {
        let mut values = vec![None, Some(2.0), None, Some(4.0), None];
        fill_edges(&mut values);
        assert_eq!(
            values,
            vec![Some(2.0), Some(2.0), Some(2.0), Some(4.0), Some(4.0)]
        );

        let mut empty: Vec<Option<f64>> = vec![None, None];
        fill_edges(&mut empty);
        assert_eq!(empty, vec![None, None]);
    }

    #[test]
    fn test_descent_reversals() {
        assert_eq!(descent_reversals(&[1.0, 3.0, 5.0, 7.0], 0.5), 0);
        assert_eq!(descent_reversals(&[1.0, 3.0, 2.9, 5.0], 0.5), 0);
        assert_eq!(descent_reversals(&[1.0, 5.0, 2.0, 1.0, 6.0, 8.0], 0.5), 1);
        assert_eq!(descent_reversals(&[1.0, 5.0, 2.0, 6.0, 3.0, 9.0], 0.5), 2);
    }
}
