//! Edge-guided adaptive thresholding of a water-index raster.
//!
//! Shoreline transition pixels are the most reliable local sample for a
//! bimodal land/water split, so the selector runs Otsu over the dilated
//! edge neighborhood of the scene and falls back to the whole raster (or
//! to the physical zero threshold) when that neighborhood degenerates.

use crate::core::edge::{binary_dilation, canny};
use crate::types::{Mask, Raster};

/// Parameters of the adaptive threshold selection.
#[derive(Debug, Clone)]
pub struct ThresholdParams {
    /// Gaussian scale of the edge detector
    pub edge_sigma: f32,
    /// Hysteresis low threshold on the [0,1]-normalized raster
    pub edge_low_threshold: f32,
    /// Hysteresis high threshold on the [0,1]-normalized raster
    pub edge_high_threshold: f32,
    /// Disk radius of the edge-neighborhood dilation, pixels
    pub dilation_radius: usize,
    /// Minimum `count(r>0)/count(r>thr)` before the zero fallback kicks in
    pub min_positive_fraction: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            edge_sigma: 4.0,
            edge_low_threshold: 0.1,
            edge_high_threshold: 0.3,
            dilation_radius: 4,
            min_positive_fraction: 0.9,
        }
    }
}

/// Threshold-selection branch taken; diagnostic, not a failure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdStatus {
    /// Constant raster, no water detectable
    NoWater,
    /// Otsu over the dilated edge neighborhood
    EdgeOtsu,
    /// Otsu over the entire raster (degenerate edge neighborhood)
    GlobalOtsu,
    /// Edge-neighborhood Otsu rejected, zero threshold applied
    EdgeOtsuZeroFallback,
    /// Whole-raster Otsu rejected, zero threshold applied
    GlobalOtsuZeroFallback,
}

impl ThresholdStatus {
    pub fn code(&self) -> i16 {
        match self {
            ThresholdStatus::NoWater => 0,
            ThresholdStatus::EdgeOtsu => 1,
            ThresholdStatus::GlobalOtsu => 2,
            ThresholdStatus::EdgeOtsuZeroFallback => 3,
            ThresholdStatus::GlobalOtsuZeroFallback => 4,
        }
    }
}

/// Outcome of threshold selection on one scene.
#[derive(Debug, Clone)]
pub struct ThresholdDecision {
    pub status: ThresholdStatus,
    pub threshold: f32,
    pub mask: Mask,
}

/// Adaptive water-mask threshold selector.
pub struct ThresholdSelector {
    params: ThresholdParams,
}

impl ThresholdSelector {
    pub fn new() -> Self {
        Self {
            params: ThresholdParams::default(),
        }
    }

    pub fn with_params(params: ThresholdParams) -> Self {
        Self { params }
    }

    /// Select a water threshold for the index raster and apply it.
    pub fn select(&self, raster: &Raster) -> ThresholdDecision {
        let (min, max) = value_range(raster);

        // constant raster: no threshold exists, mask everything out
        if min >= max {
            log::debug!("constant index raster, no water detectable");
            return self.decide(raster, ThresholdStatus::NoWater, 1.0);
        }

        // normalization feeds edge detection only; threshold decisions
        // stay on original values
        let span = max - min;
        let normalized = raster.mapv(|v| (v - min) / span);

        let edges = canny(
            &normalized,
            self.params.edge_sigma,
            self.params.edge_low_threshold,
            self.params.edge_high_threshold,
        );
        let edges = binary_dilation(&edges, self.params.dilation_radius);

        let samples: Vec<f32> = raster
            .iter()
            .zip(edges.iter())
            .filter(|(_, &e)| e)
            .map(|(&v, _)| v)
            .collect();

        let (mut threshold, mut status) = if has_distinct_values(&samples) {
            (otsu_threshold(&samples), ThresholdStatus::EdgeOtsu)
        } else {
            let all: Vec<f32> = raster.iter().copied().collect();
            (otsu_threshold(&all), ThresholdStatus::GlobalOtsu)
        };

        // zero-threshold safety correction: distrust a threshold under
        // which a disproportionate share of positive-index pixels would
        // be classified as land
        match positive_fraction(raster, threshold) {
            Some(fraction) if fraction < self.params.min_positive_fraction => {
                log::debug!(
                    "positive fraction {:.3} below {:.2}, falling back to zero threshold",
                    fraction,
                    self.params.min_positive_fraction
                );
                threshold = 0.0;
                status = match status {
                    ThresholdStatus::EdgeOtsu => ThresholdStatus::EdgeOtsuZeroFallback,
                    _ => ThresholdStatus::GlobalOtsuZeroFallback,
                };
            }
            Some(_) => {}
            None => {
                // nothing above the threshold: no water detected, the
                // computed threshold stands
                log::debug!("no pixels above threshold {}, correction skipped", threshold);
            }
        }

        self.decide(raster, status, threshold)
    }

    fn decide(&self, raster: &Raster, status: ThresholdStatus, threshold: f32) -> ThresholdDecision {
        let mask = raster.mapv(|v| v > threshold);
        log::debug!(
            "threshold {} selected via branch {:?} ({} water pixels)",
            threshold,
            status,
            mask.iter().filter(|&&w| w).count()
        );
        ThresholdDecision {
            status,
            threshold,
            mask,
        }
    }
}

impl Default for ThresholdSelector {
    fn default() -> Self {
        Self::new()
    }
}

fn value_range(raster: &Raster) -> (f32, f32) {
    raster.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

fn has_distinct_values(values: &[f32]) -> bool {
    match values.first() {
        Some(&first) => values.iter().any(|&v| v != first),
        None => false,
    }
}

/// `count(r>0) / count(r>threshold)`, or `None` when nothing exceeds the
/// threshold (the division is undefined and no correction applies).
pub(crate) fn positive_fraction(raster: &Raster, threshold: f32) -> Option<f64> {
    let above_thr = raster.iter().filter(|&&v| v > threshold).count();
    if above_thr == 0 {
        return None;
    }
    let above_zero = raster.iter().filter(|&&v| v > 0.0).count();
    Some(above_zero as f64 / above_thr as f64)
}

/// Otsu's method: 256-bin histogram over the value range, threshold at
/// the bin center maximizing between-class variance.
pub fn otsu_threshold(values: &[f32]) -> f32 {
    const BINS: usize = 256;

    let (min, max) = values.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    if min >= max {
        return min;
    }

    let span = max - min;
    let mut hist = [0u64; BINS];
    for &v in values {
        let bin = (((v - min) / span) * (BINS as f32 - 1.0)).round() as usize;
        hist[bin.min(BINS - 1)] += 1;
    }

    let total: u64 = values.len() as u64;
    let bin_center = |b: usize| min + span * (b as f32 + 0.5) / BINS as f32;

    let total_sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(b, &n)| bin_center(b) as f64 * n as f64)
        .sum();

    let mut best_var = f64::MIN;
    let mut best_bin = 0usize;
    let mut w0 = 0u64;
    let mut sum0 = 0.0f64;

    for b in 0..BINS - 1 {
        w0 += hist[b];
        sum0 += bin_center(b) as f64 * hist[b] as f64;

        let w1 = total - w0;
        if w0 == 0 || w1 == 0 {
            continue;
        }

        let mu0 = sum0 / w0 as f64;
        let mu1 = (total_sum - sum0) / w1 as f64;
        let var = w0 as f64 * w1 as f64 * (mu0 - mu1) * (mu0 - mu1);

        if var > best_var {
            best_var = var;
            best_bin = b;
        }
    }

    bin_center(best_bin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn split_raster(rows: usize, cols: usize, split: usize, lo: f32, hi: f32) -> Raster {
        Array2::from_shape_fn((rows, cols), |(_, c)| if c < split { lo } else { hi })
    }

    #[test]
    fn constant_raster_yields_no_water() {
        let raster = Array2::from_elem((50, 50), 0.3);
        let decision = ThresholdSelector::new().select(&raster);
        assert_eq!(decision.status, ThresholdStatus::NoWater);
        assert_eq!(decision.status.code(), 0);
        assert!(decision.mask.iter().all(|&w| !w));
    }

    #[test]
    fn bimodal_scene_splits_on_the_shoreline() {
        let raster = split_raster(60, 60, 30, -0.4, 0.6);
        let decision = ThresholdSelector::new().select(&raster);

        assert_eq!(decision.status, ThresholdStatus::EdgeOtsu);
        assert!(decision.threshold > -0.4 && decision.threshold < 0.6);

        for ((_, c), &w) in decision.mask.indexed_iter() {
            assert_eq!(w, c >= 30);
        }
    }

    #[test]
    fn negative_scene_falls_back_to_zero_threshold() {
        // two land modes below zero and a handful of true water pixels:
        // Otsu splits the land modes and must be overruled
        let mut raster = split_raster(60, 60, 30, -0.8, -0.2);
        for r in 0..5 {
            raster[[r * 11 + 2, 45]] = 0.1;
        }

        let decision = ThresholdSelector::new().select(&raster);
        assert_eq!(decision.threshold, 0.0);
        assert!(matches!(
            decision.status,
            ThresholdStatus::EdgeOtsuZeroFallback | ThresholdStatus::GlobalOtsuZeroFallback
        ));
        assert_eq!(decision.mask.iter().filter(|&&w| w).count(), 5);
    }

    #[test]
    fn soft_ramp_uses_whole_raster_otsu() {
        // gradient too weak for the edge detector, edge neighborhood empty
        let raster = Array2::from_shape_fn((40, 120), |(_, c)| c as f32 / 119.0);
        let decision = ThresholdSelector::new().select(&raster);
        assert_eq!(decision.status, ThresholdStatus::GlobalOtsu);
        assert!(decision.threshold > 0.0 && decision.threshold < 1.0);
    }

    #[test]
    fn empty_denominator_skips_correction() {
        let raster = split_raster(10, 10, 5, -0.5, 0.5);
        assert!(positive_fraction(&raster, 2.0).is_none());
        assert!(positive_fraction(&raster, 0.0).is_some());
    }

    #[test]
    fn otsu_separates_two_modes() {
        let mut values = vec![0.1f32; 500];
        values.extend(vec![0.9f32; 500]);
        let thr = otsu_threshold(&values);
        assert!(thr > 0.1 && thr < 0.9, "threshold {} out of band", thr);
    }

    #[test]
    fn otsu_on_degenerate_input_returns_value() {
        assert_eq!(otsu_threshold(&[0.4, 0.4, 0.4]), 0.4);
    }
}
