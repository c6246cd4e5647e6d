//! Elevation-based veto of spurious water detections.
//!
//! Spectral thresholding cannot tell water from flat low-reflectance
//! surfaces (terrain shadow, tarmac); terrain well above the reservoir's
//! historical elevation band cannot hold its water, so detections there
//! are vetoed and the extent re-vectorized.

use geo::{Geometry, MultiPolygon, Polygon};
use ndarray::Array2;

use crate::core::extent::{self, PixelTransform};
use crate::types::{GeoFrame, Mask, Raster};

/// Default elevation margin above the nominal-footprint mean, meters.
pub const DEFAULT_DEM_THRESHOLD: f32 = 15.0;

/// Apply the elevation veto to a measured extent and re-vectorize.
///
/// Cells of the current extent whose elevation exceeds the mean over the
/// nominal footprint by more than `threshold` are dropped, except cells
/// of the nominal footprint itself, which are never vetoed (DEM noise
/// near the known shoreline must not eat the historical extent).
pub fn apply(
    dem: &Raster,
    nominal: &MultiPolygon<f64>,
    current: &Geometry<f64>,
    frame: &GeoFrame,
    threshold: f32,
    simplify: bool,
) -> Geometry<f64> {
    let (rows, cols) = dem.dim();
    let transform = PixelTransform::from_frame(frame, rows, cols);

    let nominal_fp = rasterize(&Geometry::MultiPolygon(nominal.clone()), &transform, rows, cols);
    let current_fp = rasterize(current, &transform, rows, cols);

    let vetoed = veto_mask(dem, &nominal_fp, &current_fp, threshold);
    log::debug!(
        "elevation veto kept {} of {} water cells",
        vetoed.iter().filter(|&&v| v).count(),
        current_fp.iter().filter(|&&v| v).count()
    );

    extent::extract(&vetoed, nominal, frame, simplify)
}

/// Current-footprint cells restricted to plausible water elevations.
///
/// Guarantees `veto_mask(..) ⊆ current_fp` and
/// `nominal_fp ∩ current_fp ⊆ veto_mask(..)`.
pub fn veto_mask(dem: &Raster, nominal_fp: &Mask, current_fp: &Mask, threshold: f32) -> Mask {
    let (rows, cols) = dem.dim();

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (idx, &inside) in nominal_fp.indexed_iter() {
        let v = dem[idx];
        if inside && v.is_finite() {
            sum += v as f64;
            count += 1;
        }
    }

    // empty or fully-undefined footprint: no elevation is plausible
    // beyond the footprint itself
    let ceiling = if count > 0 {
        (sum / count as f64) as f32 + threshold
    } else {
        f32::NAN
    };

    Array2::from_shape_fn((rows, cols), |idx| {
        // NaN elevations fail the comparison and survive only inside
        // the nominal footprint
        current_fp[idx] && (dem[idx] < ceiling || nominal_fp[idx])
    })
}

/// Burn a polygonal geometry into a boolean footprint: a cell is set
/// when its center falls inside the geometry (even-odd rule).
///
/// Point and line geometries have no interior and burn nothing.
pub fn rasterize(
    geometry: &Geometry<f64>,
    transform: &PixelTransform,
    rows: usize,
    cols: usize,
) -> Mask {
    let polygons: Vec<&Polygon<f64>> = match geometry {
        Geometry::Polygon(p) => vec![p],
        Geometry::MultiPolygon(mp) => mp.0.iter().collect(),
        _ => Vec::new(),
    };

    let mut mask = Mask::from_elem((rows, cols), false);
    if polygons.is_empty() {
        return mask;
    }

    let origin_lon = transform.world(0.0, 0.0).0;
    let pixel_width = transform.world(1.0, 0.0).0 - origin_lon;

    for r in 0..rows {
        let (_, y) = transform.pixel_center(r, 0);

        // even-odd scanline: x positions where ring segments cross this row
        let mut crossings: Vec<f64> = Vec::new();
        for polygon in &polygons {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                let pts = &ring.0;
                for w in pts.windows(2) {
                    let (x0, y0) = (w[0].x, w[0].y);
                    let (x1, y1) = (w[1].x, w[1].y);
                    if (y0 > y) != (y1 > y) {
                        crossings.push(x0 + (y - y0) / (y1 - y0) * (x1 - x0));
                    }
                }
            }
        }

        crossings.sort_by(|a, b| a.partial_cmp(b).expect("finite crossings"));

        for pair in crossings.chunks_exact(2) {
            // strictly-interior pixel centers between the crossing pair
            let c_first = ((pair[0] - origin_lon) / pixel_width - 0.5).floor() as i64 + 1;
            let c_last = ((pair[1] - origin_lon) / pixel_width - 0.5).ceil() as i64 - 1;
            let c_first = c_first.max(0);
            let c_last = c_last.min(cols as i64 - 1);
            for c in c_first..=c_last {
                mask[[r, c as usize]] = true;
            }
        }
    }

    mask
}
