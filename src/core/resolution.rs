//! Acquisition-frame planning: bounding box and pixel-resolution choice
//! for a nominal water-body outline.

use geo::{BoundingRect, MultiPolygon};

use crate::types::{BoundingBox, GeoFrame, WaterError, WaterResult};

/// Approximate meters per degree of latitude on the WGS84 sphere.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Coarsest acceptable pixel size quantum, meters.
const RESOLUTION_STEP_M: u32 = 10;

/// Cloud classification does not need fine resolution and must stay cheap.
const CLOUD_RESOLUTION_FLOOR_M: u32 = 80;

/// Default bounding-box inflation fraction per side.
pub const DEFAULT_INFLATE: f64 = 0.1;

/// Axis-aligned bounds of the nominal outline, inflated by `inflate` of
/// the width/height on each side so the acquisition window keeps
/// shoreline context beyond the outline itself.
pub fn inflated_bbox(nominal: &MultiPolygon<f64>, inflate: f64) -> WaterResult<BoundingBox> {
    let rect = nominal.bounding_rect().ok_or_else(|| {
        WaterError::InvalidGeometry("nominal polygon has no bounding rectangle".to_string())
    })?;

    let dx = rect.width() * inflate;
    let dy = rect.height() * inflate;

    BoundingBox::new(
        rect.min().x - dx,
        rect.min().y - dy,
        rect.max().x + dx,
        rect.max().y + dy,
    )
}

/// Coarsest 10 m-multiple resolution keeping the rendered box below
/// 5000x5000 pixels, computed independently per axis from the box's
/// meter extents at its mid-latitude.
pub fn optimal_resolution(bbox: &BoundingBox) -> (u32, u32) {
    let x_meters = bbox.width() * METERS_PER_DEGREE * bbox.mid_lat().to_radians().cos();
    let y_meters = bbox.height() * METERS_PER_DEGREE;

    (axis_resolution(x_meters), axis_resolution(y_meters))
}

fn axis_resolution(meters: f64) -> u32 {
    // res * 5000 >= meters, quantized upward to the 10 m grid
    let steps = ((meters - 1.0) / (5000.0 * RESOLUTION_STEP_M as f64)) as i64 + 1;
    (steps.max(1) as u32) * RESOLUTION_STEP_M
}

/// Clamp a detection resolution to the 80 m floor used for cloud
/// screening.
pub fn cloud_resolution(res_x: u32, res_y: u32) -> (u32, u32) {
    (
        res_x.max(CLOUD_RESOLUTION_FLOOR_M),
        res_y.max(CLOUD_RESOLUTION_FLOOR_M),
    )
}

/// Plan the acquisition frame for a nominal outline: inflated bounding
/// box at its optimal resolution.
pub fn plan_frame(nominal: &MultiPolygon<f64>, inflate: f64) -> WaterResult<GeoFrame> {
    let bbox = inflated_bbox(nominal, inflate)?;
    let (res_x, res_y) = optimal_resolution(&bbox);

    log::debug!(
        "planned frame: bbox ({:.4}, {:.4}) - ({:.4}, {:.4}) at {}x{} m",
        bbox.min_lon,
        bbox.min_lat,
        bbox.max_lon,
        bbox.max_lat,
        res_x,
        res_y
    );

    GeoFrame::new(bbox, res_x, res_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn square_10_deg() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn bbox_inflation_adds_a_tenth_per_side() {
        let bbox = inflated_bbox(&square_10_deg(), 0.1).unwrap();
        assert_relative_eq!(bbox.min_lon, -1.0);
        assert_relative_eq!(bbox.min_lat, -1.0);
        assert_relative_eq!(bbox.max_lon, 11.0);
        assert_relative_eq!(bbox.max_lat, 11.0);
    }

    #[test]
    fn small_box_gets_finest_resolution() {
        // ~5 km box at the equator fits in 5000 px at 10 m
        let bbox = BoundingBox::new(0.0, 0.0, 0.045, 0.045).unwrap();
        assert_eq!(optimal_resolution(&bbox), (10, 10));
    }

    #[test]
    fn resolution_keeps_raster_below_limit() {
        for deg in [0.04, 0.5, 1.0, 3.0, 8.0] {
            let bbox = BoundingBox::new(0.0, 0.0, deg, deg).unwrap();
            let (res_x, res_y) = optimal_resolution(&bbox);
            assert_eq!(res_x % 10, 0);
            assert_eq!(res_y % 10, 0);

            let y_meters = bbox.height() * METERS_PER_DEGREE;
            assert!(y_meters / res_y as f64 <= 5000.0);
            let x_meters = bbox.width() * METERS_PER_DEGREE * bbox.mid_lat().to_radians().cos();
            assert!(x_meters / res_x as f64 <= 5000.0);
        }
    }

    #[test]
    fn longitude_axis_shrinks_with_latitude() {
        // the same degree extent spans fewer meters at 60N
        let equator = BoundingBox::new(0.0, -0.5, 8.0, 0.5).unwrap();
        let north = BoundingBox::new(0.0, 59.5, 8.0, 60.5).unwrap();
        let (eq_x, _) = optimal_resolution(&equator);
        let (n_x, _) = optimal_resolution(&north);
        assert!(n_x <= eq_x);
    }

    #[test]
    fn cloud_resolution_floors_at_80() {
        assert_eq!(cloud_resolution(10, 10), (80, 80));
        assert_eq!(cloud_resolution(80, 30), (80, 80));
        assert_eq!(cloud_resolution(120, 90), (120, 90));
    }

    #[test]
    fn planned_frame_is_valid() {
        let frame = plan_frame(&square_10_deg(), DEFAULT_INFLATE).unwrap();
        assert!(frame.res_x % 10 == 0 && frame.res_x > 0);
        assert!(frame.res_y % 10 == 0 && frame.res_y > 0);
        assert_relative_eq!(frame.bbox.min_lon, -1.0);
    }
}
