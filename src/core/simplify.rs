//! Iterative polygon simplification bounding WKT size for storage and
//! transport.

use geo::{Geometry, Simplify};
use wkt::ToWkt;

/// Simplification-factor increment per iteration, degrees.
pub const DEFAULT_STEP: f64 = 0.0001;

/// Default WKT character budget.
pub const DEFAULT_WKT_BUDGET: usize = 20_000;

/// Consecutive non-shrinking iterations tolerated before giving up.
const MAX_STALL: usize = 16;

/// Hard iteration cap; factor growth makes reaching it pathological.
const MAX_ITERATIONS: usize = 10_000;

/// Douglas-Peucker-simplify (not topology-preserving) with a factor
/// starting at zero and growing by `step` per iteration, until the WKT
/// serialization fits the character budget.
///
/// Geometries that cannot shed vertices (points, or polygons already at
/// their minimal ring) terminate through the stall guard; the best
/// geometry reached so far is returned.
pub fn simplify_to_budget(geometry: Geometry<f64>, budget: usize, step: f64) -> Geometry<f64> {
    let mut geometry = geometry;
    let mut factor = 0.0;
    let mut last_len = usize::MAX;
    let mut stall = 0usize;

    for iteration in 0..MAX_ITERATIONS {
        let len = geometry.wkt_string().len();
        if len <= budget {
            if iteration > 0 {
                log::debug!(
                    "simplified to {} WKT chars in {} iterations (factor {})",
                    len,
                    iteration,
                    factor
                );
            }
            return geometry;
        }

        if len >= last_len {
            stall += 1;
            if stall >= MAX_STALL {
                log::warn!(
                    "geometry stuck at {} WKT chars above budget {}, keeping it",
                    len,
                    budget
                );
                return geometry;
            }
        } else {
            stall = 0;
        }
        last_len = len;

        geometry = match geometry {
            Geometry::Polygon(p) => Geometry::Polygon(p.simplify(&factor)),
            Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(&factor)),
            // nothing to shed on points or lines
            other => return other,
        };
        factor += step;
    }

    geometry
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, Polygon};

    fn dense_circle(vertices: usize) -> Polygon<f64> {
        let ring: Vec<(f64, f64)> = (0..vertices)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / vertices as f64;
                (angle.cos(), angle.sin())
            })
            .collect();
        Polygon::new(ring.into(), vec![])
    }

    #[test]
    fn shrinks_below_budget() {
        let polygon = dense_circle(500);
        let initial = polygon.wkt_string().len();
        let budget = initial / 4;

        let simplified = simplify_to_budget(Geometry::Polygon(polygon), budget, DEFAULT_STEP);
        let final_len = simplified.wkt_string().len();
        assert!(final_len <= budget, "{} > {}", final_len, budget);
    }

    #[test]
    fn never_grows_the_serialization() {
        let polygon = dense_circle(300);
        let initial = polygon.wkt_string().len();
        let simplified = simplify_to_budget(Geometry::Polygon(polygon), 1, DEFAULT_STEP);
        assert!(simplified.wkt_string().len() <= initial);
    }

    #[test]
    fn point_geometry_terminates_immediately() {
        let point = Geometry::Point(Point::new(0.0, 0.0));
        let out = simplify_to_budget(point.clone(), 1, DEFAULT_STEP);
        assert_eq!(out, point);
    }

    #[test]
    fn geometry_within_budget_is_untouched() {
        let polygon = dense_circle(20);
        let before = polygon.wkt_string();
        let out = simplify_to_budget(
            Geometry::Polygon(polygon),
            DEFAULT_WKT_BUDGET,
            DEFAULT_STEP,
        );
        assert_eq!(out.wkt_string(), before);
    }

    #[test]
    fn impossible_budget_still_terminates() {
        // the minimal ring cannot fit one character; the stall guard
        // must end the loop
        let polygon = dense_circle(100);
        let out = simplify_to_budget(Geometry::Polygon(polygon), 1, DEFAULT_STEP);
        assert!(matches!(out, Geometry::Polygon(_)));
    }
}
