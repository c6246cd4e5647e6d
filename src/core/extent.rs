//! Raster-to-vector water-extent extraction.
//!
//! Connected `true` regions of a binary mask are traced into polygons
//! (exterior rings plus holes) under the frame's affine transform,
//! filtered against the nominal outline, unioned and optionally
//! simplified.

use std::collections::HashMap;

use geo::{BooleanOps, Geometry, Intersects, MultiPolygon, Point, Polygon};
use wkt::ToWkt;

use crate::core::simplify;
use crate::types::{GeoFrame, Mask};

/// North-up affine transform mapping fractional pixel coordinates
/// (col, row) to world coordinates, built from a frame's corners and the
/// raster shape.
#[derive(Debug, Clone, Copy)]
pub struct PixelTransform {
    origin_lon: f64,
    origin_lat: f64,
    pixel_width: f64,
    pixel_height: f64,
}

impl PixelTransform {
    pub fn from_frame(frame: &GeoFrame, rows: usize, cols: usize) -> Self {
        let bbox = &frame.bbox;
        Self {
            origin_lon: bbox.min_lon,
            origin_lat: bbox.max_lat,
            pixel_width: bbox.width() / cols.max(1) as f64,
            pixel_height: bbox.height() / rows.max(1) as f64,
        }
    }

    /// World position of fractional pixel coordinates; row 0 is the
    /// northern edge.
    pub fn world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_lon + col * self.pixel_width,
            self.origin_lat - row * self.pixel_height,
        )
    }

    /// Center of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.world(col as f64 + 0.5, row as f64 + 0.5)
    }
}

/// Cap on the simplification budget derived from the nominal outline.
const MAX_WKT_BUDGET: usize = 100_000;

/// Extract the measured water extent from a binary mask.
///
/// Returns a polygon or multi-polygon geometry, or a degenerate
/// zero-area point at the origin when the mask contains no water
/// touching the nominal outline (zero water level, not an error).
pub fn extract(
    mask: &Mask,
    nominal: &MultiPolygon<f64>,
    frame: &GeoFrame,
    simplify_output: bool,
) -> Geometry<f64> {
    let (rows, cols) = mask.dim();
    let transform = PixelTransform::from_frame(frame, rows, cols);

    let polygons = vectorize_mask(mask, &transform);
    if polygons.is_empty() {
        log::debug!("empty water mask, returning degenerate point extent");
        return Geometry::Point(Point::new(0.0, 0.0));
    }

    // drop unrelated water bodies that happen to fall inside the frame
    let retained: Vec<Polygon<f64>> = polygons
        .into_iter()
        .filter(|p| p.intersects(nominal))
        .collect();

    if retained.is_empty() {
        log::debug!("no vectorized region intersects the nominal outline");
        return Geometry::Point(Point::new(0.0, 0.0));
    }

    // union the survivors; the boolean overlay also resolves any shared
    // boundaries or self-intersections in one pass
    let mut union = MultiPolygon::new(vec![retained[0].clone()]);
    for polygon in &retained[1..] {
        union = union.union(&MultiPolygon::new(vec![polygon.clone()]));
    }

    let mut extent: Geometry<f64> = if union.0.len() == 1 {
        Geometry::Polygon(union.0.into_iter().next().unwrap())
    } else {
        Geometry::MultiPolygon(union)
    };

    if simplify_output {
        // more complex nominal shapes earn a larger vertex budget
        let budget = MAX_WKT_BUDGET.min(100 * nominal.wkt_string().len());
        extent = simplify::simplify_to_budget(extent, budget, simplify::DEFAULT_STEP);
    }

    extent
}

/// A directed boundary edge between a water pixel and its non-water
/// neighbor, in integer pixel-corner coordinates.
#[derive(Debug, Clone, Copy)]
struct BoundaryEdge {
    start: (i64, i64),
    end: (i64, i64),
    /// The non-water cell across this edge (row, col); for hole rings
    /// this cell lies strictly inside the ring.
    outside: (i64, i64),
}

/// Trace connected `true` regions (4-connectivity) into polygons with
/// holes, mapped through the transform.
pub fn vectorize_mask(mask: &Mask, transform: &PixelTransform) -> Vec<Polygon<f64>> {
    let rings = trace_rings(mask);
    if rings.is_empty() {
        return Vec::new();
    }

    // positive pixel-space signed area = exterior, negative = hole
    let mut exteriors: Vec<(Vec<(i64, i64)>, f64)> = Vec::new();
    let mut holes: Vec<(Vec<(i64, i64)>, (i64, i64))> = Vec::new();

    for (ring, inner_cell) in rings {
        let area = ring_signed_area(&ring);
        if area > 0.0 {
            exteriors.push((ring, area));
        } else {
            holes.push((ring, inner_cell));
        }
    }

    // attach each hole to the smallest exterior containing its interior
    // land-cell center
    let mut hole_assignment: Vec<Vec<Vec<(i64, i64)>>> = vec![Vec::new(); exteriors.len()];
    for (ring, (hr, hc)) in holes {
        let probe = (hc as f64 + 0.5, hr as f64 + 0.5);
        let mut best: Option<(usize, f64)> = None;
        for (i, (exterior, area)) in exteriors.iter().enumerate() {
            if point_in_ring(probe, exterior) {
                match best {
                    Some((_, best_area)) if best_area <= *area => {}
                    _ => best = Some((i, *area)),
                }
            }
        }
        if let Some((i, _)) = best {
            hole_assignment[i].push(ring);
        } else {
            log::warn!("hole ring without a containing exterior, dropped");
        }
    }

    exteriors
        .into_iter()
        .zip(hole_assignment)
        .map(|((exterior, _), interior_rings)| {
            let shell = ring_to_world(&exterior, transform);
            let interiors = interior_rings
                .iter()
                .map(|r| ring_to_world(r, transform))
                .collect();
            Polygon::new(shell, interiors)
        })
        .collect()
}

/// Collect directed boundary edges and chain them into closed rings.
/// Every edge keeps the interior on a fixed side, so rings of separate
/// 4-connected regions never merge, including at diagonal touch points.
fn trace_rings(mask: &Mask) -> Vec<(Vec<(i64, i64)>, (i64, i64))> {
    let (rows, cols) = mask.dim();
    let at = |r: i64, c: i64| -> bool {
        r >= 0 && c >= 0 && r < rows as i64 && c < cols as i64 && mask[[r as usize, c as usize]]
    };

    let mut edges: Vec<BoundaryEdge> = Vec::new();
    for r in 0..rows as i64 {
        for c in 0..cols as i64 {
            if !at(r, c) {
                continue;
            }
            if !at(r - 1, c) {
                edges.push(BoundaryEdge {
                    start: (c, r),
                    end: (c + 1, r),
                    outside: (r - 1, c),
                });
            }
            if !at(r, c + 1) {
                edges.push(BoundaryEdge {
                    start: (c + 1, r),
                    end: (c + 1, r + 1),
                    outside: (r, c + 1),
                });
            }
            if !at(r + 1, c) {
                edges.push(BoundaryEdge {
                    start: (c + 1, r + 1),
                    end: (c, r + 1),
                    outside: (r + 1, c),
                });
            }
            if !at(r, c - 1) {
                edges.push(BoundaryEdge {
                    start: (c, r + 1),
                    end: (c, r),
                    outside: (r, c - 1),
                });
            }
        }
    }

    let mut by_start: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        by_start.entry(e.start).or_default().push(i);
    }

    let direction = |e: &BoundaryEdge| (e.end.0 - e.start.0, e.end.1 - e.start.1);
    let cross = |a: (i64, i64), b: (i64, i64)| a.0 * b.1 - a.1 * b.0;

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }

        let origin = edges[first].start;
        let inner_cell = edges[first].outside;
        let mut ring: Vec<(i64, i64)> = vec![origin];
        let mut current = first;
        used[first] = true;

        loop {
            let head = edges[current].end;
            if head == origin {
                break;
            }

            let dir_in = direction(&edges[current]);
            let next = by_start
                .get(&head)
                .and_then(|candidates| {
                    candidates
                        .iter()
                        .filter(|&&i| !used[i])
                        .max_by_key(|&&i| cross(dir_in, direction(&edges[i])))
                        .copied()
                });

            let Some(next) = next else {
                // boundary edges always chain into closed loops; an open
                // chain would mean the emission pass above is inconsistent
                log::warn!("open boundary chain at vertex {:?}, ring dropped", head);
                ring.clear();
                break;
            };

            // merge collinear runs as we go: a vertex where the
            // direction does not change carries no shape
            let dir_out = direction(&edges[next]);
            if dir_in != dir_out {
                ring.push(head);
            }

            used[next] = true;
            current = next;
        }

        // the origin itself may sit mid-run; drop it if collinear, by
        // direction since the adjacent runs may have unequal lengths
        if ring.len() >= 4 {
            let prev = ring[ring.len() - 1];
            let next = ring[1];
            let a = ((origin.0 - prev.0).signum(), (origin.1 - prev.1).signum());
            let b = ((next.0 - origin.0).signum(), (next.1 - origin.1).signum());
            if a == b {
                ring.remove(0);
            }
        }

        if ring.len() >= 3 {
            rings.push((ring, inner_cell));
        }
    }

    rings
}

fn ring_signed_area(ring: &[(i64, i64)]) -> f64 {
    let n = ring.len();
    let mut sum = 0i64;
    for i in 0..n {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % n];
        sum += x0 * y1 - x1 * y0;
    }
    sum as f64 / 2.0
}

/// Even-odd point-in-ring test in pixel coordinates.
fn point_in_ring(point: (f64, f64), ring: &[(i64, i64)]) -> bool {
    let (px, py) = point;
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let (x0, y0) = (ring[i].0 as f64, ring[i].1 as f64);
        let (x1, y1) = (ring[(i + 1) % n].0 as f64, ring[(i + 1) % n].1 as f64);
        if (y0 > py) != (y1 > py) {
            let x_cross = x0 + (py - y0) / (y1 - y0) * (x1 - x0);
            if px < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn ring_to_world(ring: &[(i64, i64)], transform: &PixelTransform) -> geo::LineString<f64> {
    ring.iter()
        .map(|&(col, row)| transform.world(col as f64, row as f64))
        .collect::<Vec<(f64, f64)>>()
        .into()
}
