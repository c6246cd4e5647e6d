//! Edge detection and morphology building blocks for the threshold
//! selector: Gaussian smoothing, Sobel gradients, non-maximum
//! suppression, hysteresis linking and disk dilation, all on
//! `Array2<f32>` grids with replicated borders.

use ndarray::Array2;

use crate::types::{Mask, Raster};

/// Canny-style edge detector.
///
/// `low` and `high` are absolute magnitude thresholds; callers normalize
/// the input to [0, 1] first so the defaults carry across scenes.
pub fn canny(image: &Raster, sigma: f32, low: f32, high: f32) -> Mask {
    let (rows, cols) = image.dim();
    if rows < 3 || cols < 3 {
        return Mask::from_elem((rows, cols), false);
    }

    let smoothed = gaussian_blur(image, sigma);
    let (gx, gy) = sobel_gradients(&smoothed);

    let mut mag = Array2::<f32>::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            mag[[r, c]] = (gx[[r, c]].powi(2) + gy[[r, c]].powi(2)).sqrt();
        }
    }

    let thin = non_maximum_suppression(&mag, &gx, &gy);
    hysteresis(&thin, low, high)
}

/// Separable Gaussian blur with replicated borders.
pub fn gaussian_blur(image: &Raster, sigma: f32) -> Raster {
    let kernel = gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let (rows, cols) = image.dim();

    let clamp = |v: i64, hi: usize| v.clamp(0, hi as i64 - 1) as usize;

    // horizontal pass
    let mut tmp = Array2::<f32>::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let cc = clamp(c as i64 + k as i64 - radius as i64, cols);
                acc += w * image[[r, cc]];
            }
            tmp[[r, c]] = acc;
        }
    }

    // vertical pass
    let mut out = Array2::<f32>::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let rr = clamp(r as i64 + k as i64 - radius as i64, rows);
                acc += w * tmp[[rr, c]];
            }
            out[[r, c]] = acc;
        }
    }

    out
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let sigma = sigma.max(0.1);
    let radius = (3.0 * sigma).ceil() as usize;
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|k| {
            let d = k as f32 - radius as f32;
            (-d * d / denom).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

/// 3x3 Sobel derivatives with replicated borders.
pub fn sobel_gradients(image: &Raster) -> (Raster, Raster) {
    const KX: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
    const KY: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

    let (rows, cols) = image.dim();
    let mut gx = Array2::<f32>::zeros((rows, cols));
    let mut gy = Array2::<f32>::zeros((rows, cols));

    for r in 0..rows {
        let rm = r.saturating_sub(1);
        let rp = (r + 1).min(rows - 1);
        let rr = [rm, r, rp];
        for c in 0..cols {
            let cm = c.saturating_sub(1);
            let cp = (c + 1).min(cols - 1);
            let cc = [cm, c, cp];

            let mut sx = 0.0;
            let mut sy = 0.0;
            for (i, &ri) in rr.iter().enumerate() {
                for (j, &cj) in cc.iter().enumerate() {
                    let v = image[[ri, cj]];
                    sx += KX[i][j] * v;
                    sy += KY[i][j] * v;
                }
            }
            gx[[r, c]] = sx;
            gy[[r, c]] = sy;
        }
    }

    (gx, gy)
}

/// Keep only local magnitude maxima along the (4-way quantized) gradient
/// direction.
fn non_maximum_suppression(mag: &Raster, gx: &Raster, gy: &Raster) -> Raster {
    let (rows, cols) = mag.dim();
    let mut out = Array2::<f32>::zeros((rows, cols));

    for r in 1..rows - 1 {
        for c in 1..cols - 1 {
            let m = mag[[r, c]];
            if m == 0.0 {
                continue;
            }

            let angle = gy[[r, c]].atan2(gx[[r, c]]).to_degrees();
            let angle = if angle < 0.0 { angle + 180.0 } else { angle };

            // neighbor pair along the gradient direction
            let (n1, n2) = if !(22.5..157.5).contains(&angle) {
                (mag[[r, c - 1]], mag[[r, c + 1]])
            } else if angle < 67.5 {
                (mag[[r - 1, c + 1]], mag[[r + 1, c - 1]])
            } else if angle < 112.5 {
                (mag[[r - 1, c]], mag[[r + 1, c]])
            } else {
                (mag[[r - 1, c - 1]], mag[[r + 1, c + 1]])
            };

            if m >= n1 && m >= n2 {
                out[[r, c]] = m;
            }
        }
    }

    out
}

/// Double-threshold hysteresis: seeds above `high`, grown through
/// 8-connected pixels above `low`.
fn hysteresis(mag: &Raster, low: f32, high: f32) -> Mask {
    let (rows, cols) = mag.dim();
    let mut edges = Mask::from_elem((rows, cols), false);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            if mag[[r, c]] > high && !edges[[r, c]] {
                edges[[r, c]] = true;
                stack.push((r, c));

                while let Some((sr, sc)) = stack.pop() {
                    for dr in -1i64..=1 {
                        for dc in -1i64..=1 {
                            let nr = sr as i64 + dr;
                            let nc = sc as i64 + dc;
                            if nr < 0 || nc < 0 || nr >= rows as i64 || nc >= cols as i64 {
                                continue;
                            }
                            let (nr, nc) = (nr as usize, nc as usize);
                            if !edges[[nr, nc]] && mag[[nr, nc]] > low {
                                edges[[nr, nc]] = true;
                                stack.push((nr, nc));
                            }
                        }
                    }
                }
            }
        }
    }

    edges
}

/// Offsets of a disk-shaped structuring element of the given radius.
pub fn disk_offsets(radius: usize) -> Vec<(i64, i64)> {
    let r = radius as i64;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc <= r2 {
                offsets.push((dr, dc));
            }
        }
    }
    offsets
}

/// Morphological dilation by a disk of the given radius.
pub fn binary_dilation(mask: &Mask, radius: usize) -> Mask {
    let (rows, cols) = mask.dim();
    let offsets = disk_offsets(radius);
    let mut out = Mask::from_elem((rows, cols), false);

    for r in 0..rows {
        for c in 0..cols {
            if !mask[[r, c]] {
                continue;
            }
            for &(dr, dc) in &offsets {
                let nr = r as i64 + dr;
                let nc = c as i64 + dc;
                if nr >= 0 && nc >= 0 && nr < rows as i64 && nc < cols as i64 {
                    out[[nr as usize, nc as usize]] = true;
                }
            }
        }
    }

    out
}
