//! Iterative subpixel refinement of X-corners.
//!
//! At the true saddle point every image gradient inside the support window
//! is orthogonal to the vector from the saddle to the gradient sample. Each
//! iteration solves the 2×2 weighted least-squares system built from that
//! constraint and moves the estimate to its solution.

use crate::params::SubpixParams;
use chesscal_core::{sample_bilinear, GrayImageView, Pt2f};
use log::trace;
use nalgebra::{Matrix2, Point2, Vector2};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Refine every corner in place. Corners whose estimate wanders outside
/// the support window keep their initial position.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(view, corners), fields(num_corners = corners.len()))
)]
pub fn refine_corners(view: &GrayImageView<'_>, corners: &mut [Pt2f], params: &SubpixParams) {
    for p in corners.iter_mut() {
        *p = refine_corner(view, *p, params);
    }
}

/// Refine a single corner estimate.
pub fn refine_corner(view: &GrayImageView<'_>, initial: Pt2f, params: &SubpixParams) -> Pt2f {
    let win = params.half_window as i32;
    if win == 0 {
        return initial;
    }
    let weights = gaussian_weights(win);
    let side = (2 * win + 1) as usize;
    let eps_sq = params.epsilon * params.epsilon;

    let mut current = initial;
    for iter in 0..params.max_iters.max(1) {
        let mut m = Matrix2::<f32>::zeros();
        let mut rhs = Vector2::<f32>::zeros();

        for dy in -win..=win {
            for dx in -win..=win {
                let x = current.x + dx as f32;
                let y = current.y + dy as f32;
                let gx = 0.5 * (sample_bilinear(view, x + 1.0, y) - sample_bilinear(view, x - 1.0, y));
                let gy = 0.5 * (sample_bilinear(view, x, y + 1.0) - sample_bilinear(view, x, y - 1.0));
                let w = weights[(dy + win) as usize * side + (dx + win) as usize];

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                m[(0, 0)] += gxx;
                m[(0, 1)] += gxy;
                m[(1, 1)] += gyy;
                // Offsets relative to `current` keep the sums well scaled.
                rhs.x += gxx * dx as f32 + gxy * dy as f32;
                rhs.y += gxy * dx as f32 + gyy * dy as f32;
            }
        }
        m[(1, 0)] = m[(0, 1)];

        let Some(inv) = m.try_inverse() else {
            trace!("singular gradient matrix at ({:.2}, {:.2})", current.x, current.y);
            break;
        };
        let step = inv * rhs;
        current = Point2::new(current.x + step.x, current.y + step.y);

        if step.norm_squared() <= eps_sq {
            trace!("subpix converged after {} iterations", iter + 1);
            break;
        }
    }

    let moved = current - initial;
    if moved.x.abs() > win as f32 || moved.y.abs() > win as f32 || !moved.x.is_finite() || !moved.y.is_finite() {
        return initial;
    }
    current
}

/// Separable Gaussian mask over the `(2·win + 1)²` window, row-major.
fn gaussian_weights(win: i32) -> Vec<f32> {
    let coeff = 1.0 / (win * win) as f32;
    let profile: Vec<f32> = (-win..=win)
        .map(|d| (-((d * d) as f32) * coeff).exp())
        .collect();
    profile
        .iter()
        .flat_map(|wy| profile.iter().map(move |wx| wx * wy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Anti-aliased X-corner with the saddle at `(cx, cy)`; pixel centers
    /// sit on integer coordinates.
    fn render_x_corner(w: usize, h: usize, cx: f32, cy: f32) -> Vec<u8> {
        const SS: usize = 8;
        let mut img = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0f32;
                for sy in 0..SS {
                    for sx in 0..SS {
                        let u = x as f32 - 0.5 + (sx as f32 + 0.5) / SS as f32;
                        let v = y as f32 - 0.5 + (sy as f32 + 0.5) / SS as f32;
                        if (u - cx) * (v - cy) > 0.0 {
                            acc += 1.0;
                        }
                    }
                }
                img[y * w + x] = (255.0 * acc / (SS * SS) as f32).round() as u8;
            }
        }
        img
    }

    #[test]
    fn converges_to_saddle_point() {
        let (w, h) = (40, 40);
        let data = render_x_corner(w, h, 20.3, 17.6);
        let view = GrayImageView::new(w, h, &data).unwrap();

        let refined = refine_corner(&view, Point2::new(21.0, 17.0), &SubpixParams::default());
        assert!((refined.x - 20.3).abs() < 0.15, "x = {}", refined.x);
        assert!((refined.y - 17.6).abs() < 0.15, "y = {}", refined.y);
    }

    #[test]
    fn flat_region_keeps_initial_position() {
        let data = vec![128u8; 20 * 20];
        let view = GrayImageView::new(20, 20, &data).unwrap();
        let start = Point2::new(10.0, 10.0);
        assert_eq!(start, refine_corner(&view, start, &SubpixParams::default()));
    }

    #[test]
    fn refines_all_corners_in_place() {
        let (w, h) = (40, 40);
        let data = render_x_corner(w, h, 19.5, 20.25);
        let view = GrayImageView::new(w, h, &data).unwrap();
        let mut corners = vec![Point2::new(19.0, 21.0), Point2::new(20.0, 20.0)];
        refine_corners(&view, &mut corners, &SubpixParams::with_half_window(4));
        for c in corners {
            assert!((c.x - 19.5).abs() < 0.15);
            assert!((c.y - 20.25).abs() < 0.15);
        }
    }

    #[test]
    fn gaussian_mask_peaks_at_center() {
        let weights = gaussian_weights(2);
        assert_eq!(25, weights.len());
        assert!((weights[12] - 1.0).abs() < 1e-6);
        assert!(weights.iter().all(|w| *w <= 1.0 && *w > 0.0));
    }
}
