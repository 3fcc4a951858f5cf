// src/fitting.rs
//
// Quadratic least squares over centroid observations, and the physical-unit
// measurements derived from a pair of fits: per-side radius of curvature and
// the vehicle's lateral offset from lane center.
//
// Fits use y as the independent variable, x = a·y² + b·y + c, because lane
// lines in the bird's-eye view are near-vertical: x(y) stays a function
// where y(x) would not.

use crate::types::{CentroidObservation, FitCoefficients, LaneMeasurement};

/// A quadratic needs more than 2 samples; callers gate on this before
/// asking for a fit.
pub const MIN_FIT_SAMPLES: usize = 3;

/// Floor on |2A| when evaluating the curvature radius. A perfectly straight
/// fit then yields a huge finite radius instead of a division by zero, and
/// the display layer renders it as "Straight".
const CURVATURE_DENOMINATOR_FLOOR: f64 = 1e-12;

/// Meter-per-pixel scale of the bird's-eye view.
#[derive(Debug, Clone, Copy)]
pub struct GeometryParams {
    pub image_width: f64,
    pub image_height: f64,
    pub ym_per_pix: f64,
    pub xm_per_pix: f64,
}

impl Default for GeometryParams {
    fn default() -> Self {
        // US highway lane: ~30 m of road over 720 warped rows, 3.7 m of
        // lane width over ~700 warped columns.
        Self {
            image_width: 1280.0,
            image_height: 720.0,
            ym_per_pix: 30.0 / 720.0,
            xm_per_pix: 3.7 / 700.0,
        }
    }
}

impl GeometryParams {
    pub fn from_frame_dims(width: i32, height: i32) -> Self {
        Self {
            image_width: width as f64,
            image_height: height as f64,
            ..Self::default()
        }
    }
}

/// Least-squares fit of x = a·y² + b·y + c over an observation.
///
/// Returns None when the observation has fewer than [`MIN_FIT_SAMPLES`]
/// samples or the normal equations are singular (all samples on one scan
/// row, for example). Callers treat None as a degenerate fit and keep the
/// frame out of the histories.
pub fn fit_centroids(observation: &CentroidObservation) -> Option<FitCoefficients> {
    if observation.len() < MIN_FIT_SAMPLES {
        return None;
    }

    let n = observation.len() as f64;

    // Standardize y before building the normal equations. Raw pixel y spans
    // hundreds while the constant column is O(1), which wrecks the
    // conditioning of the 3×3 system; in u = (y - ȳ)/σ every power sum is
    // O(n) and singularity detection is trustworthy.
    let y_mean = observation.iter().map(|s| s.y as f64).sum::<f64>() / n;
    let y_var =
        observation.iter().map(|s| (s.y as f64 - y_mean).powi(2)).sum::<f64>() / n;
    let y_std = y_var.sqrt();
    if y_std < 1e-9 {
        return None; // All samples on one scan row.
    }

    let (mut s1, mut s2, mut s3, mut s4) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    let (mut sx0, mut sx1, mut sx2) = (0.0f64, 0.0f64, 0.0f64);

    for sample in observation {
        let x = sample.x as f64;
        let u = (sample.y as f64 - y_mean) / y_std;
        let u2 = u * u;
        s1 += u;
        s2 += u2;
        s3 += u2 * u;
        s4 += u2 * u2;
        sx0 += x;
        sx1 += x * u;
        sx2 += x * u2;
    }

    // Normal equations in u:
    //   | s4 s3 s2 | | A |   | sx2 |
    //   | s3 s2 s1 | | B | = | sx1 |
    //   | s2 s1 n  | | C |   | sx0 |
    let (big_a, big_b, big_c) = solve_3x3([s4, s3, s2, s3, s2, s1, s2, s1, n], [sx2, sx1, sx0])?;

    // Map x = A·u² + B·u + C back to raw-y coefficients.
    let a = big_a / (y_std * y_std);
    let b = big_b / y_std - 2.0 * big_a * y_mean / (y_std * y_std);
    let c = big_c - big_b * y_mean / y_std + big_a * y_mean * y_mean / (y_std * y_std);

    if a.is_finite() && b.is_finite() && c.is_finite() {
        Some(FitCoefficients { a, b, c })
    } else {
        None
    }
}

/// Solve a 3×3 linear system via Gaussian elimination with partial
/// pivoting. Matrix is row-major. Returns None when the system is singular
/// relative to its own magnitude.
fn solve_3x3(mat: [f64; 9], rhs: [f64; 3]) -> Option<(f64, f64, f64)> {
    let mut m = [
        [mat[0], mat[1], mat[2], rhs[0]],
        [mat[3], mat[4], mat[5], rhs[1]],
        [mat[6], mat[7], mat[8], rhs[2]],
    ];

    let scale = mat.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let eps = (scale * 1e-10).max(f64::MIN_POSITIVE);

    for col in 0..3 {
        let mut pivot_row = col;
        let mut pivot_val = m[col][col].abs();
        for row in (col + 1)..3 {
            if m[row][col].abs() > pivot_val {
                pivot_val = m[row][col].abs();
                pivot_row = row;
            }
        }
        if pivot_val < eps {
            return None;
        }
        if pivot_row != col {
            m.swap(col, pivot_row);
        }
        for row in (col + 1)..3 {
            let factor = m[row][col] / m[col][col];
            for j in col..4 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    if m[2][2].abs() < eps {
        return None;
    }
    let c = m[2][3] / m[2][2];
    let b = (m[1][3] - m[1][2] * c) / m[1][1];
    let a = (m[0][3] - m[0][2] * c - m[0][1] * b) / m[0][0];

    if a.is_finite() && b.is_finite() && c.is_finite() {
        Some((a, b, c))
    } else {
        None
    }
}

/// Radius of curvature of a world-space fit, evaluated at world y
/// (the row nearest the vehicle): (1 + (2Ay + B)²)^{3/2} / |2A|.
fn radius_of_curvature(fit: &FitCoefficients, y_world: f64) -> f64 {
    let slope = 2.0 * fit.a * y_world + fit.b;
    let numerator = (1.0 + slope * slope).powf(1.5);
    numerator / (2.0 * fit.a).abs().max(CURVATURE_DENOMINATOR_FLOOR)
}

/// Refit a pixel-space observation in world units (meters).
fn fit_world(observation: &CentroidObservation, geom: &GeometryParams) -> Option<FitCoefficients> {
    let scaled: CentroidObservation = observation
        .iter()
        .map(|s| crate::types::CentroidSample {
            x: (s.x as f64 * geom.xm_per_pix) as f32,
            y: (s.y as f64 * geom.ym_per_pix) as f32,
        })
        .collect();
    fit_centroids(&scaled)
}

/// Per-side radius of curvature and vehicle offset for one frame.
///
/// Both observations must satisfy the >2-sample precondition; any singular
/// fit makes the whole measurement None, so a frame either yields a full
/// measurement or nothing.
pub fn measure(
    left: &CentroidObservation,
    right: &CentroidObservation,
    geom: &GeometryParams,
) -> Option<LaneMeasurement> {
    let y_eval_world = geom.image_height * geom.ym_per_pix;
    let left_roc = radius_of_curvature(&fit_world(left, geom)?, y_eval_world);
    let right_roc = radius_of_curvature(&fit_world(right, geom)?, y_eval_world);

    // Lane center at the image bottom, from pixel-space fits.
    let left_fit = fit_centroids(left)?;
    let right_fit = fit_centroids(right)?;
    let lane_center_px =
        (left_fit.x_at(geom.image_height) + right_fit.x_at(geom.image_height)) / 2.0;
    let vehicle_center_px = geom.image_width / 2.0;

    // Positive: vehicle sits right of lane center.
    let offset_m = (vehicle_center_px - lane_center_px) * geom.xm_per_pix;

    Some(LaneMeasurement {
        left_roc,
        right_roc,
        offset_m,
    })
}
