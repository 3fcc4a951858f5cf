// src/overlay.rs
//
// Final annotated frame: the smoothed lane polygon is drawn in the
// bird's-eye view, warped back into the camera view, blended over the
// frame, and the frame number / offset / radius-of-curvature text is
// stamped on top.

use crate::tracking::{FrameEstimate, RocReading};
use crate::types::FitCoefficients;
use crate::warp::Warper;
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Scalar, Vector, CV_8UC3},
    imgproc,
    prelude::*,
};

/// Vertical step between polygon vertices along each boundary curve.
const CURVE_STEP_PX: i32 = 20;

fn lane_fill() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

fn text_color() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn acquiring_color() -> Scalar {
    Scalar::new(0.0, 255.0, 255.0, 0.0)
}

pub fn render(frame: &Mat, warper: &Warper, estimate: &FrameEstimate) -> Result<Mat> {
    let mut output = frame.try_clone()?;

    if let (Some(left), Some(right)) = (estimate.left_fit, estimate.right_fit) {
        blend_lane_polygon(&mut output, frame, warper, &left, &right)?;
    }

    annotate(&mut output, estimate)?;
    Ok(output)
}

/// Fill the region between the two best-fit curves on a warped blank,
/// unwarp it, and alpha-blend it onto the frame.
fn blend_lane_polygon(
    output: &mut Mat,
    frame: &Mat,
    warper: &Warper,
    left: &FitCoefficients,
    right: &FitCoefficients,
) -> Result<()> {
    let size = frame.size()?;
    let mut canvas = Mat::zeros(size.height, size.width, CV_8UC3)?.to_mat()?;

    // Left boundary top→bottom, right boundary bottom→top: a closed ring.
    let mut ring = Vector::<Point>::new();
    let mut y = 0;
    while y <= size.height {
        ring.push(Point::new(left.x_at(y as f64) as i32, y));
        y += CURVE_STEP_PX;
    }
    let mut y = size.height;
    while y >= 0 {
        ring.push(Point::new(right.x_at(y as f64) as i32, y));
        y -= CURVE_STEP_PX;
    }

    let polygons = Vector::<Vector<Point>>::from_iter([ring]);
    imgproc::fill_poly(
        &mut canvas,
        &polygons,
        lane_fill(),
        imgproc::LINE_8,
        0,
        Point::default(),
    )?;

    let unwarped = warper.unwarp(&canvas)?;
    core::add_weighted(frame, 1.0, &unwarped, 0.5, 0.0, output, -1)?;
    Ok(())
}

fn annotate(output: &mut Mat, estimate: &FrameEstimate) -> Result<()> {
    put_line(
        output,
        &format!("Frame: {}", estimate.frame),
        Point::new(50, 30),
        text_color(),
    )?;

    if !estimate.has_lane() {
        return put_line(
            output,
            "Acquiring lane...",
            Point::new(50, 110),
            acquiring_color(),
        );
    }

    if let Some(offset) = estimate.offset_m {
        put_line(
            output,
            &format!("Offset: {:.2} m.", offset),
            Point::new(50, 110),
            text_color(),
        )?;
    }

    let roc_text = match estimate.roc {
        RocReading::Straight => "RoC: Straight".to_string(),
        RocReading::Meters(roc) => format!("RoC: {:.2} m.", roc),
        RocReading::Acquiring => return Ok(()),
    };
    put_line(output, &roc_text, Point::new(50, 140), text_color())
}

fn put_line(output: &mut Mat, text: &str, origin: Point, color: Scalar) -> Result<()> {
    imgproc::put_text(
        output,
        text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        1.0,
        color,
        2,
        imgproc::LINE_AA,
        false,
    )?;
    Ok(())
}
