// src/warp.rs
//
// Fixed planar homography between the camera view and the bird's-eye view.
// Both transforms are computed once at session start from the configured
// quadrilaterals; per-frame work is a single warp_perspective each way.

use crate::types::WarpConfig;
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point2f, Scalar, Vector},
    imgproc,
    prelude::*,
};

pub struct Warper {
    forward: Mat,
    inverse: Mat,
}

impl Warper {
    pub fn new(config: &WarpConfig) -> Result<Self> {
        let src = quad_points(&config.src);
        let dst = quad_points(&config.dst);

        let forward = imgproc::get_perspective_transform(&src, &dst, core::DECOMP_LU)?;
        let inverse = imgproc::get_perspective_transform(&dst, &src, core::DECOMP_LU)?;
        Ok(Self { forward, inverse })
    }

    /// Camera view → bird's-eye view.
    pub fn warp(&self, image: &Mat) -> Result<Mat> {
        self.apply(image, &self.forward)
    }

    /// Bird's-eye view → camera view.
    pub fn unwarp(&self, image: &Mat) -> Result<Mat> {
        self.apply(image, &self.inverse)
    }

    fn apply(&self, image: &Mat, matrix: &Mat) -> Result<Mat> {
        let mut warped = Mat::default();
        imgproc::warp_perspective(
            image,
            &mut warped,
            matrix,
            image.size()?,
            imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            Scalar::default(),
        )?;
        Ok(warped)
    }
}

fn quad_points(quad: &[[f32; 2]; 4]) -> Vector<Point2f> {
    quad.iter().map(|p| Point2f::new(p[0], p[1])).collect()
}
