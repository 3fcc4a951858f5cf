// src/calibration.rs

use crate::types::CameraConfig;
use anyhow::Result;
use opencv::{calib3d, core::Mat, prelude::*};

/// Camera distortion correction, built once per session from the
/// calibration in config.
pub struct Undistorter {
    camera_matrix: Mat,
    dist_coeffs: Mat,
}

impl Undistorter {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let m = &config.matrix;
        let camera_matrix = Mat::from_slice_2d(&[&m[0..3], &m[3..6], &m[6..9]])?;
        let dist_coeffs = Mat::from_slice_2d(&[config.dist_coeffs.as_slice()])?;
        Ok(Self {
            camera_matrix,
            dist_coeffs,
        })
    }

    pub fn undistort(&self, frame: &Mat) -> Result<Mat> {
        let mut corrected = Mat::default();
        calib3d::undistort_def(frame, &mut corrected, &self.camera_matrix, &self.dist_coeffs)?;
        Ok(corrected)
    }
}
