// src/binary_mask.rs
//
// Lane-pixel mask extraction: inclusive threshold ranges over the L channel
// of CIELUV (bright whites) and the b channel of CIELAB (yellows), OR-ed
// into a single binary mask.

use crate::types::MaskConfig;
use anyhow::Result;
use opencv::{
    core::{self, Mat, Scalar},
    imgproc,
    prelude::*,
};

pub fn extract_binary_mask(frame: &Mat, config: &MaskConfig) -> Result<Mat> {
    let l_mask = channel_mask(frame, imgproc::COLOR_BGR2Luv, 0, config.l_thresh)?;
    let b_mask = channel_mask(frame, imgproc::COLOR_BGR2Lab, 2, config.b_thresh)?;

    let mut mask = Mat::default();
    core::bitwise_or(&l_mask, &b_mask, &mut mask, &core::no_array())?;
    Ok(mask)
}

fn channel_mask(frame: &Mat, color_code: i32, channel: i32, range: [u8; 2]) -> Result<Mat> {
    let mut converted = Mat::default();
    imgproc::cvt_color(frame, &mut converted, color_code, 0)?;

    let mut single = Mat::default();
    core::extract_channel(&converted, &mut single, channel)?;

    let mut mask = Mat::default();
    core::in_range(
        &single,
        &Scalar::all(range[0] as f64),
        &Scalar::all(range[1] as f64),
        &mut mask,
    )?;
    Ok(mask)
}
