use crate::types::Config;
use anyhow::{bail, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed calibration/thresholds/quadrilaterals up front.
    /// Everything checked here is fatal; per-frame code never re-validates.
    pub fn validate(&self) -> Result<()> {
        if self.camera.matrix.iter().any(|v| !v.is_finite()) {
            bail!("camera.matrix contains non-finite values");
        }
        if self.camera.matrix[8] == 0.0 {
            bail!("camera.matrix is not a valid projective matrix (m33 = 0)");
        }
        if self.camera.dist_coeffs.len() < 4 {
            bail!(
                "camera.dist_coeffs needs at least 4 coefficients, got {}",
                self.camera.dist_coeffs.len()
            );
        }
        if self.camera.dist_coeffs.iter().any(|v| !v.is_finite()) {
            bail!("camera.dist_coeffs contains non-finite values");
        }

        for (name, range) in [("mask.l_thresh", self.mask.l_thresh), ("mask.b_thresh", self.mask.b_thresh)] {
            if range[0] > range[1] {
                bail!("{} range is inverted: [{}, {}]", name, range[0], range[1]);
            }
        }

        for (name, quad) in [("warp.src", &self.warp.src), ("warp.dst", &self.warp.dst)] {
            if quad.iter().flatten().any(|v| !v.is_finite()) {
                bail!("{} contains non-finite coordinates", name);
            }
            // A homography needs 4 distinct corners.
            for i in 0..4 {
                for j in (i + 1)..4 {
                    if quad[i] == quad[j] {
                        bail!("{} has duplicate corners at {} and {}", name, i, j);
                    }
                }
            }
        }

        if self.centroids.window_width == 0 || self.centroids.window_height == 0 {
            bail!("centroids window dimensions must be non-zero");
        }

        if self.tracking.smooth_window == 0 {
            bail!("tracking.smooth_window must be at least 1");
        }
        if !(self.tracking.z_max > 0.0) {
            bail!("tracking.z_max must be positive, got {}", self.tracking.z_max);
        }
        if self.tracking.baseline_window == 0 {
            bail!("tracking.baseline_window must be at least 1");
        }
        if !(self.tracking.roc_straight_threshold > 0.0) {
            bail!("tracking.roc_straight_threshold must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::*;

    fn base_config() -> Config {
        Config {
            camera: CameraConfig {
                matrix: [1200.0, 0.0, 640.0, 0.0, 1200.0, 360.0, 0.0, 0.0, 1.0],
                dist_coeffs: vec![-0.24, -0.04, 0.0, 0.0, 0.01],
            },
            mask: MaskConfig {
                l_thresh: [215, 255],
                b_thresh: [150, 255],
            },
            warp: WarpConfig {
                src: [[585.0, 460.0], [695.0, 460.0], [1127.0, 720.0], [203.0, 720.0]],
                dst: [[320.0, 0.0], [960.0, 0.0], [960.0, 720.0], [320.0, 720.0]],
            },
            centroids: CentroidConfig::default(),
            tracking: TrackingConfig::default(),
            video: VideoConfig {
                input_dir: "videos".into(),
                output_dir: "output".into(),
                save_annotated: true,
                save_estimates: false,
            },
            logging: LoggingConfig {
                level: "info".into(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_inverted_threshold_rejected() {
        let mut config = base_config();
        config.mask.l_thresh = [255, 215];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_quad_rejected() {
        let mut config = base_config();
        config.warp.src[1] = config.warp.src[0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = base_config();
        config.tracking.smooth_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_dist_coeffs_rejected() {
        let mut config = base_config();
        config.camera.dist_coeffs = vec![0.1, 0.2];
        assert!(config.validate().is_err());
    }
}
