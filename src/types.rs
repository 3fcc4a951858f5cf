use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    pub mask: MaskConfig,
    pub warp: WarpConfig,
    #[serde(default)]
    pub centroids: CentroidConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// 3×3 camera matrix, row-major.
    pub matrix: [f64; 9],
    /// Distortion coefficients (k1, k2, p1, p2, k3).
    pub dist_coeffs: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskConfig {
    /// Inclusive threshold range on the L channel of CIELUV.
    pub l_thresh: [u8; 2],
    /// Inclusive threshold range on the b channel of CIELAB.
    pub b_thresh: [u8; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarpConfig {
    /// Source quadrilateral in image coordinates (bird's-eye warp input).
    pub src: [[f32; 2]; 4],
    /// Destination quadrilateral in warped coordinates.
    pub dst: [[f32; 2]; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidConfig {
    /// Width of the convolution window in pixels.
    pub window_width: usize,
    /// Height of each scan band in pixels.
    pub window_height: usize,
    /// Horizontal search margin around the previous center.
    pub margin: usize,
}

impl Default for CentroidConfig {
    fn default() -> Self {
        Self {
            window_width: 50,
            window_height: 80,
            margin: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Smoothing window: capacity of every bounded history.
    pub smooth_window: usize,
    /// Z-score threshold for centroid outlier rejection.
    pub z_max: f64,
    /// Deviation baseline used by the outlier filter.
    pub baseline: DeviationBaseline,
    /// Neighborhood size for the moving-average baseline.
    pub baseline_window: usize,
    /// Radii above this (meters) are rendered as "Straight".
    pub roc_straight_threshold: f64,
    #[serde(default)]
    pub sanity: SanityConfig,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            smooth_window: 10,
            z_max: 1.9,
            baseline: DeviationBaseline::MovingAverage,
            baseline_window: 5,
            roc_straight_threshold: 4000.0,
            sanity: SanityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviationBaseline {
    /// Deviation from the mean x of a centered window of neighbors.
    MovingAverage,
    /// Deviation as the difference from the previous sample's x.
    Differencing,
}

/// Optional cross-checks on a qualifying frame before its measurements are
/// accepted. All disabled by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    pub check_roc_consistency: bool,
    pub check_lane_width: bool,
    /// Maximum allowed ratio between the larger and smaller side ROC.
    pub max_roc_ratio: f64,
    /// Maximum allowed lane-width deviation at any probed row, as a
    /// fraction of the mean width.
    pub max_width_spread: f64,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            check_roc_consistency: false,
            check_lane_width: false,
            max_roc_ratio: 10.0,
            max_width_spread: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub save_annotated: bool,
    /// Append one JSON line per frame (frame, roc, offset) next to the video.
    pub save_estimates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

// ============================================================================
// DOMAIN TYPES
// ============================================================================

/// Which lane boundary a track belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneSide {
    Left,
    Right,
}

impl LaneSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

/// One detected lane-pixel-cluster center in bird's-eye coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentroidSample {
    pub x: f32,
    pub y: f32,
}

/// All centroids found for one side in one frame, ordered bottom→top.
/// May be empty when detection fails.
pub type CentroidObservation = Vec<CentroidSample>;

/// Second-degree polynomial x = a·y² + b·y + c in bird's-eye coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl FitCoefficients {
    pub fn x_at(&self, y: f64) -> f64 {
        self.a * y * y + self.b * y + self.c
    }
}

/// Physical-unit measurements for one qualifying frame.
#[derive(Debug, Clone, Copy)]
pub struct LaneMeasurement {
    /// Left boundary radius of curvature, meters.
    pub left_roc: f64,
    /// Right boundary radius of curvature, meters.
    pub right_roc: f64,
    /// Signed lateral offset of the vehicle from lane center, meters.
    pub offset_m: f64,
}
