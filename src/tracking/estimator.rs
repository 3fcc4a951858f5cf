// src/tracking/estimator.rs
//
// Per-frame orchestration of the lane tracker.
//
// Each frame is classified by a memoryless sufficiency gate: with more than
// 2 raw centroids on both sides the observations are outlier-filtered,
// fitted, and measured, and all histories grow by exactly one entry; on any
// shortfall (too few samples before or after filtering, a degenerate fit,
// or a failed sanity hook) the frame leaves every history untouched and the
// previous smoothed geometry keeps rendering. Pushes are transactional:
// nothing is recorded until fit and measurement have both succeeded, so the
// coefficient, curvature, and offset histories can never desynchronize.

use crate::fitting::{self, GeometryParams};
use crate::tracking::line_track::{LineTrack, OffsetTrack};
use crate::tracking::outlier_filter::{OutlierFilter, MIN_SAMPLES_FOR_FILTER};
use crate::types::{
    CentroidObservation, FitCoefficients, LaneMeasurement, LaneSide, TrackingConfig,
};
use tracing::{debug, warn};

/// Outcome of the per-frame evidence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    /// Both sides produced enough trustworthy centroids; histories grew.
    Sufficient,
    /// Detection was too weak this frame; histories were left untouched.
    Insufficient,
}

impl Evidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sufficient => "SUFFICIENT",
            Self::Insufficient => "INSUFFICIENT",
        }
    }
}

/// What the renderer should print for the radius of curvature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RocReading {
    /// No accepted frame yet; nothing meaningful to show.
    Acquiring,
    /// Radius beyond the display threshold; the road reads as straight.
    Straight,
    /// Numeric radius in meters.
    Meters(f64),
}

/// Aggregate output for one processed frame, handed to the renderer.
#[derive(Debug, Clone)]
pub struct FrameEstimate {
    pub frame: u64,
    pub evidence: Evidence,
    /// Smoothed left boundary, mean of the retained fits.
    pub left_fit: Option<FitCoefficients>,
    /// Smoothed right boundary.
    pub right_fit: Option<FitCoefficients>,
    pub roc: RocReading,
    /// Smoothed lateral offset in meters, None until the first accepted frame.
    pub offset_m: Option<f64>,
}

impl FrameEstimate {
    /// Whether a smoothed lane geometry exists to draw.
    pub fn has_lane(&self) -> bool {
        self.left_fit.is_some() && self.right_fit.is_some()
    }
}

/// All cross-frame state for one video: two line tracks, the shared offset
/// track, and the frame counter. Exclusively owned by its processing loop;
/// one instance per session, never shared across videos.
pub struct LaneSession {
    frame: u64,
    accepted_frames: u64,
    left: LineTrack,
    right: LineTrack,
    offsets: OffsetTrack,
    filter: OutlierFilter,
    geom: GeometryParams,
    config: TrackingConfig,
}

impl LaneSession {
    pub fn new(config: TrackingConfig, geom: GeometryParams) -> Self {
        let capacity = config.smooth_window;
        Self {
            frame: 0,
            accepted_frames: 0,
            left: LineTrack::new(LaneSide::Left, capacity),
            right: LineTrack::new(LaneSide::Right, capacity),
            offsets: OffsetTrack::new(capacity),
            filter: OutlierFilter::new(&config),
            geom,
            config,
        }
    }

    /// Advance the session by one frame. Runs exactly once per incoming
    /// frame and always yields an estimate, however weak the detection.
    pub fn process_frame(
        &mut self,
        left_obs: CentroidObservation,
        right_obs: CentroidObservation,
    ) -> FrameEstimate {
        self.frame += 1;

        let evidence = self.ingest(left_obs, right_obs);
        if evidence == Evidence::Sufficient {
            self.accepted_frames += 1;
        }

        if self.frame % 150 == 0 {
            debug!(
                "🛣️ Session F{}: {} | centroids L={} R={} | histories L={} R={} off={} | accepted {}/{}",
                self.frame,
                evidence.as_str(),
                self.left.observation().len(),
                self.right.observation().len(),
                self.left.len(),
                self.right.len(),
                self.offsets.len(),
                self.accepted_frames,
                self.frame,
            );
        }

        self.estimate(evidence)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn accepted_frames(&self) -> u64 {
        self.accepted_frames
    }

    pub fn left(&self) -> &LineTrack {
        &self.left
    }

    pub fn right(&self) -> &LineTrack {
        &self.right
    }

    pub fn offsets(&self) -> &OffsetTrack {
        &self.offsets
    }

    // ── Evidence gate ────────────────────────────────────────────────────

    /// Classify the frame and, when it qualifies, grow every history by
    /// exactly one entry. Any early return leaves all histories untouched.
    fn ingest(
        &mut self,
        left_obs: CentroidObservation,
        right_obs: CentroidObservation,
    ) -> Evidence {
        // The gate is a pure function of this frame's raw counts.
        if left_obs.len() < MIN_SAMPLES_FOR_FILTER || right_obs.len() < MIN_SAMPLES_FOR_FILTER {
            self.left.set_observation(left_obs);
            self.right.set_observation(right_obs);
            return Evidence::Insufficient;
        }

        let (left_filtered, right_filtered) = self.filter.apply(&left_obs, &right_obs);
        self.left.set_observation(left_filtered.clone());
        self.right.set_observation(right_filtered.clone());

        if left_filtered.len() < fitting::MIN_FIT_SAMPLES
            || right_filtered.len() < fitting::MIN_FIT_SAMPLES
        {
            debug!(
                "Frame {}: outlier filter left too few centroids (L={} R={})",
                self.frame,
                left_filtered.len(),
                right_filtered.len()
            );
            return Evidence::Insufficient;
        }

        let (left_fit, right_fit) =
            match (fitting::fit_centroids(&left_filtered), fitting::fit_centroids(&right_filtered)) {
                (Some(l), Some(r)) => (l, r),
                (l, r) => {
                    warn!(
                        "Frame {}: degenerate fit (L={} R={}), holding previous geometry",
                        self.frame,
                        if l.is_some() { "ok" } else { "singular" },
                        if r.is_some() { "ok" } else { "singular" },
                    );
                    return Evidence::Insufficient;
                }
            };

        let measurement = match fitting::measure(&left_filtered, &right_filtered, &self.geom) {
            Some(m) => m,
            None => {
                warn!("Frame {}: degenerate measurement, holding previous geometry", self.frame);
                return Evidence::Insufficient;
            }
        };

        if !self.sanity_ok(&left_fit, &right_fit, &measurement) {
            return Evidence::Insufficient;
        }

        // Transactional: all five values land together.
        self.left.record(left_fit, measurement.left_roc);
        self.right.record(right_fit, measurement.right_roc);
        self.offsets.record(measurement.offset_m);
        Evidence::Sufficient
    }

    // ── Optional cross-checks ────────────────────────────────────────────

    fn sanity_ok(
        &self,
        left_fit: &FitCoefficients,
        right_fit: &FitCoefficients,
        measurement: &LaneMeasurement,
    ) -> bool {
        let sanity = &self.config.sanity;

        if sanity.check_roc_consistency {
            let straight = self.config.roc_straight_threshold;
            let lo = measurement.left_roc.min(measurement.right_roc);
            let hi = measurement.left_roc.max(measurement.right_roc);
            // Two effectively-straight sides agree regardless of ratio.
            if lo <= straight && hi / lo > sanity.max_roc_ratio {
                debug!(
                    "Frame {}: ROC consistency failed (L={:.0} m R={:.0} m)",
                    self.frame, measurement.left_roc, measurement.right_roc
                );
                return false;
            }
        }

        if sanity.check_lane_width {
            let h = self.geom.image_height;
            let widths = [h, h / 2.0, 0.0].map(|y| right_fit.x_at(y) - left_fit.x_at(y));
            let mean = widths.iter().sum::<f64>() / widths.len() as f64;
            if mean <= 0.0
                || widths
                    .iter()
                    .any(|w| (w - mean).abs() / mean > sanity.max_width_spread)
            {
                debug!(
                    "Frame {}: lane width spread failed (bottom={:.0} middle={:.0} top={:.0})",
                    self.frame, widths[0], widths[1], widths[2]
                );
                return false;
            }
        }

        true
    }

    // ── Aggregates ───────────────────────────────────────────────────────

    fn estimate(&self, evidence: Evidence) -> FrameEstimate {
        let roc = match (self.left.mean_curvature(), self.right.mean_curvature()) {
            (Some(l), Some(r)) => {
                classify_roc((l + r) / 2.0, self.config.roc_straight_threshold)
            }
            _ => RocReading::Acquiring,
        };

        FrameEstimate {
            frame: self.frame,
            evidence,
            left_fit: self.left.best_fit(),
            right_fit: self.right.best_fit(),
            roc,
            offset_m: self.offsets.mean(),
        }
    }
}

/// Radii above the threshold are numerically unstable and meaningless to a
/// driver; present the road as straight instead.
fn classify_roc(avg_roc: f64, straight_threshold: f64) -> RocReading {
    if avg_roc > straight_threshold {
        RocReading::Straight
    } else {
        RocReading::Meters(avg_roc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CentroidSample;

    fn session(smooth_window: usize) -> LaneSession {
        let config = TrackingConfig {
            smooth_window,
            ..TrackingConfig::default()
        };
        LaneSession::new(config, GeometryParams::default())
    }

    /// `count` clean centroids on a vertical line at `x`, bottom→top.
    fn vertical_line(x: f32, count: usize) -> CentroidObservation {
        (0..count)
            .map(|i| CentroidSample {
                x,
                y: 680.0 - i as f32 * 64.0,
            })
            .collect()
    }

    /// Centroids on x = a·y² + c, bottom→top.
    fn curved_line(a: f64, c: f64, count: usize) -> CentroidObservation {
        (0..count)
            .map(|i| {
                let y = 680.0 - i as f64 * 64.0;
                CentroidSample {
                    x: (a * y * y + c) as f32,
                    y: y as f32,
                }
            })
            .collect()
    }

    #[test]
    fn test_frame_counter_increments_from_one() {
        let mut session = session(5);
        for expected in 1..=4u64 {
            let estimate = session.process_frame(Vec::new(), Vec::new());
            assert_eq!(estimate.frame, expected);
        }
        assert_eq!(session.frame_count(), 4);
    }

    #[test]
    fn test_empty_observation_is_insufficient() {
        let mut session = session(5);
        let estimate = session.process_frame(Vec::new(), vertical_line(940.0, 10));
        assert_eq!(estimate.evidence, Evidence::Insufficient);
        assert_eq!(session.left().len(), 0);
        assert_eq!(session.right().len(), 0);
        assert_eq!(estimate.roc, RocReading::Acquiring);
        assert!(estimate.offset_m.is_none());
        assert!(!estimate.has_lane());
    }

    #[test]
    fn test_sufficient_frame_grows_all_histories_together() {
        let mut session = session(5);
        let estimate = session.process_frame(vertical_line(340.0, 10), vertical_line(940.0, 10));
        assert_eq!(estimate.evidence, Evidence::Sufficient);
        assert_eq!(session.left().len(), 1);
        assert_eq!(session.right().len(), 1);
        assert_eq!(session.offsets().len(), 1);
        assert!(estimate.has_lane());
        assert!(estimate.offset_m.is_some());
    }

    #[test]
    fn test_insufficient_frame_leaves_state_identical() {
        let mut session = session(5);
        session.process_frame(vertical_line(340.0, 10), vertical_line(940.0, 10));

        let left_before = session.left().best_fit();
        let right_before = session.right().best_fit();
        let offset_before = session.offsets().mean();

        // Weak frame: two centroids on the left.
        let estimate = session.process_frame(vertical_line(350.0, 2), vertical_line(930.0, 10));
        assert_eq!(estimate.evidence, Evidence::Insufficient);
        assert_eq!(session.left().len(), 1);
        assert_eq!(session.right().len(), 1);
        assert_eq!(session.offsets().len(), 1);
        assert_eq!(session.left().best_fit(), left_before);
        assert_eq!(session.right().best_fit(), right_before);
        assert_eq!(session.offsets().mean(), offset_before);

        // The stale smoothed geometry keeps rendering.
        assert!(estimate.has_lane());
        assert_eq!(estimate.left_fit, left_before);
    }

    #[test]
    fn test_degenerate_fit_is_insufficient() {
        let mut session = session(5);
        // Plenty of samples, all on one scan row: the fit is singular.
        let flat: CentroidObservation = (0..8)
            .map(|i| CentroidSample {
                x: 300.0 + i as f32 * 12.0,
                y: 360.0,
            })
            .collect();
        let estimate = session.process_frame(flat, vertical_line(940.0, 10));
        assert_eq!(estimate.evidence, Evidence::Insufficient);
        assert_eq!(session.left().len(), 0);
        assert_eq!(session.offsets().len(), 0);
    }

    #[test]
    fn test_smoothing_converges_on_identical_input() {
        let mut session = session(5);
        for _ in 0..5 {
            session.process_frame(vertical_line(340.0, 10), vertical_line(940.0, 10));
        }
        let left = session.left().best_fit().unwrap();
        assert!(left.a.abs() < 1e-7);
        assert!(left.b.abs() < 1e-4);
        assert!((left.c - 340.0).abs() < 0.05);
    }

    #[test]
    fn test_straight_road_reads_as_straight() {
        let mut session = session(5);
        let estimate = session.process_frame(vertical_line(340.0, 10), vertical_line(940.0, 10));
        // A vertical lane has an enormous radius, far past the threshold.
        assert_eq!(estimate.roc, RocReading::Straight);
    }

    #[test]
    fn test_curved_road_reads_in_meters() {
        let mut session = session(5);
        // Strong curve: world-space radius well under the 4000 m threshold.
        let estimate =
            session.process_frame(curved_line(8e-4, 340.0, 10), curved_line(8e-4, 940.0, 10));
        assert_eq!(estimate.evidence, Evidence::Sufficient);
        match estimate.roc {
            RocReading::Meters(roc) => assert!(roc > 0.0 && roc < 4000.0, "roc = {}", roc),
            other => panic!("expected numeric ROC, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_roc_threshold() {
        assert_eq!(classify_roc(5000.0, 4000.0), RocReading::Straight);
        assert_eq!(classify_roc(800.0, 4000.0), RocReading::Meters(800.0));
        // The threshold itself still prints a number.
        assert_eq!(classify_roc(4000.0, 4000.0), RocReading::Meters(4000.0));
    }

    #[test]
    fn test_end_to_end_window_saturation_and_eviction() {
        let mut session = session(5);

        // Frames 1–2: too few samples on both sides.
        for _ in 0..2 {
            let estimate =
                session.process_frame(vertical_line(340.0, 2), vertical_line(940.0, 1));
            assert_eq!(estimate.evidence, Evidence::Insufficient);
            assert_eq!(estimate.roc, RocReading::Acquiring);
            assert!(!estimate.has_lane());
        }

        // Frame 3: first clean detection.
        session.process_frame(vertical_line(300.0, 10), vertical_line(900.0, 10));
        assert_eq!(session.left().len(), 1);
        assert_eq!(session.right().len(), 1);
        assert_eq!(session.offsets().len(), 1);

        // Frames 4–8: clean detections at a different position.
        for _ in 0..5 {
            session.process_frame(vertical_line(340.0, 10), vertical_line(940.0, 10));
        }
        assert_eq!(session.left().len(), 5);
        assert_eq!(session.offsets().len(), 5);

        // Frame 8 made the 6th push, so frame 3's entry (c = 300) is gone.
        assert!((session.left().oldest_fit().unwrap().c - 340.0).abs() < 1e-3);
        assert_eq!(session.frame_count(), 8);
    }

    #[test]
    fn test_lane_width_sanity_hook_rejects_diverging_lane() {
        let diverging_right: CentroidObservation = (0..10)
            .map(|i| {
                let y = 680.0 - i as f64 * 64.0;
                // Width grows from ~300 px at the bottom to ~700 px at the top.
                CentroidSample {
                    x: (600.0 + (680.0 - y) * 0.6) as f32,
                    y: y as f32,
                }
            })
            .collect();

        // Disabled by default: the frame is accepted.
        let mut relaxed = session(5);
        let estimate =
            relaxed.process_frame(vertical_line(300.0, 10), diverging_right.clone());
        assert_eq!(estimate.evidence, Evidence::Sufficient);

        // Enabled: the same frame is demoted and nothing is recorded.
        let config = TrackingConfig {
            smooth_window: 5,
            sanity: crate::types::SanityConfig {
                check_lane_width: true,
                ..Default::default()
            },
            ..TrackingConfig::default()
        };
        let mut strict = LaneSession::new(config, GeometryParams::default());
        let estimate = strict.process_frame(vertical_line(300.0, 10), diverging_right);
        assert_eq!(estimate.evidence, Evidence::Insufficient);
        assert_eq!(strict.left().len(), 0);
        assert_eq!(strict.offsets().len(), 0);
    }

    #[test]
    fn test_roc_consistency_hook_rejects_disagreeing_sides() {
        let config = TrackingConfig {
            smooth_window: 5,
            sanity: crate::types::SanityConfig {
                check_roc_consistency: true,
                ..Default::default()
            },
            ..TrackingConfig::default()
        };
        let mut strict = LaneSession::new(config, GeometryParams::default());

        // Left curves hard (radius well under the straight threshold),
        // right is dead straight: the sides disagree by orders of magnitude.
        let estimate =
            strict.process_frame(curved_line(8e-4, 340.0, 10), vertical_line(940.0, 10));
        assert_eq!(estimate.evidence, Evidence::Insufficient);
        assert_eq!(strict.left().len(), 0);

        // Same geometry passes with the hook disabled.
        let mut relaxed = session(5);
        let estimate =
            relaxed.process_frame(curved_line(8e-4, 340.0, 10), vertical_line(940.0, 10));
        assert_eq!(estimate.evidence, Evidence::Sufficient);
    }
}
