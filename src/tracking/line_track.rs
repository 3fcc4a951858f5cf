// src/tracking/line_track.rs

use crate::types::{CentroidObservation, FitCoefficients, LaneSide};
use std::collections::VecDeque;

/// Per-side lane boundary state: bounded histories of accepted fits and
/// curvature measurements, plus the most recent centroid observation.
///
/// Histories hold at most `capacity` entries; pushing a full history evicts
/// the oldest entry. They are appended to for the life of the track and
/// never cleared, so the smoothed estimate always reflects the most recent
/// accepted frames.
#[derive(Debug, Clone)]
pub struct LineTrack {
    side: LaneSide,
    coefficients: VecDeque<FitCoefficients>,
    curvatures: VecDeque<f64>,
    latest_observation: CentroidObservation,
    capacity: usize,
}

impl LineTrack {
    pub fn new(side: LaneSide, capacity: usize) -> Self {
        Self {
            side,
            coefficients: VecDeque::with_capacity(capacity),
            curvatures: VecDeque::with_capacity(capacity),
            latest_observation: Vec::new(),
            capacity,
        }
    }

    pub fn side(&self) -> LaneSide {
        self.side
    }

    /// Record one accepted frame: the fitted coefficients and the matching
    /// radius of curvature, together. Callers must never push one without
    /// the other or the histories would desynchronize.
    pub fn record(&mut self, coeff: FitCoefficients, roc: f64) {
        self.coefficients.push_back(coeff);
        if self.coefficients.len() > self.capacity {
            self.coefficients.pop_front();
        }
        self.curvatures.push_back(roc);
        if self.curvatures.len() > self.capacity {
            self.curvatures.pop_front();
        }
    }

    pub fn set_observation(&mut self, observation: CentroidObservation) {
        self.latest_observation = observation;
    }

    pub fn observation(&self) -> &CentroidObservation {
        &self.latest_observation
    }

    /// Coefficient-wise mean over the retained fits. Recomputed on every
    /// call so it is consistent after any push or eviction. None until the
    /// first accepted frame.
    pub fn best_fit(&self) -> Option<FitCoefficients> {
        if self.coefficients.is_empty() {
            return None;
        }
        let n = self.coefficients.len() as f64;
        let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
        for coeff in &self.coefficients {
            a += coeff.a;
            b += coeff.b;
            c += coeff.c;
        }
        Some(FitCoefficients {
            a: a / n,
            b: b / n,
            c: c / n,
        })
    }

    /// Mean radius of curvature over the retained measurements.
    pub fn mean_curvature(&self) -> Option<f64> {
        if self.curvatures.is_empty() {
            return None;
        }
        Some(self.curvatures.iter().sum::<f64>() / self.curvatures.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    #[cfg(test)]
    pub fn oldest_fit(&self) -> Option<&FitCoefficients> {
        self.coefficients.front()
    }
}

/// Bounded history of lateral-offset measurements (meters). There is one
/// ego-vehicle offset per frame, so a single track is shared across sides.
#[derive(Debug, Clone)]
pub struct OffsetTrack {
    offsets: VecDeque<f64>,
    capacity: usize,
}

impl OffsetTrack {
    pub fn new(capacity: usize) -> Self {
        Self {
            offsets: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, offset_m: f64) {
        self.offsets.push_back(offset_m);
        if self.offsets.len() > self.capacity {
            self.offsets.pop_front();
        }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.offsets.is_empty() {
            return None;
        }
        Some(self.offsets.iter().sum::<f64>() / self.offsets.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coeff(a: f64, b: f64, c: f64) -> FitCoefficients {
        FitCoefficients { a, b, c }
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut track = LineTrack::new(LaneSide::Left, 5);
        for i in 0..20 {
            track.record(coeff(i as f64, 0.0, 0.0), 1000.0 + i as f64);
            assert!(track.len() <= 5);
        }
        assert_eq!(track.len(), 5);
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let mut track = LineTrack::new(LaneSide::Right, 3);
        for i in 0..5 {
            track.record(coeff(i as f64, 0.0, 0.0), 1000.0);
        }
        // Pushes 0..5 into capacity 3: entries 0 and 1 evicted.
        assert_eq!(track.oldest_fit().unwrap().a, 2.0);
    }

    #[test]
    fn test_best_fit_is_mean_of_identical_values() {
        let mut track = LineTrack::new(LaneSide::Left, 5);
        let fit = coeff(0.002, -1.5, 400.0);
        for _ in 0..5 {
            track.record(fit, 900.0);
        }
        assert_eq!(track.best_fit().unwrap(), fit);
    }

    #[test]
    fn test_best_fit_tracks_eviction() {
        let mut track = LineTrack::new(LaneSide::Left, 2);
        track.record(coeff(0.0, 0.0, 100.0), 900.0);
        track.record(coeff(0.0, 0.0, 200.0), 900.0);
        assert_eq!(track.best_fit().unwrap().c, 150.0);

        // Third push evicts c=100; mean shifts to (200 + 300) / 2.
        track.record(coeff(0.0, 0.0, 300.0), 900.0);
        assert_eq!(track.best_fit().unwrap().c, 250.0);
    }

    #[test]
    fn test_empty_track_has_no_estimate() {
        let track = LineTrack::new(LaneSide::Left, 5);
        assert!(track.best_fit().is_none());
        assert!(track.mean_curvature().is_none());
    }

    #[test]
    fn test_observation_replaced_each_frame() {
        let mut track = LineTrack::new(LaneSide::Left, 5);
        assert_eq!(track.side(), LaneSide::Left);
        assert!(track.observation().is_empty());

        track.set_observation(vec![crate::types::CentroidSample { x: 300.0, y: 680.0 }]);
        assert_eq!(track.observation().len(), 1);

        track.set_observation(Vec::new());
        assert!(track.observation().is_empty());
        // Swapping observations never touches the histories.
        assert!(track.is_empty());
    }

    #[test]
    fn test_offset_track_bounded_mean() {
        let mut offsets = OffsetTrack::new(3);
        assert!(offsets.mean().is_none());
        for v in [0.1, 0.2, 0.3, 0.4] {
            offsets.record(v);
        }
        assert_eq!(offsets.len(), 3);
        let mean = offsets.mean().unwrap();
        assert!((mean - 0.3).abs() < 1e-12);
    }
}
