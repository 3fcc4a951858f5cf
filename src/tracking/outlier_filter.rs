// src/tracking/outlier_filter.rs
//
// Statistical rejection of anomalous centroid samples before fitting.
//
// Each sample gets a horizontal deviation from a baseline (moving average
// of its neighbors, or the previous sample), the deviations are z-scored
// against their own mean/σ, and samples beyond the threshold are dropped.
// Because every sample is scored against the side's own distribution, the
// filter can never flag all of them: with σ > 0 at most a 1/z² fraction of
// the mass can sit beyond z (Chebyshev), and with σ = 0 every z-score is 0.

use crate::types::{CentroidObservation, DeviationBaseline, TrackingConfig};

/// Samples needed on both sides before the filter activates. Below this the
/// deviation distribution is meaningless and fitting is skipped anyway.
pub const MIN_SAMPLES_FOR_FILTER: usize = 3;

const SIGMA_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct OutlierFilter {
    z_max: f64,
    baseline: DeviationBaseline,
    baseline_window: usize,
}

impl OutlierFilter {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            z_max: config.z_max,
            baseline: config.baseline,
            baseline_window: config.baseline_window.max(1),
        }
    }

    /// Filter the paired same-frame observations. If either side has fewer
    /// than [`MIN_SAMPLES_FOR_FILTER`] samples both pass through unchanged.
    /// Output is never longer than input and never empty when the input
    /// was non-empty. Does not mutate any track state.
    pub fn apply(
        &self,
        left: &CentroidObservation,
        right: &CentroidObservation,
    ) -> (CentroidObservation, CentroidObservation) {
        if left.len() < MIN_SAMPLES_FOR_FILTER || right.len() < MIN_SAMPLES_FOR_FILTER {
            return (left.clone(), right.clone());
        }
        (self.filter_side(left), self.filter_side(right))
    }

    fn filter_side(&self, observation: &CentroidObservation) -> CentroidObservation {
        let deviations = self.deviations(observation);

        let n = deviations.len() as f64;
        let mean = deviations.iter().sum::<f64>() / n;
        let variance = deviations.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
        let sigma = variance.sqrt();

        if sigma < SIGMA_FLOOR {
            // No spread, nothing to reject.
            return observation.clone();
        }

        observation
            .iter()
            .zip(&deviations)
            .filter(|(_, &d)| ((d - mean) / sigma).abs() <= self.z_max)
            .map(|(&sample, _)| sample)
            .collect()
    }

    fn deviations(&self, observation: &CentroidObservation) -> Vec<f64> {
        match self.baseline {
            DeviationBaseline::MovingAverage => self.moving_average_deviations(observation),
            DeviationBaseline::Differencing => Self::differencing_deviations(observation),
        }
    }

    /// Horizontal distance of each sample from the mean x of a centered
    /// window of neighbors (window clamped at the ends of the scan).
    fn moving_average_deviations(&self, observation: &CentroidObservation) -> Vec<f64> {
        let half = self.baseline_window / 2;
        (0..observation.len())
            .map(|i| {
                let lo = i.saturating_sub(half);
                let hi = (i + half + 1).min(observation.len());
                let window = &observation[lo..hi];
                let baseline =
                    window.iter().map(|s| s.x as f64).sum::<f64>() / window.len() as f64;
                observation[i].x as f64 - baseline
            })
            .collect()
    }

    /// Consecutive-sample x differences; the first sample has no
    /// predecessor and gets deviation 0.
    fn differencing_deviations(observation: &CentroidObservation) -> Vec<f64> {
        let mut deviations = Vec::with_capacity(observation.len());
        deviations.push(0.0);
        for pair in observation.windows(2) {
            deviations.push(pair[1].x as f64 - pair[0].x as f64);
        }
        deviations
    }
}
