//! Reconciliation of raw sample counters against a requested decimation
//! factor.
//!
//! Trodes modules receive decimated data by keeping every
//! `factor * 10`-th sample, phase-aligned so that the kept counters are
//! divisible by the stride. Reproducing that exactly ("Trodes-style")
//! requires striding the raw counter series here at load time; the
//! alternative is to leave the series alone and let the downstream signal
//! container resample to the reduced rate.

use log::warn;
use ndarray::Array1;

use crate::types::{DecimationPlan, Result, TrodesError};

/// Converts a raw counter series into a timestamp series in seconds,
/// applying the requested decimation.
///
/// `decimation_factor <= 0` (callers conventionally pass -1) disables
/// decimation. With `trodes_style` set and a positive factor, the series is
/// strided starting from the first counter divisible by `factor * 10`; the
/// stride is `factor * 10` so that a companion sample series strided the same
/// way stays index-aligned. Without `trodes_style`, a positive factor leaves
/// the series untouched and records the reduced rate in
/// [`DecimationPlan::resample_to`] for a downstream pass.
///
/// The returned plan's `step` is the mean of consecutive timestamp
/// differences rather than `1 / rate`, so small jitter in the counter stream
/// is averaged instead of ignored.
pub fn reconcile(
    raw: &Array1<u32>,
    clock_rate: f64,
    decimation_factor: i32,
    trodes_style: bool,
) -> Result<(Array1<f64>, DecimationPlan)> {
    check_counter_order(raw);

    if trodes_style && decimation_factor > 0 {
        let factor = decimation_factor as u32;
        let stride = factor as usize * 10;
        let start_offset = raw
            .iter()
            .position(|&t| t as usize % stride == 0)
            .ok_or_else(|| {
                TrodesError::Other(format!(
                    "no sample counter aligns with decimation stride {}",
                    stride
                ))
            })?;
        let timestamps: Array1<f64> = raw
            .iter()
            .skip(start_offset)
            .step_by(stride)
            .map(|&t| t as f64 / clock_rate)
            .collect();
        let effective_rate = clock_rate / stride as f64;
        let step = mean_step(&timestamps, effective_rate);
        let plan = DecimationPlan {
            factor,
            start_offset,
            stride,
            effective_rate,
            step,
            resample_to: None,
        };
        Ok((timestamps, plan))
    } else {
        let timestamps = raw.mapv(|t| t as f64 / clock_rate);
        let (factor, resample_to) = if decimation_factor > 0 {
            (
                decimation_factor as u32,
                Some(clock_rate / (decimation_factor as f64 * 10.0)),
            )
        } else {
            (1, None)
        };
        let step = mean_step(&timestamps, clock_rate);
        let plan = DecimationPlan {
            factor,
            start_offset: 0,
            stride: 1,
            effective_rate: clock_rate,
            step,
            resample_to,
        };
        Ok((timestamps, plan))
    }
}

/// Mean of consecutive timestamp differences. A series shorter than 2
/// samples has no differences to average; fall back to the nominal spacing.
fn mean_step(timestamps: &Array1<f64>, effective_rate: f64) -> f64 {
    if timestamps.len() < 2 {
        return 1.0 / effective_rate;
    }
    let mut total = 0.0;
    for w in timestamps.windows(2) {
        total += w[1] - w[0];
    }
    total / (timestamps.len() - 1) as f64
}

/// Sample counters should never run backwards; if they do, downstream
/// interpolation against a uniform time base is suspect.
fn check_counter_order(raw: &Array1<u32>) {
    let regressions = raw
        .windows(2)
        .into_iter()
        .filter(|w| w[1] < w[0])
        .count();
    if regressions > 0 {
        warn!(
            "{} timestamp regression(s) found; time scale will not be uniform",
            regressions
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn trodes_style_strides_from_first_aligned_counter() {
        // counters 0, 10, 20, ..., 990 at 1 kHz with factor 3: stride 30,
        // first aligned counter is 0 itself
        let raw: Array1<u32> = (0..100).map(|i| i * 10).collect();
        let (timestamps, plan) = reconcile(&raw, 1000.0, 3, true).unwrap();

        assert_eq!(plan.start_offset, 0);
        assert_eq!(plan.stride, 30);
        assert_eq!(plan.factor, 3);
        assert_relative_eq!(plan.effective_rate, 1000.0 / 30.0);
        assert_eq!(plan.resample_to, None);

        // indices 0, 30, 60, 90 -> counters 0, 300, 600, 900
        assert_eq!(timestamps.len(), 4);
        assert_relative_eq!(timestamps[0], 0.0);
        assert_relative_eq!(timestamps[1], 0.3);
        assert_relative_eq!(timestamps[3], 0.9);
        assert_relative_eq!(plan.step, 0.3);
    }

    #[test]
    fn trodes_style_skips_unaligned_prefix() {
        let raw = Array1::from_vec(vec![7u32, 20, 30, 60, 90, 120]);
        let (timestamps, plan) = reconcile(&raw, 1000.0, 3, true).unwrap();

        // index 2 holds the first counter divisible by 30
        assert_eq!(plan.start_offset, 2);
        assert_eq!(timestamps.len(), 1);
        assert_relative_eq!(timestamps[0], 0.03);
        // one sample has no differences to average
        assert_relative_eq!(plan.step, 30.0 / 1000.0);
    }

    #[test]
    fn trodes_style_with_no_aligned_counter_is_fatal() {
        let raw = Array1::from_vec(vec![5u32, 15, 25, 35]);
        let err = reconcile(&raw, 1000.0, 3, true).unwrap_err();
        assert!(matches!(err, TrodesError::Other(_)));
    }

    #[test]
    fn sentinel_factor_disables_decimation() {
        let raw = Array1::from_vec(vec![0u32, 10, 20, 30]);
        let (timestamps, plan) = reconcile(&raw, 1000.0, -1, true).unwrap();

        assert_eq!(timestamps.len(), 4);
        assert_eq!(plan.factor, 1);
        assert_eq!(plan.stride, 1);
        assert_relative_eq!(plan.effective_rate, 1000.0);
        assert_eq!(plan.resample_to, None);
        assert_relative_eq!(plan.step, 0.01);
    }

    #[test]
    fn subsample_style_marks_for_downstream_resampling() {
        let raw: Array1<u32> = (0..50).map(|i| i * 10).collect();
        let (timestamps, plan) = reconcile(&raw, 1000.0, 2, false).unwrap();

        // series untouched at load time
        assert_eq!(timestamps.len(), 50);
        assert_eq!(plan.stride, 1);
        assert_relative_eq!(plan.effective_rate, 1000.0);
        assert_relative_eq!(plan.resample_to.unwrap(), 1000.0 / 20.0);
        assert_relative_eq!(plan.step, 0.01);
    }

    #[test]
    fn step_averages_jittered_counters() {
        let raw = Array1::from_vec(vec![0u32, 9, 21, 30]);
        let (_, plan) = reconcile(&raw, 1000.0, -1, false).unwrap();
        assert_relative_eq!(plan.step, 0.01);
    }
}
