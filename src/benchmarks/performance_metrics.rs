//! Latency measurement and summary statistics.

use crate::device::PendingOutput;
use crate::errors::ExecutionResult;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Aggregate of one phase's latency samples, in milliseconds.
///
/// Every statistic is `None` for an empty sample set, so a phase that never
/// ran is distinguishable from a measured zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation; `None` with fewer than two samples.
    pub stddev: Option<f64>,
    pub count: usize,
}

pub fn summarize(samples: &[f64]) -> SummaryStatistics {
    let count = samples.len();
    if count == 0 {
        return SummaryStatistics::default();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = samples.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 1 {
        sorted[count / 2]
    } else {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    };
    let stddev = (count >= 2).then(|| {
        let variance =
            samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    });

    SummaryStatistics {
        min: sorted.first().copied(),
        max: sorted.last().copied(),
        mean: Some(mean),
        median: Some(median),
        stddev,
        count,
    }
}

/// Times `dispatch` through its synchronization barrier.
///
/// The clock stops only after [`PendingOutput::block_until_ready`], so
/// asynchronous dispatch cannot under-report latency.
pub fn timed_call<F>(dispatch: F) -> ExecutionResult<(Tensor, f64)>
where
    F: FnOnce() -> ExecutionResult<PendingOutput>,
{
    let start = Instant::now();
    let output = dispatch()?.block_until_ready()?;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    Ok((output, latency_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::ElementType;

    #[test]
    fn test_empty_samples_are_all_none() {
        let stats = summarize(&[]);
        assert_eq!(stats, SummaryStatistics::default());
        assert!(stats.min.is_none() && stats.median.is_none() && stats.stddev.is_none());
    }

    #[test]
    fn test_single_sample() {
        let stats = summarize(&[4.0]);
        assert_eq!(stats.min, Some(4.0));
        assert_eq!(stats.max, Some(4.0));
        assert_eq!(stats.mean, Some(4.0));
        assert_eq!(stats.median, Some(4.0));
        assert_eq!(stats.stddev, None);
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn test_even_count_median_averages_middle_values() {
        let stats = summarize(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.median, Some(2.5));
        assert_eq!(stats.mean, Some(2.5));
    }

    #[test]
    fn test_sample_standard_deviation() {
        // sum of squared deviations from the mean 5 is 32, n - 1 = 7
        let stats = summarize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((stats.stddev.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ordering_invariants() {
        let samples = [3.5, 0.25, 9.0, 1.0, 1.0, 7.75, 2.0];
        let stats = summarize(&samples);
        let (min, max) = (stats.min.unwrap(), stats.max.unwrap());
        assert!(min <= stats.median.unwrap() && stats.median.unwrap() <= max);
        assert!(min <= stats.mean.unwrap() && stats.mean.unwrap() <= max);
        assert_eq!(stats.count, samples.len());
    }

    #[test]
    fn test_timed_call_waits_for_output() {
        let tensor = Tensor::filled(vec![2], ElementType::F32, 1.0);
        let (output, latency) = timed_call(|| Ok(PendingOutput::Ready(tensor.clone()))).unwrap();
        assert_eq!(output, tensor);
        assert!(latency >= 0.0);
    }
}
