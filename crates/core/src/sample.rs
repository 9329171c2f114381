use crate::error::{MeterError, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One CPU-usage observation, stamped with the session's elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since the run started (a multiple of the interval).
    pub elapsed_ms: u64,
    /// Host-wide CPU usage (0.0 – 100.0).
    pub usage_percent: f32,
}

impl Sample {
    #[must_use]
    pub const fn new(elapsed_ms: u64, usage_percent: f32) -> Self {
        Self {
            elapsed_ms,
            usage_percent,
        }
    }
}

/// Mean usage over `samples`, or [`MeterError::NoData`] when empty.
pub fn average(samples: &[Sample]) -> Result<f32> {
    if samples.is_empty() {
        return Err(MeterError::NoData);
    }
    let sum: f64 = samples.iter().map(|s| f64::from(s.usage_percent)).sum();
    Ok((sum / samples.len() as f64) as f32)
}

/// Highest usage in `samples`, or [`MeterError::NoData`] when empty.
pub fn max(samples: &[Sample]) -> Result<f32> {
    samples
        .iter()
        .map(|s| s.usage_percent)
        .reduce(f32::max)
        .ok_or(MeterError::NoData)
}

/// Lowest usage in `samples`, or [`MeterError::NoData`] when empty.
pub fn min(samples: &[Sample]) -> Result<f32> {
    samples
        .iter()
        .map(|s| s.usage_percent)
        .reduce(f32::min)
        .ok_or(MeterError::NoData)
}

/// Point-in-time aggregate view of a sampling session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub average: f32,
    pub min: f32,
    pub max: f32,
    /// Elapsed milliseconds of the current (or last) run.
    pub runtime_ms: u64,
    /// Derived count: `runtime_ms / interval_ms`.
    pub sample_count: u64,
    /// Literal length of the recorded series.
    pub samples_recorded: usize,
    pub interval_ms: u64,
    /// Local time of the most recent `start`, if the session was ever started.
    pub started_at: Option<DateTime<Local>>,
}

impl Summary {
    /// Aggregate `samples` together with the session counters.
    ///
    /// Fails with [`MeterError::NoData`] when `samples` is empty.
    pub fn from_samples(
        samples: &[Sample],
        runtime_ms: u64,
        interval_ms: u64,
        started_at: Option<DateTime<Local>>,
    ) -> Result<Self> {
        Ok(Self {
            average: average(samples)?,
            min: min(samples)?,
            max: max(samples)?,
            runtime_ms,
            sample_count: runtime_ms.checked_div(interval_ms).unwrap_or(0),
            samples_recorded: samples.len(),
            interval_ms,
            started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f32]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(i as u64 * 100, *v))
            .collect()
    }

    #[test]
    fn aggregates_of_known_values() {
        let s = series(&[10.0, 20.0, 30.0]);
        assert_eq!(average(&s).unwrap(), 20.0);
        assert_eq!(max(&s).unwrap(), 30.0);
        assert_eq!(min(&s).unwrap(), 10.0);
    }

    #[test]
    fn aggregates_of_empty_series_are_no_data() {
        assert!(matches!(average(&[]), Err(MeterError::NoData)));
        assert!(matches!(max(&[]), Err(MeterError::NoData)));
        assert!(matches!(min(&[]), Err(MeterError::NoData)));
    }

    #[test]
    fn single_sample_is_its_own_aggregate() {
        let s = series(&[42.5]);
        assert_eq!(average(&s).unwrap(), 42.5);
        assert_eq!(max(&s).unwrap(), 42.5);
        assert_eq!(min(&s).unwrap(), 42.5);
    }

    #[test]
    fn summary_derives_count_from_runtime() {
        let s = series(&[5.0, 15.0]);
        let summary = Summary::from_samples(&s, 200, 100, None).unwrap();
        assert_eq!(summary.sample_count, 2);
        assert_eq!(summary.samples_recorded, 2);
        assert_eq!(summary.average, 10.0);
    }

    #[test]
    fn summary_of_empty_series_is_no_data() {
        assert!(matches!(
            Summary::from_samples(&[], 0, 1000, None),
            Err(MeterError::NoData)
        ));
    }

    #[test]
    fn summary_serializes_to_json() {
        let s = series(&[50.0]);
        let summary = Summary::from_samples(&s, 100, 100, None).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["sample_count"], 1);
        assert_eq!(json["started_at"], serde_json::Value::Null);
    }
}
