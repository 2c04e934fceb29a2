use std::collections::HashMap;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::{ProviderSeries, Sample};

/// Group raw samples into one series per provider.
///
/// Input order is arbitrary; each series comes back sorted ascending by
/// timestamp (stable, so duplicate timestamps keep their input order) and
/// series are returned in first-appearance order of their provider.
pub fn partition(samples: &[Sample]) -> Result<Vec<ProviderSeries>> {
    if samples.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<Sample>> = HashMap::new();
    for sample in samples {
        grouped
            .entry(sample.provider.as_str())
            .or_insert_with(|| {
                order.push(sample.provider.as_str());
                Vec::new()
            })
            .push(sample.clone());
    }

    let mut series = Vec::with_capacity(order.len());
    for provider in order {
        let mut samples = grouped.remove(provider).unwrap_or_default();
        samples.sort_by_key(|s| s.timestamp);
        debug!(provider, samples = samples.len(), "partitioned provider");
        series.push(ProviderSeries {
            provider: provider.to_string(),
            samples,
        });
    }
    Ok(series)
}

/// Reject a series containing latencies the pipeline cannot process.
///
/// Negative and non-finite values are bad ingestion, not anomalies; the
/// caller decides whether the failure is fatal or only drops this provider.
pub fn validate(series: &ProviderSeries) -> Result<()> {
    for sample in &series.samples {
        if !sample.latency.is_finite() || sample.latency < 0.0 {
            return Err(PipelineError::InvalidSample {
                provider: series.provider.clone(),
                latency: sample.latency,
            });
        }
    }
    Ok(())
}

/// Look up one provider's series by key.
pub fn find<'a>(series: &'a [ProviderSeries], provider: &str) -> Option<&'a ProviderSeries> {
    series.iter().find(|s| s.provider == provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample(ts: time::OffsetDateTime, provider: &str, latency: f64) -> Sample {
        Sample {
            timestamp: ts,
            provider: provider.to_string(),
            latency,
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(partition(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn groups_by_provider_in_first_appearance_order() {
        let samples = vec![
            sample(datetime!(2024-01-15 09:00 UTC), "beta", 10.0),
            sample(datetime!(2024-01-15 09:05 UTC), "alpha", 20.0),
            sample(datetime!(2024-01-15 09:10 UTC), "beta", 30.0),
        ];
        let series = partition(&samples).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].provider, "beta");
        assert_eq!(series[1].provider, "alpha");
        assert_eq!(series[0].samples.len(), 2);
        assert_eq!(series[1].samples.len(), 1);
    }

    #[test]
    fn sorts_each_series_by_timestamp() {
        let samples = vec![
            sample(datetime!(2024-01-15 10:00 UTC), "x", 3.0),
            sample(datetime!(2024-01-15 08:00 UTC), "x", 1.0),
            sample(datetime!(2024-01-15 09:00 UTC), "x", 2.0),
        ];
        let series = partition(&samples).unwrap();
        let latencies: Vec<f64> = series[0].samples.iter().map(|s| s.latency).collect();
        assert_eq!(latencies, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn duplicate_timestamps_keep_input_order() {
        let ts = datetime!(2024-01-15 09:00 UTC);
        let samples = vec![
            sample(ts, "x", 5.0),
            sample(ts, "x", 6.0),
            sample(ts, "x", 7.0),
        ];
        let series = partition(&samples).unwrap();
        let latencies: Vec<f64> = series[0].samples.iter().map(|s| s.latency).collect();
        assert_eq!(latencies, vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn partition_is_idempotent() {
        let samples = vec![
            sample(datetime!(2024-01-15 10:00 UTC), "y", 3.0),
            sample(datetime!(2024-01-15 08:00 UTC), "x", 1.0),
            sample(datetime!(2024-01-15 09:00 UTC), "y", 2.0),
        ];
        assert_eq!(partition(&samples).unwrap(), partition(&samples).unwrap());
    }

    #[test]
    fn negative_latency_fails_validation() {
        let series = ProviderSeries {
            provider: "x".into(),
            samples: vec![sample(datetime!(2024-01-15 09:00 UTC), "x", -5.0)],
        };
        match validate(&series) {
            Err(PipelineError::InvalidSample { provider, latency }) => {
                assert_eq!(provider, "x");
                assert_eq!(latency, -5.0);
            }
            other => panic!("expected InvalidSample, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_latency_fails_validation() {
        let series = ProviderSeries {
            provider: "x".into(),
            samples: vec![sample(datetime!(2024-01-15 09:00 UTC), "x", f64::NAN)],
        };
        assert!(validate(&series).is_err());
    }

    #[test]
    fn zero_latency_passes_validation() {
        let series = ProviderSeries {
            provider: "x".into(),
            samples: vec![sample(datetime!(2024-01-15 09:00 UTC), "x", 0.0)],
        };
        assert!(validate(&series).is_ok());
    }

    #[test]
    fn find_locates_series_by_key() {
        let samples = vec![
            sample(datetime!(2024-01-15 09:00 UTC), "x", 1.0),
            sample(datetime!(2024-01-15 09:00 UTC), "y", 2.0),
        ];
        let series = partition(&samples).unwrap();
        assert!(find(&series, "y").is_some());
        assert!(find(&series, "z").is_none());
    }
}
