use std::collections::BTreeMap;

use time::{Date, UtcOffset};

use crate::metrics;
use crate::model::{DailyBucket, ProviderSeries};

/// Aggregate a provider's valid samples into per-day candlestick buckets.
///
/// Days are UTC calendar dates regardless of the timestamp's offset; days
/// with no samples produce no bucket. Buckets come back in ascending day
/// order.
pub fn aggregate(valid: &ProviderSeries) -> Vec<DailyBucket> {
    let mut days: BTreeMap<Date, Vec<f64>> = BTreeMap::new();
    for sample in &valid.samples {
        let day = sample.timestamp.to_offset(UtcOffset::UTC).date();
        days.entry(day).or_default().push(sample.latency);
    }

    days.into_iter()
        .filter_map(|(day, latencies)| {
            let (median, std_dev, min, max) = metrics::compute_daily_stats(&latencies)?;
            Some(DailyBucket {
                provider: valid.provider.clone(),
                day,
                median,
                std_dev,
                min,
                max,
                sample_count: latencies.len(),
            })
        })
        .collect()
}
