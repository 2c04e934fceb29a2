use crate::model::{ProviderSeries, Sample};

/// Split a series into its valid samples and its zero-latency anomalies.
///
/// Exact zero is the sentinel the warehouse writes for a failed probe;
/// near-zero latencies are real measurements and stay valid. Both halves
/// keep their relative order.
pub fn split(series: ProviderSeries) -> (ProviderSeries, Vec<Sample>) {
    let ProviderSeries { provider, samples } = series;
    let (anomalies, valid): (Vec<Sample>, Vec<Sample>) =
        samples.into_iter().partition(|s| s.latency == 0.0);
    (
        ProviderSeries {
            provider,
            samples: valid,
        },
        anomalies,
    )
}
