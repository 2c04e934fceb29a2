//! The smoothing and aggregation pipeline, stage by stage.

mod anomaly;
mod daily;
mod partition;
mod smooth;

pub use anomaly::split;
pub use daily::aggregate;
pub use partition::{find, partition, validate};
pub use smooth::smooth;

use rand::RngCore;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{
    PipelineConfig, PipelineReport, ProviderReport, ProviderSeries, ProviderWarning, Sample,
    WindowSpec,
};

/// Composes partitioning, the anomaly split, smoothing and daily aggregation
/// into one run over a batch of raw samples.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Process one batch of samples into a report.
    ///
    /// A provider whose data fails validation is dropped from the report and
    /// recorded as a warning; only an entirely empty input is fatal.
    pub fn run(&self, samples: &[Sample]) -> Result<PipelineReport> {
        let series = partition(samples)?;
        let window = self.config.window_spec();
        debug!(providers = series.len(), "running latency pipeline");

        let mut providers = Vec::new();
        let mut warnings = Vec::new();
        for outcome in run_providers(series, &window) {
            match outcome {
                Ok(report) => providers.push(report),
                Err(warning) => {
                    warn!(
                        provider = %warning.provider,
                        message = %warning.message,
                        "dropping provider from report"
                    );
                    warnings.push(warning);
                }
            }
        }

        Ok(PipelineReport {
            run_id: gen_run_id(),
            generated_utc: time::OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            config: self.config.clone(),
            providers,
            warnings,
        })
    }
}

/// One provider through the whole pipeline. An `Err` drops the provider,
/// never the run.
fn run_provider(
    series: ProviderSeries,
    window: &WindowSpec,
) -> std::result::Result<ProviderReport, ProviderWarning> {
    if let Err(err) = validate(&series) {
        return Err(ProviderWarning {
            provider: series.provider,
            message: err.to_string(),
        });
    }

    let (valid, anomalies) = split(series);
    debug!(
        provider = %valid.provider,
        valid = valid.samples.len(),
        anomalies = anomalies.len(),
        "split provider series"
    );

    // A provider whose every sample was anomalous still reports its markers.
    let smoothed = if valid.samples.is_empty() {
        Vec::new()
    } else {
        match smooth(&valid, window) {
            Ok(points) => points,
            Err(err) => {
                return Err(ProviderWarning {
                    provider: valid.provider,
                    message: err.to_string(),
                })
            }
        }
    };
    let daily = aggregate(&valid);

    Ok(ProviderReport {
        provider: valid.provider.clone(),
        points: valid.samples,
        smoothed,
        daily,
        anomalies,
    })
}

#[cfg(feature = "parallel")]
fn run_providers(
    series: Vec<ProviderSeries>,
    window: &WindowSpec,
) -> Vec<std::result::Result<ProviderReport, ProviderWarning>> {
    use rayon::prelude::*;
    // Indexed collect keeps first-appearance order identical to the serial path.
    series
        .into_par_iter()
        .map(|s| run_provider(s, window))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn run_providers(
    series: Vec<ProviderSeries>,
    window: &WindowSpec,
) -> Vec<std::result::Result<ProviderReport, ProviderWarning>> {
    series
        .into_iter()
        .map(|s| run_provider(s, window))
        .collect()
}

/// Random identifier attached to each report.
fn gen_run_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_numeric_and_distinct() {
        let a = gen_run_id();
        let b = gen_run_id();
        assert!(a.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(a, b);
    }
}
