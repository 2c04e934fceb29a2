//! Flat tabular views of a report, ready for chart binding or CSV export.

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::model::PipelineReport;

#[derive(Debug, Clone, Serialize)]
pub struct SmoothedRow {
    pub timestamp: String,
    pub provider: String,
    pub smoothed_latency: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRow {
    pub day: String,
    pub provider: String,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub band_low: f64,
    pub band_high: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyRow {
    pub timestamp: String,
    pub provider: String,
    pub latency: f64,
}

fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

/// One row per smoothed point, across all providers.
pub fn smoothed_rows(report: &PipelineReport) -> Vec<SmoothedRow> {
    report
        .providers
        .iter()
        .flat_map(|p| {
            p.smoothed.iter().map(|point| SmoothedRow {
                timestamp: rfc3339(point.timestamp),
                provider: point.provider.clone(),
                smoothed_latency: point.smoothed_latency,
            })
        })
        .collect()
}

/// One row per (provider, day) bucket, with the candlestick band edges the
/// chart layer draws around the median.
pub fn daily_rows(report: &PipelineReport) -> Vec<DailyRow> {
    report
        .providers
        .iter()
        .flat_map(|p| {
            p.daily.iter().map(|bucket| DailyRow {
                day: bucket
                    .day
                    .format(format_description!("[year]-[month]-[day]"))
                    .unwrap_or_default(),
                provider: bucket.provider.clone(),
                median: bucket.median,
                std_dev: bucket.std_dev,
                min: bucket.min,
                max: bucket.max,
                band_low: bucket.band_low(),
                band_high: bucket.band_high(),
                sample_count: bucket.sample_count,
            })
        })
        .collect()
}

/// One row per zero-latency anomaly, for the failure marker layer.
pub fn anomaly_rows(report: &PipelineReport) -> Vec<AnomalyRow> {
    report
        .providers
        .iter()
        .flat_map(|p| {
            p.anomalies.iter().map(|s| AnomalyRow {
                timestamp: rfc3339(s.timestamp),
                provider: s.provider.clone(),
                latency: s.latency,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DailyBucket, PipelineConfig, ProviderReport, Sample, SmoothedPoint,
    };
    use time::macros::{date, datetime};

    fn report() -> PipelineReport {
        let ts = datetime!(2024-01-15 09:00 UTC);
        PipelineReport {
            run_id: "1".into(),
            generated_utc: "2024-01-15T12:00:00Z".into(),
            config: PipelineConfig::default(),
            providers: vec![ProviderReport {
                provider: "x".into(),
                points: vec![Sample {
                    timestamp: ts,
                    provider: "x".into(),
                    latency: 100.0,
                }],
                smoothed: vec![SmoothedPoint {
                    timestamp: ts,
                    provider: "x".into(),
                    smoothed_latency: 101.5,
                }],
                daily: vec![DailyBucket {
                    provider: "x".into(),
                    day: date!(2024 - 01 - 15),
                    median: 110.0,
                    std_dev: 14.0,
                    min: 100.0,
                    max: 120.0,
                    sample_count: 2,
                }],
                anomalies: vec![Sample {
                    timestamp: ts,
                    provider: "x".into(),
                    latency: 0.0,
                }],
            }],
            warnings: vec![],
        }
    }

    #[test]
    fn smoothed_rows_carry_rfc3339_timestamps() {
        let rows = smoothed_rows(&report());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, "2024-01-15T09:00:00Z");
        assert_eq!(rows[0].provider, "x");
        assert!((rows[0].smoothed_latency - 101.5).abs() < 1e-12);
    }

    #[test]
    fn daily_rows_expose_band_edges() {
        let rows = daily_rows(&report());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].day, "2024-01-15");
        assert!((rows[0].band_low - 96.0).abs() < 1e-12);
        assert!((rows[0].band_high - 124.0).abs() < 1e-12);
        assert_eq!(rows[0].sample_count, 2);
    }

    #[test]
    fn anomaly_rows_keep_the_zero_latency() {
        let rows = anomaly_rows(&report());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].latency, 0.0);
    }
}
