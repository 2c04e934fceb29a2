//! Smoothing and daily aggregation for per-provider API latency samples.
//!
//! Raw `(timestamp, provider, latency)` rows go in; per-provider LOWESS
//! trend lines, daily candlestick buckets and zero-latency anomaly markers
//! come out, shaped for a dashboard's chart layers.

pub mod cli;
pub mod error;
pub mod export;
pub mod metrics;
pub mod model;
pub mod pipeline;
mod text_summary;

pub use error::{PipelineError, Result};
pub use model::{
    DailyBucket, PipelineConfig, PipelineReport, ProviderReport, ProviderSeries, ProviderWarning,
    Sample, SmoothedPoint, SmoothingMode, WindowSpec, YAxisScale,
};
pub use pipeline::Pipeline;
