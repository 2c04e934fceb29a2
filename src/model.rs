use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::{Date, OffsetDateTime};

time::serde::format_description!(day_format, Date, "[year]-[month]-[day]");

pub const DEFAULT_FRAC: f64 = 0.05;
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// One raw latency measurement pulled from the warehouse export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub provider: String,
    pub latency: f64,
}

/// All samples of one provider, sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSeries {
    pub provider: String,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedPoint {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub provider: String,
    pub smoothed_latency: f64,
}

/// Per-day candlestick statistics for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub provider: String,
    #[serde(with = "day_format")]
    pub day: Date,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub sample_count: usize,
}

impl DailyBucket {
    /// Lower edge of the candlestick body (median minus one std dev).
    pub fn band_low(&self) -> f64 {
        self.median - self.std_dev
    }

    /// Upper edge of the candlestick body (median plus one std dev).
    pub fn band_high(&self) -> f64 {
        self.median + self.std_dev
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    /// Global pass over the sample index, window sized as a fraction of the series.
    Index,
    /// Per-sample trailing wall-clock window.
    Time,
}

impl SmoothingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SmoothingMode::Index => "index",
            SmoothingMode::Time => "time",
        }
    }
}

impl std::str::FromStr for SmoothingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "index" => Ok(SmoothingMode::Index),
            "time" => Ok(SmoothingMode::Time),
            other => Err(format!(
                "unknown smoothing mode '{other}' (expected 'index' or 'time')"
            )),
        }
    }
}

/// Y-axis scale hint for the chart layer. Carried through the report untouched;
/// the pipeline never transforms latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YAxisScale {
    Linear,
    Log,
    Symlog,
    Sqrt,
}

impl YAxisScale {
    pub fn as_str(self) -> &'static str {
        match self {
            YAxisScale::Linear => "linear",
            YAxisScale::Log => "log",
            YAxisScale::Symlog => "symlog",
            YAxisScale::Sqrt => "sqrt",
        }
    }
}

impl std::str::FromStr for YAxisScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(YAxisScale::Linear),
            "log" => Ok(YAxisScale::Log),
            "symlog" => Ok(YAxisScale::Symlog),
            "sqrt" => Ok(YAxisScale::Sqrt),
            other => Err(format!(
                "unknown y-axis scale '{other}' (expected 'linear', 'log', 'symlog' or 'sqrt')"
            )),
        }
    }
}

/// Smoothing window selection, resolved from the config before each run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WindowSpec {
    /// Nearest-neighbor window holding a fraction of the whole series.
    Fraction { frac: f64 },
    /// Trailing window ending at the evaluated sample, inclusive.
    Trailing {
        #[serde(with = "humantime_serde")]
        window: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub smoothing: SmoothingMode,
    pub frac: f64,
    #[serde(with = "humantime_serde")]
    pub time_window: Duration,
    pub y_axis_scale: YAxisScale,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingMode::Index,
            frac: DEFAULT_FRAC,
            time_window: DEFAULT_TIME_WINDOW,
            y_axis_scale: YAxisScale::Linear,
        }
    }
}

impl PipelineConfig {
    /// Resolve the window strategy selected by `smoothing`.
    pub fn window_spec(&self) -> WindowSpec {
        match self.smoothing {
            SmoothingMode::Index => WindowSpec::Fraction { frac: self.frac },
            SmoothingMode::Time => WindowSpec::Trailing {
                window: self.time_window,
            },
        }
    }
}

/// Everything derived for one provider in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReport {
    pub provider: String,
    /// Valid raw points, for the optional scatter layer.
    pub points: Vec<Sample>,
    pub smoothed: Vec<SmoothedPoint>,
    pub daily: Vec<DailyBucket>,
    /// Zero-latency samples, surfaced separately as failure markers.
    pub anomalies: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderWarning {
    pub provider: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    #[serde(default)]
    pub generated_utc: String,
    pub config: PipelineConfig,
    /// Providers in first-appearance order of the raw input.
    pub providers: Vec<ProviderReport>,
    #[serde(default)]
    pub warnings: Vec<ProviderWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_mode_parses_case_insensitive() {
        assert_eq!("index".parse::<SmoothingMode>(), Ok(SmoothingMode::Index));
        assert_eq!("Time".parse::<SmoothingMode>(), Ok(SmoothingMode::Time));
        assert!("lowess".parse::<SmoothingMode>().is_err());
    }

    #[test]
    fn y_axis_scale_parses_all_options() {
        for (s, scale) in [
            ("linear", YAxisScale::Linear),
            ("log", YAxisScale::Log),
            ("symlog", YAxisScale::Symlog),
            ("sqrt", YAxisScale::Sqrt),
        ] {
            assert_eq!(s.parse::<YAxisScale>(), Ok(scale));
            assert_eq!(scale.as_str(), s);
        }
        assert!("loglog".parse::<YAxisScale>().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PipelineConfig {
            smoothing: SmoothingMode::Time,
            frac: 0.1,
            time_window: Duration::from_secs(6 * 60 * 60),
            y_axis_scale: YAxisScale::Log,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"time\""));
        assert!(json.contains("6h"));
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn default_config_matches_dashboard_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.smoothing, SmoothingMode::Index);
        assert!((config.frac - 0.05).abs() < 1e-12);
        assert_eq!(config.time_window, Duration::from_secs(86_400));
        assert_eq!(config.y_axis_scale, YAxisScale::Linear);
    }

    #[test]
    fn bucket_band_is_centered_on_median() {
        let bucket = DailyBucket {
            provider: "x".into(),
            day: time::macros::date!(2024 - 01 - 15),
            median: 110.0,
            std_dev: 14.0,
            min: 100.0,
            max: 120.0,
            sample_count: 2,
        };
        assert!((bucket.band_low() - 96.0).abs() < 1e-12);
        assert!((bucket.band_high() - 124.0).abs() < 1e-12);
    }

    #[test]
    fn bucket_day_serializes_as_calendar_date() {
        let bucket = DailyBucket {
            provider: "x".into(),
            day: time::macros::date!(2024 - 01 - 15),
            median: 1.0,
            std_dev: 0.0,
            min: 1.0,
            max: 1.0,
            sample_count: 1,
        };
        let json = serde_json::to_string(&bucket).unwrap();
        assert!(json.contains("\"2024-01-15\""));
    }
}
