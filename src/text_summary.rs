//! Text summary builder for CLI output.
//!
//! Formats a finished report as human-readable lines for text mode.

use crate::metrics;
use crate::model::{PipelineReport, SmoothingMode};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a pipeline report.
pub(crate) fn build_text_summary(report: &PipelineReport) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Run {} at {}", report.run_id, report.generated_utc));
    let smoothing = match report.config.smoothing {
        SmoothingMode::Index => format!("index (frac {})", report.config.frac),
        SmoothingMode::Time => format!(
            "time (window {})",
            humantime::format_duration(report.config.time_window)
        ),
    };
    lines.push(format!(
        "Smoothing: {smoothing} | y-axis: {}",
        report.config.y_axis_scale.as_str()
    ));

    for provider in &report.providers {
        lines.push(format!(
            "{}: {} points, {} anomalies, {} days",
            provider.provider,
            provider.points.len(),
            provider.anomalies.len(),
            provider.daily.len()
        ));
        let latencies: Vec<f64> = provider.points.iter().map(|s| s.latency).collect();
        if let Some((median, std_dev, min, max)) = metrics::compute_daily_stats(&latencies) {
            lines.push(format!(
                "  latency: med {:.1} sd {:.1} min {:.1} max {:.1} ms",
                median, std_dev, min, max
            ));
        }
    }

    for warning in &report.warnings {
        lines.push(format!(
            "warning: {}: {}",
            warning.provider, warning.message
        ));
    }

    TextSummary { lines }
}
