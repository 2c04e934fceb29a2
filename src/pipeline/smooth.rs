use std::time::Duration;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::{ProviderSeries, SmoothedPoint, WindowSpec};

/// Robust refits applied after the initial index-mode pass (Cleveland 1979).
const ROBUSTNESS_PASSES: usize = 3;

/// Smooth one provider's valid series with the selected window strategy.
///
/// Output carries exactly one point per input sample, in input order.
pub fn smooth(valid: &ProviderSeries, window: &WindowSpec) -> Result<Vec<SmoothedPoint>> {
    if valid.samples.is_empty() {
        return Err(PipelineError::InsufficientData {
            provider: valid.provider.clone(),
        });
    }

    let fitted = match window {
        WindowSpec::Fraction { frac } => {
            let ys: Vec<f64> = valid.samples.iter().map(|s| s.latency).collect();
            smooth_by_index(&ys, *frac)
        }
        WindowSpec::Trailing { window } => smooth_by_time(valid, *window),
    };

    Ok(valid
        .samples
        .iter()
        .zip(fitted)
        .map(|(sample, smoothed_latency)| SmoothedPoint {
            timestamp: sample.timestamp,
            provider: valid.provider.clone(),
            smoothed_latency,
        })
        .collect())
}

/// Global LOWESS pass over the sample index. Every window holds the nearest
/// neighbors by position, so wall-clock gaps are ignored and windows reach
/// forward as well as back.
fn smooth_by_index(ys: &[f64], frac: f64) -> Vec<f64> {
    let n = ys.len();
    if n < 2 {
        return ys.to_vec();
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let span = window_span(n, frac);
    debug!(n, span, "index smoothing pass");

    let mut fitted = smooth_pass(&xs, ys, span, &vec![1.0; n]);
    for pass in 0..ROBUSTNESS_PASSES {
        match robustness_weights(ys, &fitted) {
            Some(weights) => fitted = smooth_pass(&xs, ys, span, &weights),
            None => {
                debug!(pass, "smoothing converged early");
                break;
            }
        }
    }
    fitted
}

/// Causal pass: each sample is fitted on the trailing window `(t - window, t]`
/// and evaluated at its own timestamp, so no fit sees the future.
fn smooth_by_time(series: &ProviderSeries, window: Duration) -> Vec<f64> {
    let samples = &series.samples;
    let n = samples.len();
    if n < 2 {
        return samples.iter().map(|s| s.latency).collect();
    }

    // Seconds relative to the first sample keep the fits well conditioned.
    let t0 = samples[0].timestamp;
    let xs: Vec<f64> = samples
        .iter()
        .map(|s| (s.timestamp - t0).as_seconds_f64())
        .collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.latency).collect();
    let horizon = window.as_secs_f64();
    let robustness = vec![1.0; n];

    let mut fitted = Vec::with_capacity(n);
    let mut left = 0;
    for i in 0..n {
        // Strictly newer than t_i - window; the current sample always stays.
        while left < i && xs[left] <= xs[i] - horizon {
            left += 1;
        }
        fitted.push(fit_local(&xs, &ys, &robustness, left, i, xs[i]));
    }
    fitted
}

/// Points per window: a fraction of the series, clamped to [2, n].
fn window_span(n: usize, frac: f64) -> usize {
    let frac_n = (frac * n as f64).floor() as usize;
    usize::max(2, usize::min(n, frac_n))
}

fn smooth_pass(xs: &[f64], ys: &[f64], span: usize, robustness: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut window = Window::new(span, n);
    (0..n)
        .map(|i| {
            window.recenter(xs, i);
            fit_local(xs, ys, robustness, window.left, window.right, xs[i])
        })
        .collect()
}

/// Contiguous index window `[left, right]` holding the nearest neighbors of
/// the point being fitted.
struct Window {
    left: usize,
    right: usize,
}

impl Window {
    fn new(span: usize, n: usize) -> Self {
        Window {
            left: 0,
            right: usize::min(span, n) - 1,
        }
    }

    /// Slide right while the next point on the right is nearer than the point
    /// about to drop off the left.
    fn recenter(&mut self, xs: &[f64], idx: usize) {
        while self.right + 1 < xs.len() {
            let drop_left = xs[idx] - xs[self.left];
            let gain_right = xs[self.right + 1] - xs[idx];
            if drop_left <= gain_right {
                break;
            }
            self.left += 1;
            self.right += 1;
        }
    }
}

/// Tricube-weighted degree-1 least squares over `xs[left..=right]`, evaluated
/// at `x0`.
fn fit_local(
    xs: &[f64],
    ys: &[f64],
    robustness: &[f64],
    left: usize,
    right: usize,
    x0: f64,
) -> f64 {
    let d_max = f64::max(x0 - xs[left], xs[right] - x0);

    let mut sum_w = 0.0;
    let mut sum_wx = 0.0;
    let mut sum_wy = 0.0;
    for j in left..=right {
        let w = tricube(xs[j] - x0, d_max) * robustness[j];
        sum_w += w;
        sum_wx += w * xs[j];
        sum_wy += w * ys[j];
    }
    if sum_w <= 0.0 {
        // Every weight vanished (hard-rejected points at the window rim):
        // fall back to the plain window mean.
        let count = (right - left + 1) as f64;
        return ys[left..=right].iter().sum::<f64>() / count;
    }

    let x_bar = sum_wx / sum_w;
    let y_bar = sum_wy / sum_w;

    let mut var = 0.0;
    let mut cov = 0.0;
    for j in left..=right {
        let w = tricube(xs[j] - x0, d_max) * robustness[j];
        let dx = xs[j] - x_bar;
        var += w * dx * dx;
        cov += w * dx * (ys[j] - y_bar);
    }
    if var <= 0.0 {
        // All weighted points share one x (duplicate timestamps): the line
        // degenerates to the weighted mean.
        return y_bar;
    }
    y_bar + (cov / var) * (x0 - x_bar)
}

/// Cleveland's tricube kernel over the normalized distance `|d| / d_max`.
fn tricube(d: f64, d_max: f64) -> f64 {
    if d_max <= 0.0 {
        return 1.0;
    }
    let u = (d / d_max).abs();
    if u >= 1.0 {
        return 0.0;
    }
    let t = 1.0 - u * u * u;
    t * t * t
}

/// Bisquare weights on the residuals of the previous pass, scaled by six
/// times the median absolute residual.
///
/// `None` means the residuals are negligible against the data scale: the fit
/// has converged and another pass would only replay it.
fn robustness_weights(ys: &[f64], fitted: &[f64]) -> Option<Vec<f64>> {
    let n = ys.len();
    let mut abs_residuals: Vec<f64> = ys
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f).abs())
        .collect();
    let mean_abs = abs_residuals.iter().sum::<f64>() / n as f64;
    let data_scale = ys.iter().map(|y| y.abs()).sum::<f64>() / n as f64;
    if mean_abs <= f64::EPSILON.sqrt() * data_scale {
        return None;
    }

    abs_residuals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_abs = if n % 2 == 0 {
        (abs_residuals[n / 2 - 1] + abs_residuals[n / 2]) / 2.0
    } else {
        abs_residuals[n / 2]
    };
    // A zeroed median (over half the residuals exactly zero) would let one
    // gross outlier flip between rejected and kept on alternating passes;
    // the mean absolute residual keeps the scale positive.
    let scale = if median_abs > f64::EPSILON * mean_abs {
        median_abs
    } else {
        mean_abs
    };

    Some(
        ys.iter()
            .zip(fitted)
            .map(|(y, f)| {
                let u = (y - f) / (6.0 * scale);
                if u.abs() >= 1.0 {
                    0.0
                } else {
                    let t = 1.0 - u * u;
                    t * t
                }
            })
            .collect(),
    )
}
