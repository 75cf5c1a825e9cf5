//! NaN-skipping reductions. Each returns NaN when every value is NaN.

use ndarray::ArrayView1;

fn valid(values: ArrayView1<'_, f64>) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

pub fn nan_mean(values: ArrayView1<'_, f64>) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

pub fn nan_min(values: ArrayView1<'_, f64>) -> f64 {
    values.iter().copied().filter(|v| !v.is_nan()).reduce(f64::min).unwrap_or(f64::NAN)
}

pub fn nan_max(values: ArrayView1<'_, f64>) -> f64 {
    values.iter().copied().filter(|v| !v.is_nan()).reduce(f64::max).unwrap_or(f64::NAN)
}

/// Quantile with linear interpolation between the two nearest ranks.
pub fn nan_quantile(values: ArrayView1<'_, f64>, q: f64) -> f64 {
    let mut sorted = valid(values);
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    if frac == 0.0 {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

pub fn nan_median(values: ArrayView1<'_, f64>) -> f64 {
    nan_quantile(values, 0.5)
}
