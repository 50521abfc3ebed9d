//! Stateless numeric helpers shared across the pipeline.
//!
//! Edge contracts: empty inputs return 0 (INFINITY / NEG_INFINITY for
//! min / max); zero denominators and zero norms yield 0 unless a function
//! documents otherwise.

use rand::Rng;

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

pub fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Min-max normalize into [0, 1]. A zero range maps everything to 0.
pub fn normalize(xs: &[f64]) -> Vec<f64> {
    if xs.is_empty() {
        return Vec::new();
    }
    let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    if range == 0.0 {
        return vec![0.0; xs.len()];
    }
    xs.iter().map(|&x| (x - lo) / range).collect()
}

pub fn z_score(x: f64, xs: &[f64]) -> f64 {
    let sd = std_dev(xs);
    if sd == 0.0 {
        return 0.0;
    }
    (x - mean(xs)) / sd
}

/// Simple moving average of the last `period` samples.
pub fn sma(xs: &[f64], period: usize) -> f64 {
    if xs.is_empty() || period == 0 {
        return 0.0;
    }
    let start = xs.len().saturating_sub(period);
    mean(&xs[start..])
}

/// Exponential moving average with alpha = 2 / (period + 1), seeded with
/// the first sample. Returns the final value of the series.
pub fn ema(xs: &[f64], period: usize) -> f64 {
    ema_series(xs, period).last().copied().unwrap_or(0.0)
}

pub fn ema_series(xs: &[f64], period: usize) -> Vec<f64> {
    if xs.is_empty() || period == 0 {
        return Vec::new();
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(xs.len());
    let mut value = xs[0];
    out.push(value);
    for &x in &xs[1..] {
        value = alpha * x + (1.0 - alpha) * value;
        out.push(value);
    }
    out
}

/// Bollinger bands over the last `period` samples: (middle, upper, lower).
pub fn bollinger(xs: &[f64], period: usize, k: f64) -> (f64, f64, f64) {
    if xs.is_empty() || period == 0 {
        return (0.0, 0.0, 0.0);
    }
    let start = xs.len().saturating_sub(period);
    let window = &xs[start..];
    let mid = mean(window);
    let sd = std_dev(window);
    (mid, mid + k * sd, mid - k * sd)
}

/// Wilder-style RSI. Returns 100 when there are no losses in the window
/// (the conventional reading of a zero average loss), 0 on short input.
pub fn rsi(xs: &[f64], period: usize) -> f64 {
    if period == 0 || xs.len() <= period {
        return 0.0;
    }
    let diffs: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = diffs[..period].iter().filter(|&&d| d > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss =
        diffs[..period].iter().filter(|&&d| d < 0.0).map(|d| -d).sum::<f64>() / period as f64;

    for &d in &diffs[period..] {
        let gain = if d > 0.0 { d } else { 0.0 };
        let loss = if d < 0.0 { -d } else { 0.0 };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD (12 / 26 / 9): (macd, signal, histogram) at the final sample.
pub fn macd(xs: &[f64]) -> (f64, f64, f64) {
    if xs.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let fast = ema_series(xs, 12);
    let slow = ema_series(xs, 26);
    let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&macd_line, 9);
    let m = macd_line.last().copied().unwrap_or(0.0);
    (m, signal, m - signal)
}

pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for i in 0..n {
        let da = a[i] - ma;
        let db = b[i] - mb;
        cov += da * db;
        va += da * da;
        vb += db * db;
    }
    let denom = (va * vb).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    cov / denom
}

/// Simple returns: p[i] / p[i-1] - 1. Length is len(prices) - 1.
pub fn returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| {
            if w[0] <= 0.0 || w[1] <= 0.0 {
                0.0
            } else {
                (w[1] / w[0]).ln()
            }
        })
        .collect()
}

/// Sharpe ratio of a return series, annualized by `factor`.
pub fn sharpe(rets: &[f64], factor: f64) -> f64 {
    let sd = std_dev(rets);
    if sd == 0.0 {
        return 0.0;
    }
    mean(rets) / sd * factor
}

/// Maximum peak-to-trough drawdown of an equity curve, as a fraction.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &e in equity {
        peak = peak.max(e);
        if peak > 0.0 {
            worst = worst.max((peak - e) / peak);
        }
    }
    worst
}

/// Kelly criterion: win - (1 - win) / payoff. Zero when payoff is not
/// positive.
pub fn kelly(win_rate: f64, payoff: f64) -> f64 {
    if payoff <= 0.0 {
        return 0.0;
    }
    win_rate - (1.0 - win_rate) / payoff
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    (0..n).map(|i| (a[i] - b[i]).powi(2)).sum::<f64>().sqrt()
}

/// Cosine similarity; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let dot: f64 = (0..n).map(|i| a[i] * b[i]).sum();
    let na: f64 = a[..n].iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b[..n].iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Cubic Hermite smoothstep between the two edges.
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge0 == edge1 {
        return 0.0;
    }
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Quintic (Perlin) smoothstep between the two edges.
pub fn quintic_step(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge0 == edge1 {
        return 0.0;
    }
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Gaussian sample via Box-Muller.
pub fn gaussian<R: Rng>(rng: &mut R, mu: f64, sigma: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mu + sigma * z
}

/// NaN / infinity guard applied at component boundaries.
pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn mean_and_std_dev() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[1.0, 2.0, 3.0]) - 2.0).abs() < 1e-9);
        assert_eq!(std_dev(&[5.0]), 0.0);
        // population sigma of [2,4,4,4,5,5,7,9] is 2
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&xs) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[]), 0.0);
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < 1e-9);
        assert!((median(&[4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn normalize_min_max() {
        let out = normalize(&[10.0, 20.0, 30.0]);
        assert!((out[0] - 0.0).abs() < 1e-9);
        assert!((out[1] - 0.5).abs() < 1e-9);
        assert!((out[2] - 1.0).abs() < 1e-9);
        // constant input maps to zeros
        assert_eq!(normalize(&[7.0, 7.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn ema_seeds_with_first_sample() {
        // alpha = 2/3 with period 2
        let xs = [10.0, 13.0];
        let expected = 2.0 / 3.0 * 13.0 + 1.0 / 3.0 * 10.0;
        assert!((ema(&xs, 2) - expected).abs() < 1e-9);
        assert!((ema(&[42.0], 10) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_known_behavior() {
        // Monotone rise: no losses anywhere
        let up: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert!((rsi(&up, 14) - 100.0).abs() < 1e-9);

        let down: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        assert!(rsi(&down, 14) < 1.0);

        assert_eq!(rsi(&[1.0, 2.0], 14), 0.0);
    }

    #[test]
    fn macd_zero_on_flat_series() {
        let flat = vec![100.0; 60];
        let (m, s, h) = macd(&flat);
        assert!(m.abs() < 1e-9 && s.abs() < 1e-9 && h.abs() < 1e-9);
    }

    #[test]
    fn pearson_perfect_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-9);
        let c = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&a, &c) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn returns_length_contract() {
        let p = [100.0, 110.0, 99.0];
        let r = returns(&p);
        assert_eq!(r.len(), p.len() - 1);
        assert!((r[0] - 0.1).abs() < 1e-9);
        assert!((r[1] + 0.1).abs() < 1e-9);
        assert!(returns(&[]).is_empty());
    }

    #[test]
    fn max_drawdown_known_curve() {
        let equity = [100.0, 120.0, 90.0, 110.0, 80.0];
        // peak 120 -> trough 80: 1/3
        assert!((max_drawdown(&equity) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn kelly_formula() {
        // win 0.6, payoff 2 => 0.6 - 0.4/2 = 0.4
        assert!((kelly(0.6, 2.0) - 0.4).abs() < 1e-9);
        assert_eq!(kelly(0.6, 0.0), 0.0);
        assert!(kelly(0.3, 1.0) < 0.0);
    }

    #[test]
    fn cosine_zero_norm_contract() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn smoothstep_edges() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-9);
        assert!((quintic_step(0.0, 1.0, 0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn gaussian_is_deterministic_per_seed() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let x = gaussian(&mut a, 0.0, 1.0);
            let y = gaussian(&mut b, 0.0, 1.0);
            assert_eq!(x, y);
            assert!(x.is_finite());
        }
    }

    #[test]
    fn finite_guard() {
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
        assert_eq!(finite_or_zero(3.5), 3.5);
    }
}
