//! Numerical building blocks shared by the analyzers.
//!
//! p-value helpers return `None` when the reference distribution cannot be
//! built for the given degrees of freedom; callers then report the effect
//! size alone and flag the result.

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use std::cmp::Ordering;

/// Arithmetic mean. `None` for an empty slice.
///
/// A constant slice returns its value exactly, so centered sums around it are
/// exactly zero.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    let first = *values.first()?;
    if is_constant(values) {
        return Some(first);
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// True when every value equals the first (vacuously for an empty slice).
pub(crate) fn is_constant(values: &[f64]) -> bool {
    values.split_first().is_none_or(|(first, rest)| rest.iter().all(|v| v == first))
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub(crate) fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Centered sums of squares and cross-products of two paired samples.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Moments {
    pub sxx: f64,
    pub syy: f64,
    pub sxy: f64,
}

impl Moments {
    pub fn compute(x: &[f64], y: &[f64]) -> Self {
        let mx = mean(x).unwrap_or_default();
        let my = mean(y).unwrap_or_default();
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for (a, b) in x.iter().zip(y) {
            let dx = a - mx;
            let dy = b - my;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        Self { sxx, syy, sxy }
    }

    pub fn is_finite(&self) -> bool {
        self.sxx.is_finite() && self.syy.is_finite() && self.sxy.is_finite()
    }

    /// Pearson coefficient; `None` when either side has zero variance.
    pub fn correlation(&self) -> Option<f64> {
        if self.sxx <= 0.0 || self.syy <= 0.0 {
            return None;
        }
        Some((self.sxy / (self.sxx * self.syy).sqrt()).clamp(-1.0, 1.0))
    }
}

/// Average ranks (1-based), ties share the mean of their positions.
pub(crate) fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Kendall's tau-b in O(n log n) (Knight's algorithm).
///
/// `None` when either variable is constant.
pub(crate) fn kendall_tau_b(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 {
        return None;
    }

    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let x_ties = tied_pairs(&pairs, |a, b| a.0 == b.0);
    let joint_ties = tied_pairs(&pairs, |a, b| a.0 == b.0 && a.1 == b.1);

    let mut ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let mut buffer = vec![0.0; n];
    let swaps = count_inversions(&mut ys, &mut buffer);

    let y_ties = tied_runs(&ys);

    let total = (n * (n - 1) / 2) as f64;
    let (n1, n2, n3) = (x_ties as f64, y_ties as f64, joint_ties as f64);
    let denom = ((total - n1) * (total - n2)).sqrt();
    if denom <= 0.0 {
        return None;
    }
    let score = total - n1 - n2 + n3 - 2.0 * swaps as f64;
    Some((score / denom).clamp(-1.0, 1.0))
}

/// Number of tied pairs among adjacent runs of a sorted slice.
fn tied_pairs<T>(sorted: &[T], same: impl Fn(&T, &T) -> bool) -> u64 {
    let mut total = 0u64;
    let mut run = 1u64;
    for w in sorted.windows(2) {
        if same(&w[0], &w[1]) {
            run += 1;
        } else {
            total += run * (run - 1) / 2;
            run = 1;
        }
    }
    total + run * (run - 1) / 2
}

fn tied_runs(sorted: &[f64]) -> u64 {
    tied_pairs(sorted, |a, b| a == b)
}

/// Merge sort counting strict inversions.
fn count_inversions(values: &mut [f64], buffer: &mut [f64]) -> u64 {
    let n = values.len();
    if n < 2 {
        return 0;
    }
    let mid = n / 2;
    let mut swaps = {
        let (left, right) = values.split_at_mut(mid);
        let (buf_left, buf_right) = buffer.split_at_mut(mid);
        count_inversions(left, buf_left) + count_inversions(right, buf_right)
    };

    let (mut i, mut j, mut k) = (0, mid, 0);
    while i < mid && j < n {
        if values[j].total_cmp(&values[i]) == Ordering::Less {
            buffer[k] = values[j];
            swaps += (mid - i) as u64;
            j += 1;
        } else {
            buffer[k] = values[i];
            i += 1;
        }
        k += 1;
    }
    while i < mid {
        buffer[k] = values[i];
        i += 1;
        k += 1;
    }
    while j < n {
        buffer[k] = values[j];
        j += 1;
        k += 1;
    }
    values.copy_from_slice(&buffer[..n]);
    swaps
}

/// Two-sided p-value of a correlation coefficient via the t approximation.
pub(crate) fn correlation_p_value(r: f64, n: usize) -> Option<f64> {
    if n < 3 {
        return None;
    }
    if r.abs() >= 1.0 {
        return Some(0.0);
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    finite_probability(2.0 * (1.0 - dist.cdf(t.abs())))
}

/// Two-sided p-value of Kendall's tau via the normal approximation.
pub(crate) fn kendall_p_value(tau: f64, n: usize) -> Option<f64> {
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let z = 3.0 * tau * (nf * (nf - 1.0)).sqrt() / (2.0 * (2.0 * nf + 5.0)).sqrt();
    let dist = Normal::new(0.0, 1.0).ok()?;
    finite_probability(2.0 * (1.0 - dist.cdf(z.abs())))
}

/// Upper-tail p-value of a chi-square statistic.
pub(crate) fn chi_square_p_value(statistic: f64, dof: f64) -> Option<f64> {
    let dist = ChiSquared::new(dof).ok()?;
    finite_probability(1.0 - dist.cdf(statistic))
}

/// Upper-tail p-value of an F statistic.
pub(crate) fn f_p_value(statistic: f64, df1: f64, df2: f64) -> Option<f64> {
    let dist = FisherSnedecor::new(df1, df2).ok()?;
    finite_probability(1.0 - dist.cdf(statistic))
}

fn finite_probability(p: f64) -> Option<f64> {
    p.is_finite().then(|| p.clamp(0.0, 1.0))
}
