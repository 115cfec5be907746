//! Statistics Calculator Module
//! Slice-level statistics: descriptive moments, correlation tests,
//! chi-square independence and the Gini coefficient.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};
use std::cmp::Ordering;

/// Descriptive statistics of one numeric field.
///
/// Fields that are undefined for the input (too few values, zero variance)
/// are NaN, which serializes as `null`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UnivariateStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl Default for UnivariateStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            q25: f64::NAN,
            q75: f64::NAN,
            skewness: f64::NAN,
            kurtosis: f64::NAN,
        }
    }
}

/// Result of a correlation test: coefficient and two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub coefficient: f64,
    pub p_value: f64,
}

/// Chi-square statistic of a contingency table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquare {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
}

fn sort_ascending(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

/// Handles slice-level statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> UnivariateStats {
        let n = values.len();
        if n == 0 {
            return UnivariateStats::default();
        }

        let mut sorted = values.to_vec();
        sort_ascending(&mut sorted);

        let mean = Self::mean(values);
        UnivariateStats {
            count: n,
            mean,
            median: Self::percentile(&sorted, 50.0),
            std: Self::sample_std(values),
            min: sorted[0],
            max: sorted[n - 1],
            q25: Self::percentile(&sorted, 25.0),
            q75: Self::percentile(&sorted, 75.0),
            skewness: Self::skewness(values, mean),
            kurtosis: Self::kurtosis(values, mean),
        }
    }

    /// Arithmetic mean; NaN for an empty slice.
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Sample variance (n - 1 denominator); NaN below two values.
    pub fn sample_variance(values: &[f64]) -> f64 {
        let n = values.len();
        if n < 2 {
            return f64::NAN;
        }
        let mean = Self::mean(values);
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    }

    pub fn sample_std(values: &[f64]) -> f64 {
        Self::sample_variance(values).sqrt()
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Bias-corrected sample skewness (G1).
    fn skewness(values: &[f64], mean: f64) -> f64 {
        let n = values.len() as f64;
        if values.len() < 3 {
            return f64::NAN;
        }
        let m2: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
        let m3: f64 = values.iter().map(|x| (x - mean).powi(3)).sum();
        if m2 == 0.0 {
            return f64::NAN;
        }
        (n * (n - 1.0).sqrt() / (n - 2.0)) * (m3 / m2.powf(1.5))
    }

    /// Bias-corrected excess kurtosis (G2).
    fn kurtosis(values: &[f64], mean: f64) -> f64 {
        let n = values.len() as f64;
        if values.len() < 4 {
            return f64::NAN;
        }
        let m2: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
        let m4: f64 = values.iter().map(|x| (x - mean).powi(4)).sum();
        if m2 == 0.0 {
            return f64::NAN;
        }
        let adj = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
        let numerator = n * (n + 1.0) * (n - 1.0) * m4;
        let denominator = (n - 2.0) * (n - 3.0) * m2.powi(2);
        numerator / denominator - adj
    }

    /// Pearson correlation with a two-sided t-test p-value.
    pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
        let n = x.len().min(y.len());
        let (x, y) = (&x[..n], &y[..n]);
        let mx = Self::mean(x);
        let my = Self::mean(y);

        let mut sxy = 0.0;
        let mut sxx = 0.0;
        let mut syy = 0.0;
        for (a, b) in x.iter().zip(y) {
            sxy += (a - mx) * (b - my);
            sxx += (a - mx).powi(2);
            syy += (b - my).powi(2);
        }

        if n < 2 || sxx == 0.0 || syy == 0.0 {
            return Correlation {
                coefficient: f64::NAN,
                p_value: f64::NAN,
            };
        }

        let r = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
        Correlation {
            coefficient: r,
            p_value: Self::correlation_p_value(r, n),
        }
    }

    /// Spearman rank correlation: Pearson over average ranks.
    pub fn spearman(x: &[f64], y: &[f64]) -> Correlation {
        Self::pearson(&Self::average_ranks(x), &Self::average_ranks(y))
    }

    /// 1-based ranks with ties sharing their average rank.
    pub fn average_ranks(values: &[f64]) -> Vec<f64> {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

        let mut ranks = vec![0.0; values.len()];
        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && values[order[end]] == values[order[start]] {
                end += 1;
            }
            // Positions start..end share ranks start+1..=end
            let avg = (start + 1 + end) as f64 / 2.0;
            for &idx in &order[start..end] {
                ranks[idx] = avg;
            }
            start = end;
        }
        ranks
    }

    /// Two-sided p-value of a correlation coefficient via Student's t (n - 2 dof).
    fn correlation_p_value(r: f64, n: usize) -> f64 {
        if r.is_nan() {
            return f64::NAN;
        }
        if n == 2 {
            return 1.0;
        }
        let dof = (n - 2) as f64;
        let residual = 1.0 - r * r;
        if residual <= 0.0 {
            return 0.0;
        }
        let t = r * (dof / residual).sqrt();

        if let Ok(dist) = StudentsT::new(0.0, 1.0, dof) {
            (2.0 * dist.sf(t.abs())).min(1.0)
        } else {
            f64::NAN
        }
    }

    /// Chi-square test of independence over an observed contingency table
    /// (rows of equal length). Yates' correction applies when dof is 1.
    pub fn chi_square(observed: &[Vec<f64>]) -> ChiSquare {
        let n_rows = observed.len();
        let n_cols = observed.first().map(Vec::len).unwrap_or(0);
        let row_sums: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
        let col_sums: Vec<f64> = (0..n_cols)
            .map(|c| observed.iter().map(|r| r[c]).sum())
            .collect();
        let total: f64 = row_sums.iter().sum();

        let dof = n_rows.saturating_sub(1) * n_cols.saturating_sub(1);
        if dof == 0 || total == 0.0 {
            return ChiSquare {
                statistic: 0.0,
                p_value: 1.0,
                degrees_of_freedom: dof,
            };
        }

        let mut statistic = 0.0;
        for (r, row) in observed.iter().enumerate() {
            for (c, &obs) in row.iter().enumerate() {
                let expected = row_sums[r] * col_sums[c] / total;
                let diff = expected - obs;
                // Yates moves each cell toward its expectation by at most 0.5
                let obs = if dof == 1 {
                    obs + diff.signum() * diff.abs().min(0.5)
                } else {
                    obs
                };
                statistic += (obs - expected).powi(2) / expected;
            }
        }

        let p_value = ChiSquared::new(dof as f64)
            .map(|dist| dist.sf(statistic))
            .unwrap_or(f64::NAN);

        ChiSquare {
            statistic,
            p_value,
            degrees_of_freedom: dof,
        }
    }

    /// Gini coefficient over non-negative values.
    ///
    /// `None` when the input is empty or sums to zero.
    pub fn gini(values: &[f64]) -> Option<f64> {
        let n = values.len();
        let total: f64 = values.iter().sum();
        if n == 0 || total == 0.0 {
            return None;
        }

        let mut sorted = values.to_vec();
        sort_ascending(&mut sorted);
        let weighted: f64 = sorted
            .iter()
            .enumerate()
            .map(|(i, v)| (i + 1) as f64 * v)
            .sum();

        let n = n as f64;
        Some(2.0 * weighted / (n * total) - (n + 1.0) / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn descriptive_stats_match_pandas() {
        let s = StatsCalculator::compute_descriptive_stats(&[5.0, 1.0, 4.0, 2.0, 3.0]);
        assert_eq!(s.count, 5);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.median, 3.0);
        assert_eq!((s.min, s.max), (1.0, 5.0));
        assert_eq!((s.q25, s.q75), (2.0, 4.0));
        assert!(close(s.std, 2.5f64.sqrt(), 1e-12));
        assert!(close(s.skewness, 0.0, 1e-12));
        assert!(close(s.kurtosis, -1.2, 1e-12));
    }

    #[test]
    fn small_or_constant_inputs_are_undefined_not_panics() {
        let one = StatsCalculator::compute_descriptive_stats(&[7.0]);
        assert_eq!(one.mean, 7.0);
        assert!(one.std.is_nan() && one.skewness.is_nan() && one.kurtosis.is_nan());

        let flat = StatsCalculator::compute_descriptive_stats(&[2.0; 6]);
        assert_eq!(flat.std, 0.0);
        assert!(flat.skewness.is_nan());
        assert!(flat.kurtosis.is_nan());
    }

    #[test]
    fn pearson_and_spearman_with_p_values() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        let p = StatsCalculator::pearson(&x, &y);
        assert!(close(p.coefficient, 0.8, 1e-12));
        assert!(p.p_value > 0.10 && p.p_value < 0.11);

        let perfect = StatsCalculator::spearman(&x, &[1.0, 4.0, 9.0, 16.0, 25.0]);
        assert!(close(perfect.coefficient, 1.0, 1e-12));
        assert_eq!(perfect.p_value, 0.0);
    }

    #[test]
    fn ties_share_average_ranks() {
        let ranks = StatsCalculator::average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn chi_square_with_and_without_yates() {
        let two_by_two = StatsCalculator::chi_square(&[vec![10.0, 20.0], vec![20.0, 10.0]]);
        assert_eq!(two_by_two.degrees_of_freedom, 1);
        assert!(close(two_by_two.statistic, 5.4, 1e-9));
        assert!(two_by_two.p_value > 0.019 && two_by_two.p_value < 0.022);

        let three_by_two = StatsCalculator::chi_square(&[
            vec![10.0, 20.0],
            vec![20.0, 10.0],
            vec![15.0, 15.0],
        ]);
        assert_eq!(three_by_two.degrees_of_freedom, 2);
        assert!(close(three_by_two.statistic, 20.0 / 3.0, 1e-9));
        // chi2 with 2 dof: sf(x) = exp(-x/2)
        assert!(close(three_by_two.p_value, (-10.0f64 / 3.0).exp(), 1e-6));

        let degenerate = StatsCalculator::chi_square(&[vec![3.0, 4.0]]);
        assert_eq!(degenerate.degrees_of_freedom, 0);
        assert_eq!(degenerate.p_value, 1.0);
    }

    #[test]
    fn yates_correction_never_overshoots_the_expectation() {
        // every |expected - observed| is 0.238, so the corrected table is exact
        let near = StatsCalculator::chi_square(&[vec![5.0, 5.0], vec![5.0, 6.0]]);
        assert_eq!(near.degrees_of_freedom, 1);
        assert!(close(near.statistic, 0.0, 1e-12));
        assert!(close(near.p_value, 1.0, 1e-12));
    }

    #[test]
    fn gini_extremes() {
        assert!(close(StatsCalculator::gini(&[100.0; 10]).unwrap(), 0.0, 1e-12));

        let mut concentrated = vec![0.0; 9];
        concentrated.push(1000.0);
        assert!(close(StatsCalculator::gini(&concentrated).unwrap(), 0.9, 1e-12));

        assert_eq!(StatsCalculator::gini(&[]), None);
        assert_eq!(StatsCalculator::gini(&[0.0, 0.0]), None);
    }
}
