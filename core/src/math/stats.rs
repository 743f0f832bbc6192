use rand::{rngs::StdRng, Rng, SeedableRng};
use statrs::distribution::{ContinuousCDF, StudentsT};

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Sample standard deviation (n - 1 denominator).
    pub fn std_dev(values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }
        let mean = Self::mean(values);
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (sum_sq / (values.len() - 1) as f64).sqrt()
    }

    pub fn standard_error(values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }
        Self::std_dev(values) / (values.len() as f64).sqrt()
    }

    /// Root of the sum of squares, for combining independent errors.
    pub fn quadrature(terms: impl IntoIterator<Item = f64>) -> f64 {
        terms.into_iter().map(|t| t * t).sum::<f64>().sqrt()
    }

    /// Two-sided Student-t interval for the mean. `None` below two values.
    pub fn student_t_interval(values: &[f64], level: f64) -> Option<(f64, f64)> {
        if values.len() < 2 {
            return None;
        }
        let mean = Self::mean(values);
        let se = Self::standard_error(values);
        if se == 0.0 {
            return Some((mean, mean));
        }
        let dist = StudentsT::new(0.0, 1.0, (values.len() - 1) as f64).ok()?;
        let t = dist.inverse_cdf(1.0 - (1.0 - level) / 2.0);
        Some((mean - t * se, mean + t * se))
    }

    /// Percentile bootstrap interval for the mean, reproducible from `seed`.
    pub fn bootstrap_interval(
        values: &[f64],
        level: f64,
        resamples: usize,
        seed: u64,
    ) -> Option<(f64, f64)> {
        if values.len() < 2 || resamples == 0 {
            return None;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let n = values.len();
        let mut means: Vec<f64> = (0..resamples)
            .map(|_| {
                let total: f64 = (0..n).map(|_| values[rng.gen_range(0..n)]).sum();
                total / n as f64
            })
            .collect();
        means.sort_by(|a, b| a.total_cmp(b));

        let alpha = 1.0 - level;
        let at = |q: f64| means[((resamples - 1) as f64 * q).round() as usize];
        Some((at(alpha / 2.0), at(1.0 - alpha / 2.0)))
    }

    pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
        if x.len() != y.len() || x.len() < 2 {
            return None;
        }
        let (mx, my) = (Self::mean(x), Self::mean(y));
        let mut cov = 0.0;
        let mut vx = 0.0;
        let mut vy = 0.0;
        for (a, b) in x.iter().zip(y) {
            cov += (a - mx) * (b - my);
            vx += (a - mx).powi(2);
            vy += (b - my).powi(2);
        }
        if vx == 0.0 || vy == 0.0 {
            return None;
        }
        Some(cov / (vx.sqrt() * vy.sqrt()))
    }

    /// Ordinary least squares fit `y = slope * x + intercept`.
    pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
        if x.len() != y.len() || x.len() < 2 {
            return None;
        }
        let (mx, my) = (Self::mean(x), Self::mean(y));
        let sxx: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
        if sxx == 0.0 {
            return None;
        }
        let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
        let slope = sxy / sxx;
        Some((slope, my - slope * mx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_sequence_is_zero() {
        assert_eq!(StatsHelper::mean(&[]), 0.0);
        assert_eq!(StatsHelper::std_dev(&[4.0]), 0.0);
    }

    #[test]
    fn quadrature_combines_independent_terms() {
        assert!((StatsHelper::quadrature([3.0, 4.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn student_t_interval_matches_table_value() {
        // t(0.975, 4) = 2.776
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let (lower, upper) = StatsHelper::student_t_interval(&values, 0.95).unwrap();
        let se = StatsHelper::standard_error(&values);
        assert!(((upper - 3.0) / se - 2.776).abs() < 1e-3);
        assert!(((3.0 - lower) / se - 2.776).abs() < 1e-3);
    }

    #[test]
    fn student_t_interval_needs_two_values() {
        assert!(StatsHelper::student_t_interval(&[1.0], 0.95).is_none());
        assert_eq!(
            StatsHelper::student_t_interval(&[2.0, 2.0], 0.95),
            Some((2.0, 2.0))
        );
    }

    #[test]
    fn bootstrap_is_reproducible_for_a_seed() {
        let values = [0.1, 0.4, 0.35, 0.8, 0.2, 0.55];
        let first = StatsHelper::bootstrap_interval(&values, 0.95, 500, 42).unwrap();
        let second = StatsHelper::bootstrap_interval(&values, 0.95, 500, 42).unwrap();
        assert_eq!(first, second);
        let mean = StatsHelper::mean(&values);
        assert!(first.0 <= mean && mean <= first.1);
    }

    #[test]
    fn pearson_detects_perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((StatsHelper::pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        let (slope, intercept) = StatsHelper::linear_fit(&x, &y).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!(intercept.abs() < 1e-12);
    }
}
