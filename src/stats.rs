use statrs::statistics::Statistics;

/// Ordinary least-squares fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fits a regression line through the paired samples.
///
/// Returns `None` when there are fewer than two points or all x values are
/// equal, since no line is defined then.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let var_x = xs.iter().variance();
    if !var_x.is_finite() || var_x == 0.0 {
        return None;
    }
    let cov_xy = xs.iter().covariance(ys.iter());
    let slope = cov_xy / var_x;
    let intercept = ys.iter().mean() - slope * xs.iter().mean();
    if slope.is_finite() && intercept.is_finite() {
        Some(LinearFit { slope, intercept })
    } else {
        None
    }
}

/// Smallest and largest value, ignoring NaN.
pub fn min_and_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_exact_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let fit = linear_fit(&xs, &ys).unwrap();
        assert!(close(fit.slope, 2.0));
        assert!(close(fit.intercept, 1.0));
        assert!(close(fit.predict(10.0), 21.0));
    }

    #[test]
    fn test_noisy_line() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 5.0, 4.0];
        let fit = linear_fit(&xs, &ys).unwrap();
        assert!(close(fit.slope, 0.7));
        assert!(close(fit.intercept, 2.0));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(linear_fit(&[1.0], &[2.0]).is_none());
        assert!(linear_fit(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(linear_fit(&[1.0, 2.0], &[1.0]).is_none());
    }

    #[test]
    fn test_min_and_max() {
        assert_eq!(min_and_max(&[3.0, f64::NAN, -1.0, 2.0]), Some((-1.0, 3.0)));
        assert_eq!(min_and_max(&[]), None);
    }
}
