//! Masked Pearson correlation and permutation p-values.

/// Whether a vertex value takes part in a correlation. Non-finite values are
/// always missing; exact zeros are missing when `ignore_zero` is set (zero is
/// the usual fill value for the medial wall).
#[inline]
pub fn is_defined(v: f64, ignore_zero: bool) -> bool {
    v.is_finite() && !(ignore_zero && v == 0.0)
}

/// Pearson r over the pairs where both values are defined.
///
/// A location missing in either vector is dropped from both. Returns 0.0 when
/// fewer than two shared locations remain or either side has no variance, so
/// the result is always finite and within [-1, 1].
pub fn pearson_r<I>(pairs: I, ignore_zero: bool) -> f64
where
    I: Iterator<Item = (f64, f64)> + Clone,
{
    let shared = pairs.filter(move |&(x, y)| is_defined(x, ignore_zero) && is_defined(y, ignore_zero));

    let (mut n, mut sx, mut sy) = (0usize, 0.0f64, 0.0f64);
    for (x, y) in shared.clone() {
        n += 1;
        sx += x;
        sy += y;
    }
    if n < 2 {
        return 0.0;
    }
    let mx = sx / n as f64;
    let my = sy / n as f64;

    let (mut num, mut vx, mut vy) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in shared {
        let (dx, dy) = (x - mx, y - my);
        num += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    let (vx, vy) = (vx.sqrt(), vy.sqrt());
    if vx < 1e-12 || vy < 1e-12 {
        return 0.0;
    }
    (num / (vx * vy)).clamp(-1.0, 1.0)
}

/// Two-sided permutation p-value with the observed statistic counted once:
/// `(1 + #{|null| >= |observed|}) / (P + 1)`.
///
/// Lies in `[1 / (P + 1), 1]`. An empty null distribution gives 1.0.
pub fn permutation_p_value(observed: f64, nulls: &[f64]) -> f64 {
    let threshold = observed.abs();
    let extreme = nulls.iter().filter(|r| r.abs() >= threshold).count();
    (1 + extreme) as f64 / (nulls.len() + 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn r(x: &[f64], y: &[f64], ignore_zero: bool) -> f64 {
        pearson_r(x.iter().copied().zip(y.iter().copied()), ignore_zero)
    }

    #[test]
    fn perfect_positive_and_negative() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        let z = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert_abs_diff_eq!(r(&x, &y, true), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r(&x, &z, true), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn known_value() {
        // Hand-computed: r = 0.8
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        assert_abs_diff_eq!(r(&x, &y, true), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn nan_masked_symmetrically() {
        let x = [1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0];
        let y = [2.0, 4.0, 6.0, 8.0, f64::NAN, 12.0];
        assert_abs_diff_eq!(r(&x, &y, true), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r(&x, &y, true), r(&y, &x, true), epsilon = 1e-15);
    }

    #[test]
    fn zeros_masked_only_when_requested() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [9.0, 1.0, 2.0, 3.0];
        assert_abs_diff_eq!(r(&x, &y, true), 1.0, epsilon = 1e-12);
        assert!(r(&x, &y, false) < 0.0);
    }

    #[test]
    fn degenerate_inputs_give_zero() {
        assert_eq!(r(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0], true), 0.0);
        assert_eq!(r(&[1.0], &[2.0], true), 0.0);
        assert_eq!(r(&[f64::NAN; 4], &[1.0, 2.0, 3.0, 4.0], true), 0.0);
    }

    #[test]
    fn p_value_counts_observed_once() {
        let nulls = [0.1, -0.5, 0.3, 0.6, -0.05];
        // |null| >= 0.5: -0.5 and 0.6
        assert_abs_diff_eq!(permutation_p_value(0.5, &nulls), 3.0 / 6.0);
        assert_abs_diff_eq!(permutation_p_value(-0.5, &nulls), 3.0 / 6.0);
        assert_abs_diff_eq!(permutation_p_value(0.99, &nulls), 1.0 / 6.0);
        assert_abs_diff_eq!(permutation_p_value(0.0, &nulls), 1.0);
    }

    #[test]
    fn p_value_without_nulls() {
        assert_eq!(permutation_p_value(0.3, &[]), 1.0);
    }
}
