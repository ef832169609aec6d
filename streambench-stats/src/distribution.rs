//! Student's t quantiles for confidence intervals.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Two-sided critical value `t` such that `P(|T| <= t) = confidence_level`
/// for a Student's t distribution with `degrees_of_freedom`.
///
/// Returns NaN when the distribution is undefined (df <= 0) or the level is
/// outside `(0, 1)`.
pub fn students_t_quantile(confidence_level: f64, degrees_of_freedom: f64) -> f64 {
    if !(confidence_level > 0.0 && confidence_level < 1.0) || !(degrees_of_freedom > 0.0) {
        return f64::NAN;
    }

    let upper_tail = 1.0 - (1.0 - confidence_level) / 2.0;
    match StudentsT::new(0.0, 1.0, degrees_of_freedom) {
        Ok(dist) => dist.inverse_cdf(upper_tail),
        Err(_) => f64::NAN,
    }
}
