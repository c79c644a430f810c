use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use thiserror::Error;

/// Observations required by the trailing average. A portfolio whose stocks
/// cannot all meet this falls back to an equal-split plan for the cycle.
pub const TRAILING_WINDOW: usize = 6;

/// Observations used by the short-window volatility signal. Unlike the
/// trailing average this degrades to 0 instead of failing.
pub const VOLATILITY_WINDOW: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("insufficient price history: need {needed} observations, have {got}")]
    InsufficientHistory { needed: usize, got: usize },
}

/// Average of the most recent `window` closes.
///
/// `closes` must be ordered most recent first. Errors when fewer than
/// `window` observations exist; callers handle this by switching the whole
/// portfolio to the equal-split fallback.
pub fn trailing_average(closes: &[BigDecimal], window: usize) -> Result<BigDecimal, SignalError> {
    if closes.len() < window {
        return Err(SignalError::InsufficientHistory {
            needed: window,
            got: closes.len(),
        });
    }

    let sum = closes[..window]
        .iter()
        .fold(BigDecimal::zero(), |acc, c| acc + c);

    Ok(sum / BigDecimal::from(window as i64))
}

/// Coefficient of variation (population standard deviation / mean) over the
/// most recent `window` closes, most recent first.
///
/// Returns 0.0 when fewer than `window` observations exist, or when the
/// window mean is exactly zero (invalid data).
pub fn coefficient_of_variation(closes: &[BigDecimal], window: usize) -> f64 {
    if closes.len() < window || window == 0 {
        return 0.0;
    }

    let values: Vec<f64> = closes[..window].iter().filter_map(|c| c.to_f64()).collect();
    if values.len() < window {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }

    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;

    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn trailing_average_uses_most_recent_window() {
        // Most recent first; the 7th value must be ignored
        let closes = vec![
            dec("110"),
            dec("105"),
            dec("100"),
            dec("95"),
            dec("100"),
            dec("90"),
            dec("500"),
        ];
        let avg = trailing_average(&closes, 6).unwrap();
        assert_eq!(avg, dec("100"));
    }

    #[test]
    fn trailing_average_fails_on_short_history() {
        let closes = vec![dec("100"), dec("101"), dec("102")];
        let err = trailing_average(&closes, 6).unwrap_err();
        assert_eq!(
            err,
            SignalError::InsufficientHistory { needed: 6, got: 3 }
        );
    }

    #[test]
    fn volatility_degrades_to_zero_on_short_history() {
        let closes = vec![dec("100"), dec("101")];
        assert_eq!(coefficient_of_variation(&closes, 3), 0.0);
    }

    #[test]
    fn volatility_of_flat_series_is_zero() {
        let closes = vec![dec("100"), dec("100"), dec("100")];
        assert_eq!(coefficient_of_variation(&closes, 3), 0.0);
    }

    #[test]
    fn volatility_matches_population_std_dev_over_mean() {
        // mean 100, variance (0 + 900 + 900) / 3 = 600, cv = sqrt(600) / 100
        let closes = vec![dec("100"), dec("130"), dec("70")];
        let cv = coefficient_of_variation(&closes, 3);
        assert!((cv - 600.0_f64.sqrt() / 100.0).abs() < 1e-12);
    }

    #[test]
    fn volatility_guards_zero_mean() {
        let closes = vec![dec("100"), dec("0"), dec("-100")];
        assert_eq!(coefficient_of_variation(&closes, 3), 0.0);
    }
}
