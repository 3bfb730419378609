//! Series checks and lookups shared by the built-in strategies.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use std::borrow::Cow;

/// Shortest series any strategy will look at.
pub const MIN_SERIES_LEN: usize = 5;

/// Checks that `bars` has at least `min_length` well-formed bars.
pub fn validate_series(code: &str, bars: &[OhlcvBar], min_length: usize) -> Result<(), ScreenerError> {
    if bars.is_empty() {
        return Err(ScreenerError::NoData {
            code: code.to_string(),
        });
    }
    if bars.len() < min_length {
        return Err(ScreenerError::InsufficientData {
            code: code.to_string(),
            bars: bars.len(),
            minimum: min_length,
        });
    }
    if let Some(bad) = bars.iter().find(|b| !b.is_well_formed()) {
        return Err(ScreenerError::DataSource {
            reason: format!("{code}: non-finite price or volume on {}", bad.date),
        });
    }
    Ok(())
}

/// `bars` in ascending date order, borrowed when already sorted.
pub fn sorted_by_date(bars: &[OhlcvBar]) -> Cow<'_, [OhlcvBar]> {
    if bars.windows(2).all(|w| w[0].date <= w[1].date) {
        Cow::Borrowed(bars)
    } else {
        let mut owned = bars.to_vec();
        owned.sort_by_key(|b| b.date);
        Cow::Owned(owned)
    }
}

/// Most recent bar by date.
pub fn latest_bar(bars: &[OhlcvBar]) -> Option<&OhlcvBar> {
    bars.iter().max_by_key(|b| b.date)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1); 0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    match mean(values) {
        Some(m) if n > 1 => {
            let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        }
        _ => 0.0,
    }
}

/// Quantile of already sorted values with linear interpolation between ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}
