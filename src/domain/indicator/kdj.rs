//! KDJ stochastic oscillator.
//!
//! RSV[i] = (C[i] - min(L, n)) / (max(H, n) - min(L, n)) * 100, window clamped
//! to the start of the series. A flat window (max == min) gives RSV = 0.
//! K[i] = 2/3 * K[i-1] + 1/3 * RSV[i], D[i] = 2/3 * D[i-1] + 1/3 * K[i],
//! J[i] = 3K - 2D, seeded with K = D = 50. Every bar is valid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 9;
pub const SEED: f64 = 50.0;

/// Raw stochastic value for the window ending at `i`.
pub fn rsv(bars: &[OhlcvBar], i: usize, period: usize) -> f64 {
    let start = (i + 1).saturating_sub(period);
    let window = &bars[start..=i];
    let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let range = high - low;
    if range == 0.0 {
        0.0
    } else {
        (bars[i].close - low) / range * 100.0
    }
}

pub fn calculate_kdj(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Kdj(period));
    }

    let values = (0..bars.len())
        .scan((SEED, SEED), |(k_prev, d_prev), i| {
            let k = 2.0 / 3.0 * *k_prev + 1.0 / 3.0 * rsv(bars, i, period);
            let d = 2.0 / 3.0 * *d_prev + 1.0 / 3.0 * k;
            (*k_prev, *d_prev) = (k, d);
            Some(IndicatorPoint {
                date: bars[i].date,
                valid: true,
                value: IndicatorValue::Stochastic {
                    k,
                    d,
                    j: 3.0 * k - 2.0 * d,
                },
            })
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Kdj(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar::new(
            "TEST",
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close,
            high,
            low,
            close,
            1000.0,
        )
    }

    fn kdj_at(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.values[i].value {
            IndicatorValue::Stochastic { k, d, j } => (k, d, j),
            _ => panic!("Expected Stochastic value"),
        }
    }

    #[test]
    fn first_bar_uses_seed() {
        // rsv = (105 - 90) / (110 - 90) * 100 = 75
        let bars = vec![make_bar(1, 110.0, 90.0, 105.0)];
        let series = calculate_kdj(&bars, 9);
        let (k, d, j) = kdj_at(&series, 0);

        let expected_k = 2.0 / 3.0 * 50.0 + 75.0 / 3.0;
        let expected_d = 2.0 / 3.0 * 50.0 + expected_k / 3.0;
        assert_relative_eq!(k, expected_k, epsilon = 1e-9);
        assert_relative_eq!(d, expected_d, epsilon = 1e-9);
        assert_relative_eq!(j, 3.0 * expected_k - 2.0 * expected_d, epsilon = 1e-9);
        assert!(series.values[0].valid);
    }

    #[test]
    fn recursion_carries_previous_state() {
        let bars = vec![
            make_bar(1, 110.0, 90.0, 105.0),
            make_bar(2, 112.0, 95.0, 96.0),
        ];
        let series = calculate_kdj(&bars, 9);
        let (k0, d0, _) = kdj_at(&series, 0);
        let (k1, d1, j1) = kdj_at(&series, 1);

        // window [0..=1]: low 90, high 112
        let rsv1 = (96.0 - 90.0) / (112.0 - 90.0) * 100.0;
        let expected_k = 2.0 / 3.0 * k0 + rsv1 / 3.0;
        let expected_d = 2.0 / 3.0 * d0 + expected_k / 3.0;
        assert_relative_eq!(k1, expected_k, epsilon = 1e-9);
        assert_relative_eq!(d1, expected_d, epsilon = 1e-9);
        assert_relative_eq!(j1, 3.0 * expected_k - 2.0 * expected_d, epsilon = 1e-9);
    }

    #[test]
    fn window_drops_old_bars() {
        let bars = vec![
            make_bar(1, 200.0, 10.0, 100.0),
            make_bar(2, 110.0, 90.0, 100.0),
            make_bar(3, 110.0, 90.0, 105.0),
        ];
        // period 2 at i = 2 only sees bars 1 and 2
        assert_relative_eq!(rsv(&bars, 2, 2), 75.0, epsilon = 1e-9);
        // period 9 clamps to all three bars
        assert_relative_eq!(rsv(&bars, 2, 9), 95.0 / 190.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn flat_window_gives_zero_rsv() {
        let bars: Vec<OhlcvBar> = (1..=5).map(|d| make_bar(d, 10.0, 10.0, 10.0)).collect();
        assert_eq!(rsv(&bars, 4, 9), 0.0);

        let series = calculate_kdj(&bars, 9);
        for i in 0..bars.len() {
            let (k, d, j) = kdj_at(&series, i);
            assert!(k.is_finite() && d.is_finite() && j.is_finite());
        }
        // K decays towards zero from the seed
        let (k4, _, _) = kdj_at(&series, 4);
        assert_relative_eq!(k4, 50.0 * (2.0f64 / 3.0).powi(5), epsilon = 1e-9);
    }

    #[test]
    fn j_can_go_negative() {
        let mut bars = vec![make_bar(1, 110.0, 90.0, 109.0)];
        for d in 2..=6 {
            bars.push(make_bar(d, 110.0, 50.0, 51.0));
        }
        let series = calculate_kdj(&bars, 9);
        let (_, _, j) = kdj_at(&series, 5);
        assert!(j < 0.0);
    }

    #[test]
    fn kdj_empty_bars() {
        let series = calculate_kdj(&[], 9);
        assert!(series.values.is_empty());
    }

    #[test]
    fn kdj_period_0() {
        let bars = vec![make_bar(1, 110.0, 90.0, 105.0)];
        assert!(calculate_kdj(&bars, 0).values.is_empty());
    }

    #[test]
    fn kdj_indicator_type() {
        let bars = vec![make_bar(1, 110.0, 90.0, 105.0)];
        assert_eq!(calculate_kdj(&bars, 9).indicator_type, IndicatorType::Kdj(9));
    }
}
