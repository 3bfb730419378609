//! Exponential moving average and its double-smoothed trend line.
//!
//! k = 2/(span+1), seeded with the first close, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). Every bar is valid.
//! The short trend line is EMA(EMA(C, span), span).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_TREND_SPAN: usize = 10;

fn ema_values(input: &[f64], span: usize) -> Vec<f64> {
    let k = 2.0 / (span as f64 + 1.0);
    input
        .iter()
        .scan(None, |prev: &mut Option<f64>, &x| {
            let ema = match *prev {
                None => x,
                Some(p) => x * k + p * (1.0 - k),
            };
            *prev = Some(ema);
            Some(ema)
        })
        .collect()
}

fn to_series(bars: &[OhlcvBar], values: Vec<f64>, indicator_type: IndicatorType) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type,
        values: bars
            .iter()
            .zip(values)
            .map(|(bar, v)| IndicatorPoint {
                date: bar.date,
                valid: true,
                value: IndicatorValue::Simple(v),
            })
            .collect(),
    }
}

pub fn calculate_ema(bars: &[OhlcvBar], span: usize) -> IndicatorSeries {
    if span == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Ema(span));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    to_series(bars, ema_values(&closes, span), IndicatorType::Ema(span))
}

pub fn calculate_double_ema(bars: &[OhlcvBar], span: usize) -> IndicatorSeries {
    if span == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::DoubleEma(span));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let inner = ema_values(&closes, span);
    to_series(bars, ema_values(&inner, span), IndicatorType::DoubleEma(span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                OhlcvBar::new(
                    "TEST",
                    NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                    close,
                    close,
                    close,
                    close,
                    1000.0,
                )
            })
            .collect()
    }

    #[test]
    fn ema_seed_is_first_close() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 3);
        assert!(series.values[0].valid);
        assert_eq!(series.simple_at(0), Some(10.0));
    }

    #[test]
    fn ema_recursive_calculation() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 3);

        let k = 2.0 / 4.0;
        let ema1 = 20.0 * k + 10.0 * (1.0 - k);
        let ema2 = 30.0 * k + ema1 * (1.0 - k);
        assert!((series.simple_at(1).unwrap() - ema1).abs() < f64::EPSILON);
        assert!((series.simple_at(2).unwrap() - ema2).abs() < f64::EPSILON);
    }

    #[test]
    fn double_ema_smooths_the_ema() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let single = calculate_ema(&bars, 3);
        let double = calculate_double_ema(&bars, 3);

        let k = 0.5;
        let e1 = single.simple_at(1).unwrap();
        let e2 = single.simple_at(2).unwrap();
        let d1 = e1 * k + 10.0 * (1.0 - k);
        let d2 = e2 * k + d1 * (1.0 - k);
        assert_eq!(double.simple_at(0), Some(10.0));
        assert!((double.simple_at(1).unwrap() - d1).abs() < 1e-12);
        assert!((double.simple_at(2).unwrap() - d2).abs() < 1e-12);
    }

    #[test]
    fn ema_equal_prices() {
        let bars = make_bars(&[100.0; 5]);
        let series = calculate_double_ema(&bars, 10);
        for i in 0..5 {
            assert!((series.simple_at(i).unwrap() - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_empty_and_zero_span() {
        assert!(calculate_ema(&[], 3).values.is_empty());
        assert!(calculate_double_ema(&make_bars(&[1.0]), 0).values.is_empty());
        assert_eq!(
            calculate_double_ema(&[], 10).indicator_type,
            IndicatorType::DoubleEma(10)
        );
    }
}
