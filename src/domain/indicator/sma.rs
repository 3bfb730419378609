//! Simple moving average and BBI (bull and bear index).
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]), O(n) sliding window sum.
//! BBI = (SMA(a) + SMA(b) + SMA(c) + SMA(d)) / 4, valid once the longest
//! window is full.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_BBI_PERIODS: [usize; 4] = [5, 10, 20, 60];

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Sma(period));
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        window_sum += bar.close;
        if i >= period {
            window_sum -= bars[i - period].close;
        }

        let valid = i + 1 >= period;
        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Simple(if valid {
                window_sum / period as f64
            } else {
                0.0
            }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

pub fn calculate_bbi(bars: &[OhlcvBar], periods: [usize; 4]) -> IndicatorSeries {
    if periods.contains(&0) || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Bbi(periods));
    }

    let smas: Vec<IndicatorSeries> = periods.iter().map(|&p| calculate_sma(bars, p)).collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let parts: Option<Vec<f64>> = smas.iter().map(|s| s.simple_at(i)).collect();
            match parts {
                Some(parts) => IndicatorPoint {
                    date: bar.date,
                    valid: true,
                    value: IndicatorValue::Simple(parts.iter().sum::<f64>() / 4.0),
                },
                None => IndicatorPoint {
                    date: bar.date,
                    valid: false,
                    value: IndicatorValue::Simple(0.0),
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bbi(periods),
        values,
    }
}
